use crate::app_dirs::AppDirs;
use env_logger::{Builder, Env, Target};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub const LOG_ENV: &str = "GEMTYPE_LOG";

/// Send log output to a file; the terminal belongs to the UI.
/// Returns the file in use.
pub fn init() -> io::Result<PathBuf> {
    let path = AppDirs::log_path().unwrap_or_else(|| PathBuf::from("gemtype.log"));
    init_at(&path)?;
    Ok(path)
}

pub fn init_at(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    // a second init (tests) keeps the first logger
    let _ = Builder::from_env(Env::default().filter_or(LOG_ENV, "info"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init();
    Ok(())
}
