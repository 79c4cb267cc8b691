use crate::error::ConfigError;
use crate::identity::Identity;
use crate::level::{Level, TestDuration};
use clap::ValueEnum;
use directories::ProjectDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
    Blue,
    Green,
    Purple,
    Red,
    Orange,
}

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CursorStyle {
    #[default]
    Block,
    Line,
    Underline,
    Outline,
}

/// Presentation preferences. Only the host reads these; the typing
/// session never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplaySettings {
    pub theme: Theme,
    pub cursor_style: CursorStyle,
    pub sound_on_error: bool,
    pub sound_on_click: bool,
    pub smooth_caret: bool,
    pub show_live_wpm: bool,
    pub show_timer: bool,
    pub show_accuracy: bool,
    pub font_size: u16,
    pub caret_opacity: f32,
    pub words_per_line: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            cursor_style: CursorStyle::Block,
            sound_on_error: false,
            sound_on_click: false,
            smooth_caret: true,
            show_live_wpm: true,
            show_timer: true,
            show_accuracy: true,
            font_size: 24,
            caret_opacity: 1.0,
            words_per_line: 10,
        }
    }
}

impl DisplaySettings {
    /// Pull hand-edited values back into range
    pub fn clamped(mut self) -> Self {
        self.font_size = self.font_size.clamp(12, 48);
        self.caret_opacity = if self.caret_opacity.is_nan() {
            1.0
        } else {
            self.caret_opacity.clamp(0.0, 1.0)
        };
        self.words_per_line = self.words_per_line.clamp(1, 30);
        self
    }
}

/// Where finished results are saved
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub level: Level,
    pub duration: TestDuration,
    pub display: DisplaySettings,
    pub storage: StorageKind,
    /// Persistence endpoint used when `storage` is remote
    pub save_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub account: Option<Identity>,
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "gemtype") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("gemtype_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(mut cfg) => {
                cfg.display = cfg.display.clamped();
                cfg
            }
            Err(e) => {
                warn!("ignoring unreadable config {}: {e}", self.path.display());
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
