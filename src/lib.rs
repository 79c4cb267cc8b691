// Library surface for headless/integration tests and reuse.
// The terminal host (ui, App) stays in main.rs.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod identity;
pub mod level;
pub mod logging;
pub mod metrics;
pub mod reporter;
pub mod result;
pub mod runtime;
pub mod session;
pub mod sink;
pub mod store;
pub mod text_source;
