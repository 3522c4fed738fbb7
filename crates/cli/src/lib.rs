pub mod app;
pub mod config;
pub mod exit_codes;

pub use app::{CliApp, Input};
pub use config::SolinlineConfig;
pub use exit_codes::{CliError, ExitCode};
