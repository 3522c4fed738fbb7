use resolver::ResolverError;
use thiserror::Error;

/// Standard exit codes for scripting and CI use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Output produced
    Success = 0,
    /// Output produced, but diagnostics were raised under `--strict`
    Diagnostics = 1,
    /// Unreadable, empty or otherwise unusable input
    InputError = 2,
    /// Invalid configuration or command line
    ConfigError = 3,
    /// Anything else
    InternalError = 4,
}

impl ExitCode {
    /// Convert to process exit code
    pub fn as_code(&self) -> i32 {
        *self as i32
    }

    /// Exit code for an error returned by the application
    pub fn for_error(error: &anyhow::Error) -> Self {
        for cause in error.chain() {
            if let Some(cli_error) = cause.downcast_ref::<CliError>() {
                return match cli_error {
                    CliError::Input(_) => ExitCode::InputError,
                    CliError::Config(_) => ExitCode::ConfigError,
                };
            }
            if let Some(resolver_error) = cause.downcast_ref::<ResolverError>() {
                return match resolver_error {
                    ResolverError::EmptySource | ResolverError::Io(_) => ExitCode::InputError,
                    ResolverError::StdLibrary(_) => ExitCode::ConfigError,
                    ResolverError::CircularDependency(_) => ExitCode::InternalError,
                };
            }
            if cause.downcast_ref::<clap::Error>().is_some() {
                return ExitCode::ConfigError;
            }
        }
        ExitCode::InternalError
    }

    pub fn explanation(&self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::Diagnostics => "Diagnostics raised in strict mode",
            ExitCode::InputError => "Input error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::InternalError => "Internal error",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Errors the CLI classifies for its exit code
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Input(String),

    #[error("{0}")]
    Config(String),
}
