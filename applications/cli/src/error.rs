/// CLI error types
use thiserror::Error;
use tuneshift_core::{ParseOperationError, ShiftError};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Operation(#[from] ShiftError),

    #[error("Invalid operation: {0}")]
    Parse(#[from] ParseOperationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code: the bridge status code, made positive, for
    /// operation failures and 1 otherwise
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Operation(e) => u8::try_from(e.status_code().unsigned_abs()).unwrap_or(1),
            _ => 1,
        }
    }
}
