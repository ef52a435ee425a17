//! CLI Error Types

use mg_core::GridError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Requested record does not exist
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Ledger or signer error
    #[error(transparent)]
    Grid(#[from] GridError),

    /// JSON formatting error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Create an invalid argument error
    pub fn invalid_arg(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        CliError::NotFound { what: what.into() }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument { .. } => 2,
            CliError::NotFound { .. } => 21,
            CliError::Json(_) => 6,
            CliError::Grid(e) => match e {
                GridError::Configuration(_) => 1,
                GridError::InvalidInput(_) => 2,
                GridError::RemoteUnavailable(_) => 3,
                GridError::SignatureService(_) => 4,
                GridError::MeterNotAuthorized(_) => 10,
                GridError::NetworkMismatch { .. } => 11,
                GridError::Decode(_) => 12,
            },
        }
    }
}
