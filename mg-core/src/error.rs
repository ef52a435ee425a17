//! Error types for the microgrid core
//!
//! Every failure is scoped to the call that produced it. `NotFound` is not an
//! error: absent records are returned as `Option` or [`crate::Lookup`].

use thiserror::Error;

/// Microgrid core errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Node or service unreachable, or the request timed out
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Unexpected shape from a remote call or log
    #[error("Decode error: {0}")]
    Decode(String),

    /// The requesting meter is not authorized on the ledger
    #[error("Meter not authorized: {0}")]
    MeterNotAuthorized(String),

    /// The remote signing collaborator failed; no state was mutated
    #[error("Signature service error: {0}")]
    SignatureService(String),

    /// Connected node reports a different network
    #[error("Network mismatch: expected chain id {expected}, node reports {actual}")]
    NetworkMismatch { expected: u64, actual: u64 },

    /// Caller supplied an invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GridError {
    /// Whether the caller may retry the same call unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GridError::RemoteUnavailable(_) | GridError::SignatureService(_)
        )
    }

    /// Stable short code for structured logs
    pub fn code(&self) -> &'static str {
        match self {
            GridError::RemoteUnavailable(_) => "remote_unavailable",
            GridError::Decode(_) => "decode_error",
            GridError::MeterNotAuthorized(_) => "meter_not_authorized",
            GridError::SignatureService(_) => "signature_service_error",
            GridError::NetworkMismatch { .. } => "network_mismatch",
            GridError::InvalidInput(_) => "invalid_input",
            GridError::Configuration(_) => "configuration_error",
        }
    }
}

impl From<hex::FromHexError> for GridError {
    fn from(e: hex::FromHexError) -> Self {
        GridError::Decode(format!("Hex decode error: {}", e))
    }
}

impl From<serde_json::Error> for GridError {
    fn from(e: serde_json::Error) -> Self {
        GridError::Decode(e.to_string())
    }
}

/// Result type alias for microgrid operations
pub type GridResult<T> = Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GridError::RemoteUnavailable("timeout".into()).is_retryable());
        assert!(GridError::SignatureService("HTTP 500".into()).is_retryable());
        assert!(!GridError::MeterNotAuthorized("0xabc".into()).is_retryable());
        assert!(!GridError::Decode("short".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = GridError::NetworkMismatch {
            expected: 1337,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Network mismatch: expected chain id 1337, node reports 1"
        );
        assert_eq!(err.code(), "network_mismatch");
    }
}
