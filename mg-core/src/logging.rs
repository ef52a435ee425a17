//! Logging Standards and Conventions
//!
//! All crates log through `tracing` with structured fields. This module fixes
//! the operation names and provides subscriber initialization for binaries.
//!
//! # Field Names
//!
//! `operation`, `address`, `participant`, `meter`, `nonce`, `activity_id`,
//! `block`, `tx_hash`, `log_index`, `count`, `error` and `duration_ms` carry
//! the same meaning in every crate.
//!
//! # Log Levels
//!
//! | Level | Usage | Examples |
//! |-------|-------|----------|
//! | ERROR | Call-scoped failures surfaced to the caller | Log fetch failed, signer rejected |
//! | WARN  | Skipped items, best-effort fallbacks | Undecodable log, validators unknown |
//! | INFO  | Completed operations | Scan finished, authorization issued |
//! | DEBUG | Operation flow | RPC method, block range, filter results |
//! | TRACE | Raw payloads | Calldata, response bodies |
//!
//! # Examples
//!
//! ```ignore
//! use tracing::{info, warn};
//! use mg_core::logging::operations;
//!
//! info!(
//!     operation = operations::SCAN,
//!     kind = %kind,
//!     count = events.len(),
//!     "Event scan complete"
//! );
//!
//! warn!(
//!     tx_hash = %log.transaction_hash,
//!     error = %e,
//!     "Skipping undecodable log"
//! );
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{GridError, GridResult};

/// Log level enumeration matching tracing levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, for development
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Operation names used in the `operation` field
pub mod operations {
    pub const LEDGER_READ: &str = "ledger_read";
    pub const SCAN: &str = "scan";
    pub const RESOLVE_BLOCK: &str = "resolve_block";
    pub const LIST_ACTIVITIES: &str = "list_activities";
    pub const PROFILE: &str = "profile";
    pub const AUTHORIZE: &str = "authorize";
    pub const SIGN: &str = "sign";
    pub const HEALTH_CHECK: &str = "health_check";
}

/// Install a global tracing subscriber writing to stderr
///
/// `filter` takes precedence over `RUST_LOG`; when neither is set the given
/// level applies to the `mg_*` crates only.
pub fn init_tracing(level: LogLevel, format: LogFormat, filter: Option<&str>) -> GridResult<()> {
    let filter = match filter {
        Some(f) => EnvFilter::try_new(f),
        None => EnvFilter::try_from_default_env().or_else(|_| {
            EnvFilter::try_new(format!(
                "mg_core={level},mg_chain={level},mg_meter={level},mg_cli={level}"
            ))
        }),
    }
    .map_err(|e| GridError::Configuration(format!("invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| GridError::Configuration(format!("tracing already initialized: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::parse("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("invalid"), None);
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_format_serde() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }
}
