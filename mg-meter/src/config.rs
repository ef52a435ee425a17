//! Signer Configuration
//!
//! Remote signing service endpoint and meter identity.
//! Supports loading from environment variables with MG_ prefix.

use mg_core::env;
use mg_core::{Address, GridError, GridResult, DEFAULT_SIGNER_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};

/// Signing service of the lab deployment
pub const LAB_SIGNER_URL: &str = "https://smartmeterapi.ingenas.com";

/// Meter the lab signing service signs for
pub const LAB_METER_ADDRESS: &str = "0xDbC1f6ee28C545ebd291D1D2d49646Bc834549eF";

/// Which signing endpoints to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureRoute {
    /// `/api/signature/generate` and `/api/signature/consume`
    #[default]
    PerOperation,
    /// `/api/signature/custom` with an explicit `operationType`
    Custom,
}

impl SignatureRoute {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "per-operation" | "per_operation" => Some(Self::PerOperation),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Signing service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Base URL of the signing service
    pub base_url: String,
    /// Meter to authorize for; discovered from the service when unset
    #[serde(default)]
    pub meter_address: Option<Address>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub route: SignatureRoute,
}

fn default_timeout() -> u64 {
    DEFAULT_SIGNER_TIMEOUT_SECS
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            meter_address: None,
            timeout_secs: DEFAULT_SIGNER_TIMEOUT_SECS,
            route: SignatureRoute::PerOperation,
        }
    }
}

impl SignerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - MG_SIGNER_URL: Signing service base URL (default: lab service)
    /// - MG_METER_ADDRESS: Meter address (optional)
    /// - MG_SIGNER_TIMEOUT: Request timeout in seconds (default 15)
    /// - MG_SIGNER_ROUTE: `per-operation` or `custom`
    ///
    /// Malformed values are a configuration error.
    pub fn from_env() -> GridResult<Self> {
        Self::from_lookup(&env::process_env)
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: &F) -> GridResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let meter_address = match env::non_empty(lookup, "MG_METER_ADDRESS") {
            Some(s) => Some(
                Address::parse(&s)
                    .map_err(|e| GridError::Configuration(format!("MG_METER_ADDRESS: {}", e)))?,
            ),
            None => None,
        };

        let route = match env::non_empty(lookup, "MG_SIGNER_ROUTE") {
            Some(s) => SignatureRoute::parse(&s).ok_or_else(|| {
                GridError::Configuration(format!("MG_SIGNER_ROUTE: unknown route '{}'", s))
            })?,
            None => SignatureRoute::default(),
        };

        Ok(Self {
            base_url: env::non_empty(lookup, "MG_SIGNER_URL")
                .unwrap_or_else(|| LAB_SIGNER_URL.to_string()),
            meter_address,
            timeout_secs: env::parse_or(lookup, "MG_SIGNER_TIMEOUT", DEFAULT_SIGNER_TIMEOUT_SECS)?,
            route,
        })
    }

    /// Lab signing service with its known meter
    pub fn lab() -> GridResult<Self> {
        Ok(Self {
            base_url: LAB_SIGNER_URL.to_string(),
            meter_address: Some(Address::parse(LAB_METER_ADDRESS)?),
            ..Default::default()
        })
    }

    /// Local signing service
    pub fn development(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    pub fn with_meter(mut self, meter: Address) -> Self {
        self.meter_address = Some(meter);
        self
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(GridError::Configuration("signer base_url is empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(GridError::Configuration(
                "signer timeout must be at least 1 second".to_string(),
            ));
        }
        if matches!(self.meter_address, Some(m) if m.is_zero()) {
            return Err(GridError::Configuration(
                "meter address must not be the zero address".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lab_config() {
        let config = SignerConfig::lab().unwrap();
        assert_eq!(
            config.meter_address.unwrap().to_hex(),
            "0xdbc1f6ee28c545ebd291d1d2d49646bc834549ef"
        );
        assert_eq!(config.timeout_secs, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_route_parse() {
        assert_eq!(SignatureRoute::parse("Custom"), Some(SignatureRoute::Custom));
        assert_eq!(
            SignatureRoute::parse("per-operation"),
            Some(SignatureRoute::PerOperation)
        );
        assert_eq!(SignatureRoute::parse("batch"), None);
    }

    #[test]
    fn test_lookup_values() {
        let lookup = |var: &str| match var {
            "MG_METER_ADDRESS" => Some(LAB_METER_ADDRESS.to_string()),
            "MG_SIGNER_ROUTE" => Some("custom".to_string()),
            "MG_SIGNER_TIMEOUT" => Some("4".to_string()),
            _ => None,
        };
        let config = SignerConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.base_url, LAB_SIGNER_URL);
        assert_eq!(config.route, SignatureRoute::Custom);
        assert_eq!(config.timeout_secs, 4);
        assert!(config.meter_address.is_some());

        let timeout = |var: &str| (var == "MG_SIGNER_TIMEOUT").then(|| "15s".to_string());
        assert!(matches!(
            SignerConfig::from_lookup(&timeout),
            Err(GridError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_meter() {
        let config =
            SignerConfig::development("http://localhost:3000").with_meter(Address::ZERO);
        assert!(matches!(
            config.validate(),
            Err(GridError::Configuration(_))
        ));
    }

    #[test]
    fn test_serde_defaults() {
        let config: SignerConfig =
            serde_json::from_str(r#"{"base_url": "http://localhost:3000"}"#).unwrap();
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.route, SignatureRoute::PerOperation);
        assert!(config.meter_address.is_none());
    }
}
