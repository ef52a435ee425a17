//! Chain Configuration
//!
//! Node endpoint and contract addresses for the microgrid ledger.
//! Supports loading from environment variables with MG_ prefix.

use mg_core::env;
use mg_core::{
    Address, GridError, GridResult, DEFAULT_CHAIN_ID, DEFAULT_MAX_BLOCK_LOOKUPS,
    DEFAULT_RPC_TIMEOUT_SECS,
};
use serde::{Deserialize, Serialize};

/// Token contract of the lab deployment
pub const LAB_TOKEN_ADDRESS: &str = "0x9EB2074A0a4038f5A5e8a03d64B0EA9031159882";

/// Manager contract of the lab deployment
pub const LAB_MANAGER_ADDRESS: &str = "0xC63Dec757Bc85D78117320c2BC3Cc580989CbAFd";

/// JSON-RPC endpoint of the lab node
pub const LAB_RPC_URL: &str = "http://virtual.lab.inf.uva.es:60022";

/// Ledger connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// Fungible token contract
    pub token_address: Address,
    /// Microgrid manager contract
    pub manager_address: Address,
    /// Network the node is expected to serve
    #[serde(default = "default_chain_id")]
    pub expected_chain_id: u64,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Concurrent block lookups during one scan
    #[serde(default = "default_max_block_lookups")]
    pub max_concurrent_block_lookups: usize,
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_timeout() -> u64 {
    DEFAULT_RPC_TIMEOUT_SECS
}

fn default_max_block_lookups() -> usize {
    DEFAULT_MAX_BLOCK_LOOKUPS
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            token_address: Address::ZERO,
            manager_address: Address::ZERO,
            expected_chain_id: DEFAULT_CHAIN_ID,
            timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            max_concurrent_block_lookups: DEFAULT_MAX_BLOCK_LOOKUPS,
        }
    }
}

impl ChainConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - MG_RPC_URL: JSON-RPC endpoint URL
    /// - MG_TOKEN_ADDRESS: Token contract address
    /// - MG_MANAGER_ADDRESS: Manager contract address
    /// - MG_CHAIN_ID: Expected chain id (default 1337)
    /// - MG_RPC_TIMEOUT: Request timeout in seconds (default 30)
    /// - MG_MAX_BLOCK_LOOKUPS: Concurrent block lookups per scan (default 8)
    ///
    /// Unset variables fall back to the lab deployment; set but malformed
    /// values are a configuration error.
    pub fn from_env() -> GridResult<Self> {
        Self::from_lookup(&env::process_env)
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: &F) -> GridResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lab = Self::lab()?;

        Ok(Self {
            rpc_url: env::non_empty(lookup, "MG_RPC_URL").unwrap_or(lab.rpc_url),
            token_address: address_var(lookup, "MG_TOKEN_ADDRESS", lab.token_address)?,
            manager_address: address_var(lookup, "MG_MANAGER_ADDRESS", lab.manager_address)?,
            expected_chain_id: env::parse_or(lookup, "MG_CHAIN_ID", DEFAULT_CHAIN_ID)?,
            timeout_secs: env::parse_or(lookup, "MG_RPC_TIMEOUT", DEFAULT_RPC_TIMEOUT_SECS)?,
            max_concurrent_block_lookups: env::parse_or(
                lookup,
                "MG_MAX_BLOCK_LOOKUPS",
                DEFAULT_MAX_BLOCK_LOOKUPS,
            )?,
        })
    }

    /// Lab deployment the contracts were published on
    pub fn lab() -> GridResult<Self> {
        Ok(Self {
            rpc_url: LAB_RPC_URL.to_string(),
            token_address: Address::parse(LAB_TOKEN_ADDRESS)?,
            manager_address: Address::parse(LAB_MANAGER_ADDRESS)?,
            ..Default::default()
        })
    }

    /// Local development node
    pub fn development(token_address: Address, manager_address: Address) -> Self {
        Self {
            token_address,
            manager_address,
            timeout_secs: 5,
            ..Default::default()
        }
    }

    /// Set the RPC endpoint
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = url.into();
        self
    }

    /// Check internal consistency
    pub fn validate(&self) -> GridResult<()> {
        if self.rpc_url.is_empty() {
            return Err(GridError::Configuration("rpc_url is empty".to_string()));
        }
        if self.token_address.is_zero() || self.manager_address.is_zero() {
            return Err(GridError::Configuration(
                "token and manager addresses must be set".to_string(),
            ));
        }
        if self.max_concurrent_block_lookups == 0 {
            return Err(GridError::Configuration(
                "max_concurrent_block_lookups must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn address_var<F>(lookup: &F, var: &str, fallback: Address) -> GridResult<Address>
where
    F: Fn(&str) -> Option<String>,
{
    match env::non_empty(lookup, var) {
        Some(s) => Address::parse(&s)
            .map_err(|e| GridError::Configuration(format!("{}: {}", var, e))),
        None => Ok(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lab_config() {
        let config = ChainConfig::lab().unwrap();
        assert_eq!(config.expected_chain_id, 1337);
        assert_eq!(
            config.manager_address.to_hex(),
            "0xc63dec757bc85d78117320c2bc3cc580989cbafd"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lookup_overrides_and_fallbacks() {
        let lookup = |var: &str| match var {
            "MG_RPC_URL" => Some("http://node:8545".to_string()),
            "MG_CHAIN_ID" => Some("31337".to_string()),
            _ => None,
        };
        let config = ChainConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.rpc_url, "http://node:8545");
        assert_eq!(config.expected_chain_id, 31337);
        assert_eq!(config.token_address, ChainConfig::lab().unwrap().token_address);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_malformed_values_are_configuration_errors() {
        let chain_id = |var: &str| (var == "MG_CHAIN_ID").then(|| "mainnet".to_string());
        assert!(matches!(
            ChainConfig::from_lookup(&chain_id),
            Err(GridError::Configuration(_))
        ));

        let lookups = |var: &str| (var == "MG_MAX_BLOCK_LOOKUPS").then(|| "-1".to_string());
        assert!(matches!(
            ChainConfig::from_lookup(&lookups),
            Err(GridError::Configuration(_))
        ));

        let token = |var: &str| (var == "MG_TOKEN_ADDRESS").then(|| "0x1234".to_string());
        let err = ChainConfig::from_lookup(&token).unwrap_err();
        assert!(matches!(err, GridError::Configuration(_)));
        assert!(err.to_string().contains("MG_TOKEN_ADDRESS"));
    }

    #[test]
    fn test_default_requires_addresses() {
        assert!(matches!(
            ChainConfig::default().validate(),
            Err(GridError::Configuration(_))
        ));
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"{
            "rpc_url": "http://localhost:8545",
            "token_address": "0x9EB2074A0a4038f5A5e8a03d64B0EA9031159882",
            "manager_address": "0xC63Dec757Bc85D78117320c2BC3Cc580989CbAFd"
        }"#;
        let config: ChainConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_concurrent_block_lookups, 8);
    }
}
