//! Protocol parameters
//!
//! Read-only values shared by the read models and the broker.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::constants::{COMMISSION_BASE, COMMISSION_RATE, DEFAULT_QUORUM, VALIDATOR_SET_SIZE};
use crate::env;
use crate::error::{GridError, GridResult};
use crate::types::{Amount, DomainEvent};

/// Quorum and commission parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Distinct validator approvals required
    #[serde(default = "default_quorum")]
    pub quorum: u8,
    /// Validators per set
    #[serde(default = "default_set_size")]
    pub validator_set_size: usize,
    /// Commission numerator
    #[serde(default = "default_commission_rate")]
    pub commission_rate: u32,
    /// Commission denominator
    #[serde(default = "default_commission_base")]
    pub commission_base: u32,
}

fn default_quorum() -> u8 {
    DEFAULT_QUORUM
}

fn default_set_size() -> usize {
    VALIDATOR_SET_SIZE
}

fn default_commission_rate() -> u32 {
    COMMISSION_RATE
}

fn default_commission_base() -> u32 {
    COMMISSION_BASE
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            quorum: DEFAULT_QUORUM,
            validator_set_size: VALIDATOR_SET_SIZE,
            commission_rate: COMMISSION_RATE,
            commission_base: COMMISSION_BASE,
        }
    }
}

impl ProtocolParams {
    /// Load parameters from environment variables
    ///
    /// Environment variables:
    /// - MG_QUORUM: Required distinct approvals (default 2)
    /// - MG_COMMISSION_RATE: Commission numerator (default 1)
    /// - MG_COMMISSION_BASE: Commission denominator (default 100)
    ///
    /// Malformed values and inconsistent combinations are configuration
    /// errors.
    pub fn from_env() -> GridResult<Self> {
        Self::from_lookup(&env::process_env)
    }

    /// Load parameters from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: &F) -> GridResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let params = Self {
            quorum: env::parse_or(lookup, "MG_QUORUM", defaults.quorum)?,
            validator_set_size: VALIDATOR_SET_SIZE,
            commission_rate: env::parse_or(lookup, "MG_COMMISSION_RATE", defaults.commission_rate)?,
            commission_base: env::parse_or(lookup, "MG_COMMISSION_BASE", defaults.commission_base)?,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check internal consistency
    pub fn validate(&self) -> GridResult<()> {
        if self.quorum == 0 || self.quorum as usize > self.validator_set_size {
            return Err(GridError::Configuration(format!(
                "quorum {} must be within 1..={}",
                self.quorum, self.validator_set_size
            )));
        }
        if self.commission_base == 0 || self.commission_rate > self.commission_base {
            return Err(GridError::Configuration(format!(
                "commission {}/{} is not a valid fraction",
                self.commission_rate, self.commission_base
            )));
        }
        Ok(())
    }

    /// Split a generated amount into (to_participant, to_fund)
    ///
    /// The fund share is rounded down, matching the contract's integer division.
    pub fn split_generation(&self, amount: &Amount) -> (Amount, Amount) {
        let to_fund = amount.as_biguint() * BigUint::from(self.commission_rate)
            / BigUint::from(self.commission_base.max(1));
        let to_participant = amount.as_biguint() - &to_fund;
        (Amount::from(to_participant), Amount::from(to_fund))
    }

    /// Whether a generation event's reported split matches this commission
    ///
    /// `None` for events other than `EnergyGenerated`.
    pub fn generation_split_matches(&self, event: &DomainEvent) -> Option<bool> {
        match event {
            DomainEvent::EnergyGenerated {
                amount,
                to_participant,
                to_fund,
                ..
            } => {
                let (expected_participant, expected_fund) = self.split_generation(amount);
                Some(&expected_participant == to_participant && &expected_fund == to_fund)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, LogPosition, TxHash};
    use chrono::{TimeZone, Utc};

    fn generated(amount: u64, to_participant: u64, to_fund: u64) -> DomainEvent {
        DomainEvent::EnergyGenerated {
            participant: Address::repeat_byte(1),
            amount: Amount::from(amount),
            meter: Address::repeat_byte(9),
            to_participant: Amount::from(to_participant),
            to_fund: Amount::from(to_fund),
            position: LogPosition {
                block_number: 10,
                log_index: 0,
                tx_hash: TxHash::repeat_byte(3),
                timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            },
        }
    }

    #[test]
    fn test_defaults() {
        let params = ProtocolParams::default();
        assert_eq!(params.quorum, 2);
        assert_eq!(params.validator_set_size, 3);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid_quorum() {
        let params = ProtocolParams {
            quorum: 4,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(GridError::Configuration(_))));
    }

    #[test]
    fn test_zero_quorum_is_rejected() {
        let params = ProtocolParams {
            quorum: 0,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(GridError::Configuration(_))));

        let lookup = |var: &str| (var == "MG_QUORUM").then(|| "0".to_string());
        assert!(matches!(
            ProtocolParams::from_lookup(&lookup),
            Err(GridError::Configuration(_))
        ));
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let quorum = |var: &str| (var == "MG_QUORUM").then(|| "two".to_string());
        assert!(matches!(
            ProtocolParams::from_lookup(&quorum),
            Err(GridError::Configuration(_))
        ));

        let rate = |var: &str| (var == "MG_COMMISSION_RATE").then(|| "1%".to_string());
        assert!(matches!(
            ProtocolParams::from_lookup(&rate),
            Err(GridError::Configuration(_))
        ));

        let inverted = |var: &str| match var {
            "MG_COMMISSION_RATE" => Some("5".to_string()),
            "MG_COMMISSION_BASE" => Some("4".to_string()),
            _ => None,
        };
        assert!(ProtocolParams::from_lookup(&inverted).is_err());
    }

    #[test]
    fn test_lookup_overrides() {
        let lookup = |var: &str| match var {
            "MG_QUORUM" => Some("3".to_string()),
            "MG_COMMISSION_RATE" => Some("5".to_string()),
            _ => None,
        };
        let params = ProtocolParams::from_lookup(&lookup).unwrap();
        assert_eq!(params.quorum, 3);
        assert_eq!(params.commission_rate, 5);
        assert_eq!(params.commission_base, 100);
        let unset = |_: &str| -> Option<String> { None };
        assert_eq!(ProtocolParams::from_lookup(&unset).unwrap(), ProtocolParams::default());
    }

    #[test]
    fn test_split_generation_rounds_fund_down() {
        let params = ProtocolParams::default();
        let (to_participant, to_fund) = params.split_generation(&Amount::from(250u64));
        assert_eq!(to_fund, Amount::from(2u64));
        assert_eq!(to_participant, Amount::from(248u64));

        let (to_participant, to_fund) = params.split_generation(&Amount::from(50u64));
        assert_eq!(to_fund, Amount::zero());
        assert_eq!(to_participant, Amount::from(50u64));
    }

    #[test]
    fn test_generation_split_matches() {
        let params = ProtocolParams::default();
        assert_eq!(params.generation_split_matches(&generated(250, 248, 2)), Some(true));
        assert_eq!(params.generation_split_matches(&generated(250, 245, 5)), Some(false));

        let five_percent = ProtocolParams {
            commission_rate: 5,
            ..Default::default()
        };
        assert_eq!(five_percent.generation_split_matches(&generated(250, 238, 12)), Some(true));

        let transfer = DomainEvent::Transfer {
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            amount: Amount::from(1u64),
            position: LogPosition {
                block_number: 1,
                log_index: 0,
                tx_hash: TxHash::repeat_byte(1),
                timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            },
        };
        assert_eq!(params.generation_split_matches(&transfer), None);
    }
}
