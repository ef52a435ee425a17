//! Participant registry types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::primitives::{Address, Amount};
use crate::error::{GridError, GridResult};

/// Role of a registered participant
///
/// Fixed at registration by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantType {
    /// May consume and transfer
    Consumer,
    /// May also generate
    Prosumer,
}

impl ParticipantType {
    /// Raw `uint8` value used by the ledger
    pub fn as_u8(&self) -> u8 {
        match self {
            ParticipantType::Consumer => 0,
            ParticipantType::Prosumer => 1,
        }
    }

    pub fn from_u8(v: u8) -> GridResult<Self> {
        match v {
            0 => Ok(ParticipantType::Consumer),
            1 => Ok(ParticipantType::Prosumer),
            other => Err(GridError::Decode(format!("unknown participant type {}", other))),
        }
    }

    pub fn can_generate(&self) -> bool {
        matches!(self, ParticipantType::Prosumer)
    }
}

impl fmt::Display for ParticipantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantType::Consumer => write!(f, "consumer"),
            ParticipantType::Prosumer => write!(f, "prosumer"),
        }
    }
}

/// Registry entry as read from the manager contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub is_registered: bool,
    pub participant_type: ParticipantType,
}

/// Participant profile snapshot
///
/// Composed from three separate reads; the fields are not guaranteed to come
/// from the same block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub address: Address,
    pub is_registered: bool,
    pub participant_type: ParticipantType,
    pub balance: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_type_raw_values() {
        assert_eq!(ParticipantType::from_u8(0).unwrap(), ParticipantType::Consumer);
        assert_eq!(ParticipantType::from_u8(1).unwrap(), ParticipantType::Prosumer);
        assert!(matches!(ParticipantType::from_u8(7), Err(GridError::Decode(_))));
        assert!(ParticipantType::Prosumer.can_generate());
        assert!(!ParticipantType::Consumer.can_generate());
    }
}
