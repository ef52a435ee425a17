//! Signed metering authorizations
//!
//! An authorization is a capability: the ledger accepts it once, and only
//! while the nonce it carries still equals the meter's current nonce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::primitives::{Address, Amount, Lookup};
use crate::error::{GridError, GridResult};

/// Metering operation a signature authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Generate,
    Consume,
}

impl OperationType {
    /// Raw value used by the signer and the ledger
    pub fn as_u8(&self) -> u8 {
        match self {
            OperationType::Generate => 0,
            OperationType::Consume => 1,
        }
    }

    pub fn from_u8(v: u8) -> GridResult<Self> {
        match v {
            0 => Ok(OperationType::Generate),
            1 => Ok(OperationType::Consume),
            other => Err(GridError::Decode(format!("unknown operation type {}", other))),
        }
    }

    /// Manager entry point that consumes an authorization of this type
    pub fn entry_point(&self) -> &'static str {
        match self {
            OperationType::Generate => "generateEnergy",
            OperationType::Consume => "consumeEnergySigned",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Generate => write!(f, "GENERATE"),
            OperationType::Consume => write!(f, "CONSUME"),
        }
    }
}

/// Raw signature bytes, rendered as `0x` hex
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parse `0x`-prefixed hex; an empty signature is rejected
    pub fn parse(s: &str) -> GridResult<Self> {
        let trimmed = s.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(hex_part)
            .map_err(|e| GridError::Decode(format!("invalid signature hex: {}", e)))?;
        if bytes.is_empty() {
            return Err(GridError::Decode("empty signature".to_string()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Nonce-bound permission for one metering mutation
///
/// `nonce` and `meter_address` are exactly what the signer returned; they are
/// never derived locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOperationAuthorization {
    pub participant: Address,
    pub amount: Amount,
    pub nonce: u64,
    pub operation_type: OperationType,
    pub signature: Signature,
    pub meter_address: Address,
    pub issued_at: DateTime<Utc>,
}

impl SignedOperationAuthorization {
    /// Compare against the ledger's current nonce for the meter
    ///
    /// The ledger advances the nonce when an authorization is consumed, so a
    /// differing nonce means this authorization can no longer be submitted.
    pub fn check_against(&self, current_nonce: Lookup<u64>) -> AuthorizationValidity {
        match current_nonce {
            Lookup::Known(n) if n == self.nonce => AuthorizationValidity::Valid,
            Lookup::Known(n) => AuthorizationValidity::Consumed { current_nonce: n },
            Lookup::Unknown => AuthorizationValidity::Unknown,
        }
    }
}

/// Whether an authorization can still be submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthorizationValidity {
    /// The nonce still matches the ledger
    Valid,
    /// The meter's nonce has moved on
    Consumed { current_nonce: u64 },
    /// The ledger's nonce could not be read
    Unknown,
}

impl AuthorizationValidity {
    pub fn is_valid(&self) -> bool {
        matches!(self, AuthorizationValidity::Valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorization(nonce: u64) -> SignedOperationAuthorization {
        SignedOperationAuthorization {
            participant: Address::repeat_byte(1),
            amount: Amount::from(100u64),
            nonce,
            operation_type: OperationType::Generate,
            signature: Signature::new(vec![0xab; 65]),
            meter_address: Address::repeat_byte(9),
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn test_operation_type_mapping() {
        assert_eq!(OperationType::from_u8(0).unwrap(), OperationType::Generate);
        assert_eq!(OperationType::from_u8(1).unwrap(), OperationType::Consume);
        assert!(OperationType::from_u8(2).is_err());
        assert_eq!(OperationType::Generate.entry_point(), "generateEnergy");
        assert_eq!(OperationType::Consume.entry_point(), "consumeEnergySigned");
        assert_eq!(
            serde_json::to_string(&OperationType::Consume).unwrap(),
            "\"CONSUME\""
        );
    }

    #[test]
    fn test_signature_parse() {
        let sig = Signature::parse("0xABcd").unwrap();
        assert_eq!(sig.as_bytes(), &[0xab, 0xcd]);
        assert_eq!(sig.to_hex(), "0xabcd");
        assert!(Signature::parse("0x").is_err());
        assert!(Signature::parse("0xzz").is_err());
    }

    #[test]
    fn test_validity_window() {
        let auth = authorization(7);
        assert_eq!(auth.check_against(Lookup::Known(7)), AuthorizationValidity::Valid);
        assert_eq!(
            auth.check_against(Lookup::Known(8)),
            AuthorizationValidity::Consumed { current_nonce: 8 }
        );
        assert_eq!(auth.check_against(Lookup::Unknown), AuthorizationValidity::Unknown);
        assert!(!auth.check_against(Lookup::Unknown).is_valid());
    }
}
