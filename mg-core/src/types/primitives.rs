//! Ledger primitives
//!
//! Byte-level types come from `alloy-primitives`. [`Address`] wraps the alloy
//! address so that it always renders as lower-case `0x` hex rather than the
//! mixed-case checksum form; parsing accepts either. Amounts are unbounded
//! so that sums over many events never overflow.

use alloy_primitives::{FixedBytes, U256};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{GridError, GridResult};

pub use alloy_primitives::{keccak256, B256};

/// 32-byte transaction hash
pub type TxHash = B256;

// ============================================================================
// Address
// ============================================================================

/// 20-byte ledger account identifier
///
/// Equality is on bytes, so two spellings differing only in case compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub alloy_primitives::Address);

impl Address {
    /// The zero address
    pub const ZERO: Address = Address::new([0u8; 20]);

    /// Create from raw bytes
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(alloy_primitives::Address(FixedBytes(bytes)))
    }

    /// Address with every byte set to `byte`
    pub const fn repeat_byte(byte: u8) -> Self {
        Self::new([byte; 20])
    }

    /// Parse from `0x`-prefixed or bare hex, any case
    pub fn parse(s: &str) -> GridResult<Self> {
        alloy_primitives::Address::from_str(s.trim())
            .map(Self)
            .map_err(|e| GridError::InvalidInput(format!("invalid address {:?}: {}", s, e)))
    }

    /// Take the low 20 bytes of a 32-byte ABI word or topic
    pub fn from_word(word: B256) -> Self {
        Self(alloy_primitives::Address::from_word(word))
    }

    /// Left-pad to a 32-byte ABI word
    pub fn to_word(&self) -> B256 {
        self.0.into_word()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Lower-case `0x` hex form
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0.as_slice()))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == alloy_primitives::Address::ZERO
    }
}

impl From<alloy_primitives::Address> for Address {
    fn from(address: alloy_primitives::Address) -> Self {
        Self(address)
    }
}

impl From<Address> for alloy_primitives::Address {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Amount
// ============================================================================

/// Non-negative token / energy amount of arbitrary precision
///
/// Serialized as a decimal string so that JSON consumers never lose precision.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Amount(BigUint);

impl Amount {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// Narrow to a 256-bit ABI word
    ///
    /// Fails when the value does not fit in 256 bits.
    pub fn to_u256(&self) -> GridResult<U256> {
        U256::try_from_be_slice(&self.0.to_bytes_be()).ok_or_else(|| {
            GridError::InvalidInput(format!("amount {} exceeds 256 bits", self.0))
        })
    }

    /// Parse a decimal string
    pub fn parse_decimal(s: &str) -> GridResult<Self> {
        BigUint::parse_bytes(s.trim().as_bytes(), 10)
            .map(Self)
            .ok_or_else(|| GridError::InvalidInput(format!("invalid decimal amount {:?}", s)))
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Narrow to u64 when the value fits
    pub fn to_u64(&self) -> Option<u64> {
        self.0.to_u64()
    }

    /// Decimal string form
    pub fn to_decimal(&self) -> String {
        self.0.to_str_radix(10)
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(BigUint::from(v))
    }
}

impl From<U256> for Amount {
    fn from(v: U256) -> Self {
        Self(BigUint::from_bytes_be(&v.to_be_bytes::<32>()))
    }
}

impl From<BigUint> for Amount {
    fn from(v: BigUint) -> Self {
        Self(v)
    }
}

impl std::ops::Add for &Amount {
    type Output = Amount;

    fn add(self, rhs: &Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        Amount(iter.fold(BigUint::zero(), |acc, a| acc + a.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl FromStr for Amount {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::parse_decimal(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Lookup
// ============================================================================

/// Result of a best-effort remote query
///
/// `Unknown` means the value could not be read; it never stands in for a
/// zero, `false` or empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Lookup<T> {
    Known(T),
    Unknown,
}

impl<T> Lookup<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Lookup::Known(v) => Some(v),
            Lookup::Unknown => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Known(v) => Some(v),
            Lookup::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Lookup::Known(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Known(v) => Lookup::Known(f(v)),
            Lookup::Unknown => Lookup::Unknown,
        }
    }
}

impl<T, E> From<Result<T, E>> for Lookup<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Lookup::Known(v),
            Err(_) => Lookup::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_case_insensitive() {
        let upper = Address::parse("0x9EB2074A0a4038f5A5e8a03d64B0EA9031159882").unwrap();
        let lower = Address::parse("0x9eb2074a0a4038f5a5e8a03d64b0ea9031159882").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "0x9eb2074a0a4038f5a5e8a03d64b0ea9031159882");
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("not-hex").is_err());
    }

    #[test]
    fn test_address_word_roundtrip() {
        let addr = Address::parse("0xC63Dec757Bc85D78117320c2BC3Cc580989CbAFd").unwrap();
        let word = addr.to_word();
        assert!(word[..12].iter().all(|&b| b == 0));
        assert_eq!(Address::from_word(word), addr);
        assert_eq!(Address::repeat_byte(0xab), Address::new([0xab; 20]));
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn test_address_serde_is_lower_case() {
        let addr = Address::parse("0x9EB2074A0a4038f5A5e8a03d64B0EA9031159882").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x9eb2074a0a4038f5a5e8a03d64b0ea9031159882\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_amount_u256_bounds() {
        let amount = Amount::from(U256::from(50u64));
        assert_eq!(amount, Amount::from(50u64));
        assert_eq!(amount.to_u256().unwrap(), U256::from(50u64));

        let max = Amount::from(U256::MAX);
        assert_eq!(
            max.to_decimal(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
        assert_eq!(max.to_u256().unwrap(), U256::MAX);
        let doubled = &max + &max;
        assert!(doubled.to_u256().is_err());
    }

    #[test]
    fn test_amount_serde_decimal_string() {
        let amount = Amount::from(1_000_000u64);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1000000\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_keccak_transfer_topic() {
        assert_eq!(
            hex::encode(keccak256(b"Transfer(address,address,uint256)").as_slice()),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_lookup_from_result() {
        let ok: Lookup<u8> = Ok::<u8, ()>(3).into();
        let err: Lookup<u8> = Err::<u8, ()>(()).into();
        assert_eq!(ok.known(), Some(&3));
        assert!(!err.is_known());
    }
}
