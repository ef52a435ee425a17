//! Protocol Constants
//!
//! Centralized constants for the microgrid ledger core. Values mirror the
//! deployed contracts; anything deployment-specific lives in configuration.

// ============================================================================
// Quorum
// ============================================================================

/// Number of validators in the active set and in every activity snapshot
pub const VALIDATOR_SET_SIZE: usize = 3;

/// Distinct snapshot approvals required to pay out an activity
pub const DEFAULT_QUORUM: u8 = 2;

// ============================================================================
// Commission
// ============================================================================

/// Commission numerator retained by the community fund on generation
pub const COMMISSION_RATE: u32 = 1;

/// Commission denominator
pub const COMMISSION_BASE: u32 = 100;

// ============================================================================
// Network
// ============================================================================

/// Chain id of the lab network the contracts are deployed on
pub const DEFAULT_CHAIN_ID: u64 = 1337;

/// Activity id reported by the ledger for a non-existent activity
pub const ACTIVITY_SENTINEL_ID: u64 = 0;

/// Default page size for activity listings
pub const DEFAULT_ACTIVITY_PAGE: u64 = 20;

// ============================================================================
// Timeouts
// ============================================================================

/// Default RPC request timeout in seconds
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Default signing service timeout in seconds
pub const DEFAULT_SIGNER_TIMEOUT_SECS: u64 = 15;

/// Default bound on concurrent block lookups during a scan
pub const DEFAULT_MAX_BLOCK_LOOKUPS: usize = 8;
