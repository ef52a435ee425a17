//! Community activity lifecycle
//!
//! Activities move Available → Claimed → InValidation → Paid, with a
//! Cancelled side exit from Available or Claimed. When an activity is claimed
//! the ledger freezes the current validator set into the activity; approvals
//! are counted against that snapshot, never against the live set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::primitives::{Address, Amount};
use crate::constants::{ACTIVITY_SENTINEL_ID, VALIDATOR_SET_SIZE};
use crate::error::{GridError, GridResult};

/// Activity lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Available,
    Claimed,
    InValidation,
    Paid,
    Cancelled,
}

impl ActivityState {
    pub fn as_u8(&self) -> u8 {
        match self {
            ActivityState::Available => 0,
            ActivityState::Claimed => 1,
            ActivityState::InValidation => 2,
            ActivityState::Paid => 3,
            ActivityState::Cancelled => 4,
        }
    }

    pub fn from_u8(v: u8) -> GridResult<Self> {
        match v {
            0 => Ok(ActivityState::Available),
            1 => Ok(ActivityState::Claimed),
            2 => Ok(ActivityState::InValidation),
            3 => Ok(ActivityState::Paid),
            4 => Ok(ActivityState::Cancelled),
            other => Err(GridError::Decode(format!("unknown activity state {}", other))),
        }
    }

    /// Whether the ledger permits moving from `self` to `next`
    pub fn can_transition(&self, next: ActivityState) -> bool {
        use ActivityState::*;
        matches!(
            (self, next),
            (Available, Claimed)
                | (Claimed, InValidation)
                | (InValidation, Paid)
                | (Available, Cancelled)
                | (Claimed, Cancelled)
        )
    }

    /// Paid and Cancelled are final
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivityState::Paid | ActivityState::Cancelled)
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityState::Available => "available",
            ActivityState::Claimed => "claimed",
            ActivityState::InValidation => "in_validation",
            ActivityState::Paid => "paid",
            ActivityState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Ordered set of exactly three validators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatorSet(pub [Address; VALIDATOR_SET_SIZE]);

impl ValidatorSet {
    pub fn new(validators: [Address; VALIDATOR_SET_SIZE]) -> Self {
        Self(validators)
    }

    /// Build from a slice, requiring exactly three entries
    pub fn from_slice(validators: &[Address]) -> GridResult<Self> {
        let arr: [Address; VALIDATOR_SET_SIZE] = validators.try_into().map_err(|_| {
            GridError::Decode(format!(
                "validator set must have {} entries, got {}",
                VALIDATOR_SET_SIZE,
                validators.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.0
    }
}

/// Community activity as reported by the manager contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Monotonic, 1-based
    pub id: u64,
    pub description: String,
    pub reward: Amount,
    /// Zero address until claimed
    pub executor: Address,
    pub state: ActivityState,
    /// Validator set frozen at claim time
    pub validators_snapshot: ValidatorSet,
    /// Approvals recorded by the ledger (0..=3)
    pub approvals: u8,
}

impl Activity {
    /// Whether this record is the ledger's "does not exist" sentinel
    pub fn is_sentinel(&self) -> bool {
        self.id == ACTIVITY_SENTINEL_ID
    }

    /// Whether `address` may approve this activity
    pub fn is_validator_for(&self, address: &Address) -> bool {
        self.validators_snapshot.contains(address)
    }

    /// Quorum progress given the ledger-recorded approval count
    pub fn quorum_status(&self, quorum: u8) -> QuorumStatus {
        QuorumStatus::new(self.approvals, quorum)
    }

    /// Whether the ledger would accept a payout now
    pub fn is_payable(&self, quorum: u8) -> bool {
        self.state == ActivityState::InValidation && self.quorum_status(quorum).reached
    }
}

/// Quorum progress of one activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumStatus {
    pub approvals: u8,
    pub required: u8,
    pub reached: bool,
}

impl QuorumStatus {
    pub fn new(approvals: u8, required: u8) -> Self {
        Self {
            approvals,
            required,
            reached: approvals >= required,
        }
    }

    pub fn remaining(&self) -> u8 {
        self.required.saturating_sub(self.approvals)
    }
}

/// Outcome of recording one approval in an [`ApprovalTally`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// First approval from this validator; the count increased
    Counted,
    /// This validator already approved; the count is unchanged
    Duplicate,
}

/// Distinct-validator approval counter bound to a snapshot
///
/// The ledger enforces one approval per validator upstream; this tally applies
/// the same rule when approvals are re-derived off-chain, e.g. from events.
#[derive(Debug, Clone)]
pub struct ApprovalTally {
    snapshot: ValidatorSet,
    approved: BTreeSet<Address>,
    quorum: u8,
}

impl ApprovalTally {
    pub fn new(snapshot: ValidatorSet, quorum: u8) -> Self {
        Self {
            snapshot,
            approved: BTreeSet::new(),
            quorum,
        }
    }

    /// Record an approval from `validator`
    ///
    /// Addresses outside the snapshot are rejected, including validators that
    /// joined the live set after the claim.
    pub fn approve(&mut self, validator: Address) -> GridResult<ApprovalOutcome> {
        if !self.snapshot.contains(&validator) {
            return Err(GridError::InvalidInput(format!(
                "{} is not in the activity's validator snapshot",
                validator
            )));
        }
        if self.approved.insert(validator) {
            Ok(ApprovalOutcome::Counted)
        } else {
            Ok(ApprovalOutcome::Duplicate)
        }
    }

    pub fn count(&self) -> u8 {
        self.approved.len() as u8
    }

    pub fn status(&self) -> QuorumStatus {
        QuorumStatus::new(self.count(), self.quorum)
    }

    pub fn has_approved(&self, validator: &Address) -> bool {
        self.approved.contains(validator)
    }
}
