//! Domain events derived from ledger logs
//!
//! One tagged variant per log kind. Every event carries the position of the
//! log that produced it; `(tx_hash, log_index)` identifies the event across
//! overlapping scans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::primitives::{keccak256, Address, Amount, TxHash, B256};

/// Kind of ledger log the indexer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    EnergyGenerated,
    EnergyConsumed,
    Transfer,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::EnergyGenerated,
        EventKind::EnergyConsumed,
        EventKind::Transfer,
    ];

    /// Canonical event signature
    pub fn signature(&self) -> &'static str {
        match self {
            EventKind::EnergyGenerated => {
                "EnergyGenerated(address,uint256,address,uint256,uint256)"
            }
            EventKind::EnergyConsumed => "EnergyConsumed(address,uint256,address)",
            EventKind::Transfer => "Transfer(address,address,uint256)",
        }
    }

    /// Topic0 of logs of this kind
    pub fn topic(&self) -> B256 {
        keccak256(self.signature().as_bytes())
    }

    /// Transfers come from the token contract, energy events from the manager
    pub fn emitted_by_token(&self) -> bool {
        matches!(self, EventKind::Transfer)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::EnergyGenerated => "EnergyGenerated",
            EventKind::EnergyConsumed => "EnergyConsumed",
            EventKind::Transfer => "Transfer",
        };
        f.write_str(s)
    }
}

/// Identity of an event: the log that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId {
    pub tx_hash: TxHash,
    pub log_index: u64,
}

/// Where and when a log was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPosition {
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: TxHash,
    /// Timestamp of the containing block
    pub timestamp: DateTime<Utc>,
}

/// Decoded, application-level ledger fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DomainEvent {
    EnergyGenerated {
        participant: Address,
        amount: Amount,
        meter: Address,
        to_participant: Amount,
        to_fund: Amount,
        position: LogPosition,
    },
    EnergyConsumed {
        participant: Address,
        amount: Amount,
        meter: Address,
        position: LogPosition,
    },
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
        position: LogPosition,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::EnergyGenerated { .. } => EventKind::EnergyGenerated,
            DomainEvent::EnergyConsumed { .. } => EventKind::EnergyConsumed,
            DomainEvent::Transfer { .. } => EventKind::Transfer,
        }
    }

    pub fn position(&self) -> &LogPosition {
        match self {
            DomainEvent::EnergyGenerated { position, .. }
            | DomainEvent::EnergyConsumed { position, .. }
            | DomainEvent::Transfer { position, .. } => position,
        }
    }

    pub fn id(&self) -> EventId {
        let position = self.position();
        EventId {
            tx_hash: position.tx_hash,
            log_index: position.log_index,
        }
    }

    pub fn block_number(&self) -> u64 {
        self.position().block_number
    }

    pub fn log_index(&self) -> u64 {
        self.position().log_index
    }

    pub fn tx_hash(&self) -> TxHash {
        self.position().tx_hash
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.position().timestamp
    }

    /// Energy or token amount moved by the event
    pub fn amount(&self) -> &Amount {
        match self {
            DomainEvent::EnergyGenerated { amount, .. }
            | DomainEvent::EnergyConsumed { amount, .. }
            | DomainEvent::Transfer { amount, .. } => amount,
        }
    }

    /// Participant of an energy event; `None` for transfers
    pub fn participant(&self) -> Option<&Address> {
        match self {
            DomainEvent::EnergyGenerated { participant, .. }
            | DomainEvent::EnergyConsumed { participant, .. } => Some(participant),
            DomainEvent::Transfer { .. } => None,
        }
    }

    /// Reporting meter of an energy event; `None` for transfers
    pub fn meter(&self) -> Option<&Address> {
        match self {
            DomainEvent::EnergyGenerated { meter, .. }
            | DomainEvent::EnergyConsumed { meter, .. } => Some(meter),
            DomainEvent::Transfer { .. } => None,
        }
    }

    /// Order with the most recent event first
    ///
    /// Higher block first, then higher log index; the transaction hash only
    /// breaks ties between malformed duplicates so the order stays total.
    pub fn cmp_recent_first(&self, other: &DomainEvent) -> Ordering {
        other
            .block_number()
            .cmp(&self.block_number())
            .then_with(|| other.log_index().cmp(&self.log_index()))
            .then_with(|| self.tx_hash().cmp(&other.tx_hash()))
    }
}
