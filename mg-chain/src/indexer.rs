//! Chain Event Indexer
//!
//! Turns raw ledger logs into a deduplicated, most-recent-first stream of
//! [`DomainEvent`]s.
//!
//! # Scan pipeline
//!
//! ```text
//! eth_getLogs(contract, topic0, range)      whole-range failure -> RemoteUnavailable
//!   -> decode each log                      bad log -> skipped with a warning
//!   -> address filter (case-insensitive)
//!   -> dedup by (tx hash, log index)
//!   -> resolve timestamps, once per block   bounded concurrency, merged into a BTreeMap
//!   -> sort by block desc, log index desc
//! ```
//!
//! Filtering and dedup run before timestamp resolution so that discarded logs
//! cost no block lookups; the output is the same as resolving first.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use mg_core::logging::operations;
use mg_core::{Address, DomainEvent, EventId, EventKind, GridError, GridResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ChainConfig;
use crate::contracts::{self, DecodedLog, LogPayload};
use crate::rpc::{BlockTag, ChainReader, LogFilter};

/// Inclusive block range of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: BlockTag,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self {
            from,
            to: BlockTag::Number(to),
        }
    }

    /// From `from` up to the latest block
    pub fn from_block(from: u64) -> Self {
        Self {
            from,
            to: BlockTag::Latest,
        }
    }

    /// Whole chain
    pub fn all() -> Self {
        Self::from_block(0)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.to, BlockTag::Number(to) if to < self.from)
    }
}

/// Optional address restriction of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressFilter {
    /// Every event
    #[default]
    Any,
    /// Energy events of this participant; transfers from or to it
    Participant(Address),
    /// Transfers matching the given sides; energy scans reject this filter
    Transfer {
        from: Option<Address>,
        to: Option<Address>,
    },
}

impl AddressFilter {
    fn accepts(&self, payload: &LogPayload) -> bool {
        match (self, payload) {
            (AddressFilter::Any, _) => true,
            (AddressFilter::Participant(p), LogPayload::EnergyGenerated { participant, .. })
            | (AddressFilter::Participant(p), LogPayload::EnergyConsumed { participant, .. }) => {
                participant == p
            }
            (AddressFilter::Participant(p), LogPayload::Transfer { from, to, .. }) => {
                from == p || to == p
            }
            (
                AddressFilter::Transfer { from: want_from, to: want_to },
                LogPayload::Transfer { from, to, .. },
            ) => want_from.map_or(true, |f| &f == from) && want_to.map_or(true, |t| &t == to),
            (AddressFilter::Transfer { .. }, _) => false,
        }
    }
}

/// Scans the token and manager contracts for domain events
pub struct ChainEventIndexer {
    reader: Arc<dyn ChainReader>,
    token: Address,
    manager: Address,
    max_concurrent_block_lookups: usize,
}

impl ChainEventIndexer {
    pub fn new(reader: Arc<dyn ChainReader>, config: &ChainConfig) -> Self {
        Self {
            reader,
            token: config.token_address,
            manager: config.manager_address,
            max_concurrent_block_lookups: config.max_concurrent_block_lookups.max(1),
        }
    }

    fn emitter(&self, kind: EventKind) -> Address {
        if kind.emitted_by_token() {
            self.token
        } else {
            self.manager
        }
    }

    /// Scan `range` for events of `kind` matching `filter`
    ///
    /// An empty range or no matches yields an empty vector. Only a failure to
    /// fetch the logs fails the call.
    pub async fn scan(
        &self,
        kind: EventKind,
        filter: &AddressFilter,
        range: BlockRange,
    ) -> GridResult<Vec<DomainEvent>> {
        if matches!(filter, AddressFilter::Transfer { .. }) && kind != EventKind::Transfer {
            return Err(GridError::InvalidInput(format!(
                "from/to filter does not apply to {} events",
                kind
            )));
        }
        if range.is_empty() {
            debug!(operation = operations::SCAN, kind = %kind, "Empty block range");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let log_filter = LogFilter {
            address: self.emitter(kind),
            topic0: contracts::event_topic(kind),
            from_block: range.from,
            to_block: range.to,
        };

        let raw_logs = self.reader.get_logs(&log_filter).await.map_err(|e| {
            warn!(operation = operations::SCAN, kind = %kind, error = %e, "Log fetch failed");
            match e {
                GridError::RemoteUnavailable(_) => e,
                other => GridError::RemoteUnavailable(format!("eth_getLogs: {}", other)),
            }
        })?;
        let fetched = raw_logs.len();

        let mut unique: BTreeMap<EventId, DecodedLog> = BTreeMap::new();
        for raw in &raw_logs {
            if raw.removed {
                debug!(tx_hash = ?raw.transaction_hash, "Skipping log removed by reorg");
                continue;
            }
            let decoded = match contracts::decode_log(kind, raw) {
                Ok(d) => d,
                Err(e) => {
                    warn!(
                        kind = %kind,
                        tx_hash = ?raw.transaction_hash,
                        log_index = ?raw.log_index,
                        error = %e,
                        "Skipping undecodable log"
                    );
                    continue;
                }
            };
            if !filter.accepts(&decoded.payload) {
                continue;
            }
            unique.entry(decoded.id()).or_insert(decoded);
        }

        let blocks: BTreeSet<u64> = unique.values().map(|d| d.block_number).collect();
        let timestamps = self.resolve_timestamps(blocks).await;

        let mut events = Vec::with_capacity(unique.len());
        let mut unresolved = 0usize;
        for decoded in unique.into_values() {
            match timestamps.get(&decoded.block_number) {
                Some(ts) => events.push(decoded.into_event(*ts)),
                None => unresolved += 1,
            }
        }
        if unresolved > 0 {
            warn!(
                kind = %kind,
                count = unresolved,
                "Dropped events whose block timestamp could not be resolved"
            );
        }

        events.sort_by(|a, b| a.cmp_recent_first(b));

        info!(
            operation = operations::SCAN,
            kind = %kind,
            from_block = range.from,
            fetched,
            count = events.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Event scan complete"
        );
        Ok(events)
    }

    /// Resolve each distinct block once, with bounded concurrency
    async fn resolve_timestamps(&self, blocks: BTreeSet<u64>) -> BTreeMap<u64, DateTime<Utc>> {
        let reader = Arc::clone(&self.reader);
        let results: Vec<(u64, GridResult<Option<DateTime<Utc>>>)> = stream::iter(blocks)
            .map(|number| {
                let reader = Arc::clone(&reader);
                async move {
                    let header = reader.block_header(number).await;
                    (number, header.map(|h| h.map(|h| h.timestamp)))
                }
            })
            .buffer_unordered(self.max_concurrent_block_lookups)
            .collect()
            .await;

        let mut resolved = BTreeMap::new();
        for (number, result) in results {
            match result {
                Ok(Some(ts)) => {
                    resolved.insert(number, ts);
                }
                Ok(None) => {
                    warn!(operation = operations::RESOLVE_BLOCK, block = number, "Block not found");
                }
                Err(e) => {
                    warn!(
                        operation = operations::RESOLVE_BLOCK,
                        block = number,
                        error = %e,
                        "Block lookup failed"
                    );
                }
            }
        }
        resolved
    }

    /// `EnergyGenerated` events, optionally for one participant
    pub async fn energy_generated(
        &self,
        participant: Option<Address>,
        range: BlockRange,
    ) -> GridResult<Vec<DomainEvent>> {
        let filter = participant.map_or(AddressFilter::Any, AddressFilter::Participant);
        self.scan(EventKind::EnergyGenerated, &filter, range).await
    }

    /// `EnergyConsumed` events, optionally for one participant
    pub async fn energy_consumed(
        &self,
        participant: Option<Address>,
        range: BlockRange,
    ) -> GridResult<Vec<DomainEvent>> {
        let filter = participant.map_or(AddressFilter::Any, AddressFilter::Participant);
        self.scan(EventKind::EnergyConsumed, &filter, range).await
    }

    /// Token transfers, optionally restricted by sender and/or recipient
    pub async fn transfers(
        &self,
        from: Option<Address>,
        to: Option<Address>,
        range: BlockRange,
    ) -> GridResult<Vec<DomainEvent>> {
        let filter = if from.is_none() && to.is_none() {
            AddressFilter::Any
        } else {
            AddressFilter::Transfer { from, to }
        };
        self.scan(EventKind::Transfer, &filter, range).await
    }
}

/// Accumulates successive, possibly overlapping scans
///
/// Each (tx hash, log index) is kept once; the first observation wins.
#[derive(Debug, Clone, Default)]
pub struct EventFeed {
    events: BTreeMap<EventId, DomainEvent>,
}

impl EventFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a scan result, returning how many events were new
    pub fn merge(&mut self, batch: impl IntoIterator<Item = DomainEvent>) -> usize {
        let before = self.events.len();
        for event in batch {
            self.events.entry(event.id()).or_insert(event);
        }
        self.events.len() - before
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.events.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events, most recent first
    pub fn events(&self) -> Vec<DomainEvent> {
        let mut out: Vec<DomainEvent> = self.events.values().cloned().collect();
        out.sort_by(|a, b| a.cmp_recent_first(b));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mg_core::{Amount, LogPosition, TxHash};

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn transfer(from: u8, to: u8, block: u64, log_index: u64) -> DomainEvent {
        DomainEvent::Transfer {
            from: addr(from),
            to: addr(to),
            amount: Amount::from(1u64),
            position: LogPosition {
                block_number: block,
                log_index,
                tx_hash: TxHash::repeat_byte(block as u8),
                timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            },
        }
    }

    #[test]
    fn test_block_range() {
        assert!(BlockRange::new(10, 9).is_empty());
        assert!(!BlockRange::new(10, 10).is_empty());
        assert!(!BlockRange::from_block(10).is_empty());
    }

    #[test]
    fn test_filter_is_case_insensitive_by_construction() {
        let upper = Address::parse("0xDBC1F6EE28C545EBD291D1D2D49646BC834549EF").unwrap();
        let lower = Address::parse("0xdbc1f6ee28c545ebd291d1d2d49646bc834549ef").unwrap();
        let payload = LogPayload::EnergyConsumed {
            participant: lower,
            amount: Amount::from(1u64),
            meter: addr(9),
        };
        assert!(AddressFilter::Participant(upper).accepts(&payload));
    }

    #[test]
    fn test_transfer_filter_sides() {
        let payload = LogPayload::Transfer {
            from: addr(1),
            to: addr(2),
            amount: Amount::from(1u64),
        };
        assert!(AddressFilter::Transfer { from: Some(addr(1)), to: None }.accepts(&payload));
        assert!(AddressFilter::Transfer { from: None, to: Some(addr(2)) }.accepts(&payload));
        assert!(!AddressFilter::Transfer { from: Some(addr(2)), to: None }.accepts(&payload));
        assert!(AddressFilter::Participant(addr(2)).accepts(&payload));
        assert!(!AddressFilter::Participant(addr(3)).accepts(&payload));
    }

    #[test]
    fn test_feed_merges_overlapping_batches() {
        let mut feed = EventFeed::new();
        assert_eq!(feed.merge(vec![transfer(1, 2, 5, 0), transfer(1, 2, 6, 0)]), 2);
        assert_eq!(feed.merge(vec![transfer(1, 2, 6, 0), transfer(1, 2, 7, 1)]), 1);
        assert_eq!(feed.len(), 3);

        let blocks: Vec<u64> = feed.events().iter().map(|e| e.block_number()).collect();
        assert_eq!(blocks, vec![7, 6, 5]);
    }
}
