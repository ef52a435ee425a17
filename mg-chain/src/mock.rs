//! In-memory ledger doubles
//!
//! [`MockChainReader`] answers at the RPC seam (raw calls, logs, blocks) and
//! is used to exercise the gateway and indexer end to end.
//! [`MockLedger`] answers at the [`LedgerGateway`] seam for the read models
//! and the broker.

use alloy_sol_types::SolCall;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mg_core::{
    Activity, ActivityState, Address, Amount, DomainEvent, GridError, GridResult, Lookup,
    ParticipantType, ValidatorSet,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::contracts;
use crate::gateway::LedgerGateway;
use crate::rpc::{parse_quantity, BlockHeader, BlockTag, ChainReader, LogFilter, RawLog};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn mock_failure() -> GridError {
    GridError::RemoteUnavailable("Mock failure mode".to_string())
}

// ============================================================================
// MockChainReader
// ============================================================================

/// Scripted ledger node
pub struct MockChainReader {
    /// Return data keyed by (contract, calldata)
    calls: Mutex<HashMap<(Address, Vec<u8>), Vec<u8>>>,
    /// Logs in emission order, with the emitting contract
    logs: Mutex<Vec<(Address, RawLog)>>,
    /// Block timestamps
    blocks: Mutex<HashMap<u64, DateTime<Utc>>>,
    /// Blocks whose lookup fails
    failing_blocks: Mutex<HashSet<u64>>,
    chain_id: AtomicU64,
    latest_block: AtomicU64,
    block_lookups: AtomicUsize,
    log_queries: AtomicUsize,
    eth_calls: AtomicUsize,
    /// Fail every request
    fail_mode: AtomicBool,
    /// Fail only log queries
    fail_logs: AtomicBool,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            logs: Mutex::new(Vec::new()),
            blocks: Mutex::new(HashMap::new()),
            failing_blocks: Mutex::new(HashSet::new()),
            chain_id: AtomicU64::new(mg_core::DEFAULT_CHAIN_ID),
            latest_block: AtomicU64::new(0),
            block_lookups: AtomicUsize::new(0),
            log_queries: AtomicUsize::new(0),
            eth_calls: AtomicUsize::new(0),
            fail_mode: AtomicBool::new(false),
            fail_logs: AtomicBool::new(false),
        }
    }

    /// Enable failure mode for testing
    pub fn set_fail_mode(&self, fail: bool) {
        self.fail_mode.store(fail, Ordering::SeqCst);
    }

    pub fn set_logs_fail(&self, fail: bool) {
        self.fail_logs.store(fail, Ordering::SeqCst);
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.chain_id.store(chain_id, Ordering::SeqCst);
    }

    /// Answer `eth_call(contract, call)` with `data`
    pub fn set_call_result<C: SolCall>(&self, contract: &Address, call: &C, data: Vec<u8>) {
        lock(&self.calls).insert((*contract, call.abi_encode()), data);
    }

    pub fn set_block_timestamp(&self, number: u64, timestamp: DateTime<Utc>) {
        lock(&self.blocks).insert(number, timestamp);
        self.latest_block.fetch_max(number, Ordering::SeqCst);
    }

    /// Make lookups of `number` fail
    pub fn fail_block(&self, number: u64) {
        lock(&self.failing_blocks).insert(number);
    }

    pub fn push_log(&self, emitter: &Address, log: RawLog) {
        lock(&self.logs).push((*emitter, log));
    }

    /// Emit `event` from `emitter`, registering its block timestamp
    pub fn push_event(&self, emitter: &Address, event: &DomainEvent) -> GridResult<()> {
        let raw = contracts::encode_log(event, emitter)?;
        self.set_block_timestamp(event.block_number(), event.timestamp());
        self.push_log(emitter, raw);
        Ok(())
    }

    /// Number of block lookups served so far
    pub fn block_lookups(&self) -> usize {
        self.block_lookups.load(Ordering::SeqCst)
    }

    pub fn log_queries(&self) -> usize {
        self.log_queries.load(Ordering::SeqCst)
    }

    /// Number of `eth_call` requests served so far
    pub fn eth_calls(&self) -> usize {
        self.eth_calls.load(Ordering::SeqCst)
    }

    fn failing(&self) -> bool {
        self.fail_mode.load(Ordering::SeqCst)
    }
}

impl Default for MockChainReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn call(&self, to: &Address, data: &[u8]) -> GridResult<Vec<u8>> {
        self.eth_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing() {
            return Err(mock_failure());
        }
        lock(&self.calls)
            .get(&(*to, data.to_vec()))
            .cloned()
            .ok_or_else(|| GridError::RemoteUnavailable("execution reverted".to_string()))
    }

    async fn get_logs(&self, filter: &LogFilter) -> GridResult<Vec<RawLog>> {
        self.log_queries.fetch_add(1, Ordering::SeqCst);
        if self.failing() || self.fail_logs.load(Ordering::SeqCst) {
            return Err(mock_failure());
        }

        let topic0 = format!("0x{}", hex::encode(filter.topic0.as_slice()));
        let to_block = match filter.to_block {
            BlockTag::Number(n) => n,
            BlockTag::Latest => u64::MAX,
        };

        let logs = lock(&self.logs)
            .iter()
            .filter(|(emitter, _)| emitter == &filter.address)
            .filter(|(_, log)| {
                log.topics
                    .first()
                    .map_or(false, |t| t.eq_ignore_ascii_case(&topic0))
            })
            .filter(|(_, log)| {
                // Logs with an unreadable block number are served as-is
                match log.block_number.as_deref().map(parse_quantity) {
                    Some(Ok(n)) => n >= filter.from_block && n <= to_block,
                    _ => true,
                }
            })
            .map(|(_, log)| log.clone())
            .collect();
        Ok(logs)
    }

    async fn block_header(&self, number: u64) -> GridResult<Option<BlockHeader>> {
        self.block_lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing() || lock(&self.failing_blocks).contains(&number) {
            return Err(mock_failure());
        }
        Ok(lock(&self.blocks)
            .get(&number)
            .map(|timestamp| BlockHeader {
                number,
                timestamp: *timestamp,
            }))
    }

    async fn block_number(&self) -> GridResult<u64> {
        if self.failing() {
            return Err(mock_failure());
        }
        Ok(self.latest_block.load(Ordering::SeqCst))
    }

    async fn chain_id(&self) -> GridResult<u64> {
        if self.failing() {
            return Err(mock_failure());
        }
        Ok(self.chain_id.load(Ordering::SeqCst))
    }
}

// ============================================================================
// MockLedger
// ============================================================================

#[derive(Debug, Clone)]
struct MockParticipant {
    participant_type: ParticipantType,
    balance: Amount,
}

/// In-memory ledger state behind the [`LedgerGateway`] seam
pub struct MockLedger {
    participants: Mutex<HashMap<Address, MockParticipant>>,
    fund_balance: Mutex<Amount>,
    validators: Mutex<Option<ValidatorSet>>,
    meters: Mutex<HashMap<Address, bool>>,
    nonces: Mutex<HashMap<Address, u64>>,
    activities: Mutex<BTreeMap<u64, Activity>>,
    failing_activities: Mutex<HashSet<u64>>,
    next_activity_id: AtomicU64,
    activity_reads: AtomicUsize,
    meter_checks: AtomicUsize,
    fail_mode: AtomicBool,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            participants: Mutex::new(HashMap::new()),
            fund_balance: Mutex::new(Amount::zero()),
            validators: Mutex::new(None),
            meters: Mutex::new(HashMap::new()),
            nonces: Mutex::new(HashMap::new()),
            activities: Mutex::new(BTreeMap::new()),
            failing_activities: Mutex::new(HashSet::new()),
            next_activity_id: AtomicU64::new(1),
            activity_reads: AtomicUsize::new(0),
            meter_checks: AtomicUsize::new(0),
            fail_mode: AtomicBool::new(false),
        }
    }

    /// Enable failure mode for testing
    pub fn set_fail_mode(&self, fail: bool) {
        self.fail_mode.store(fail, Ordering::SeqCst);
    }

    pub fn register(&self, address: Address, participant_type: ParticipantType, balance: Amount) {
        lock(&self.participants).insert(
            address,
            MockParticipant {
                participant_type,
                balance,
            },
        );
    }

    pub fn set_fund_balance(&self, amount: Amount) {
        *lock(&self.fund_balance) = amount;
    }

    pub fn set_validators(&self, validators: ValidatorSet) {
        *lock(&self.validators) = Some(validators);
    }

    pub fn authorize_meter(&self, meter: Address, authorized: bool) {
        lock(&self.meters).insert(meter, authorized);
    }

    pub fn set_meter_nonce(&self, meter: Address, nonce: u64) {
        lock(&self.nonces).insert(meter, nonce);
    }

    /// Advance a meter's nonce, as a successful submission would
    pub fn consume_nonce(&self, meter: &Address) {
        *lock(&self.nonces).entry(*meter).or_insert(0) += 1;
    }

    /// Store `activity` under its own id
    pub fn insert_activity(&self, activity: Activity) {
        let id = activity.id;
        self.insert_activity_at(id, activity);
    }

    /// Answer `getActivity(id)` with `activity`, whatever id it carries
    pub fn insert_activity_at(&self, id: u64, activity: Activity) {
        lock(&self.activities).insert(id, activity);
        self.next_activity_id.fetch_max(id + 1, Ordering::SeqCst);
    }

    pub fn set_next_activity_id(&self, next: u64) {
        self.next_activity_id.store(next, Ordering::SeqCst);
    }

    /// Make reads of activity `id` fail
    pub fn fail_activity(&self, id: u64) {
        lock(&self.failing_activities).insert(id);
    }

    pub fn activity_reads(&self) -> usize {
        self.activity_reads.load(Ordering::SeqCst)
    }

    /// Number of `authorizedMeters` reads served
    pub fn meter_checks(&self) -> usize {
        self.meter_checks.load(Ordering::SeqCst)
    }

    fn check(&self) -> GridResult<()> {
        if self.fail_mode.load(Ordering::SeqCst) {
            return Err(mock_failure());
        }
        Ok(())
    }

    /// Zeroed record the contract returns for unknown ids
    fn empty_activity() -> Activity {
        Activity {
            id: 0,
            description: String::new(),
            reward: Amount::zero(),
            executor: Address::ZERO,
            state: ActivityState::Available,
            validators_snapshot: ValidatorSet::new([Address::ZERO; 3]),
            approvals: 0,
        }
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn is_registered(&self, address: &Address) -> GridResult<bool> {
        self.check()?;
        Ok(lock(&self.participants).contains_key(address))
    }

    async fn participant_type(&self, address: &Address) -> GridResult<ParticipantType> {
        self.check()?;
        Ok(lock(&self.participants)
            .get(address)
            .map_or(ParticipantType::Consumer, |p| p.participant_type))
    }

    async fn get_balance(&self, address: &Address) -> GridResult<Amount> {
        self.check()?;
        Ok(lock(&self.participants)
            .get(address)
            .map_or_else(Amount::zero, |p| p.balance.clone()))
    }

    async fn get_total_supply(&self) -> GridResult<Amount> {
        self.check()?;
        let held: Amount = lock(&self.participants)
            .values()
            .map(|p| p.balance.clone())
            .sum();
        Ok(&held + &*lock(&self.fund_balance))
    }

    async fn get_fund_balance(&self) -> GridResult<Amount> {
        self.check()?;
        Ok(lock(&self.fund_balance).clone())
    }

    async fn get_validators(&self) -> Lookup<ValidatorSet> {
        if self.check().is_err() {
            return Lookup::Unknown;
        }
        (*lock(&self.validators)).map_or(Lookup::Unknown, Lookup::Known)
    }

    async fn is_meter_authorized(&self, meter: &Address) -> Lookup<bool> {
        self.meter_checks.fetch_add(1, Ordering::SeqCst);
        if self.check().is_err() {
            return Lookup::Unknown;
        }
        Lookup::Known(lock(&self.meters).get(meter).copied().unwrap_or(false))
    }

    async fn get_meter_nonce(&self, meter: &Address) -> Lookup<u64> {
        if self.check().is_err() {
            return Lookup::Unknown;
        }
        Lookup::Known(lock(&self.nonces).get(meter).copied().unwrap_or(0))
    }

    async fn get_activity(&self, id: u64) -> GridResult<Activity> {
        self.activity_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if lock(&self.failing_activities).contains(&id) {
            return Err(mock_failure());
        }
        Ok(lock(&self.activities)
            .get(&id)
            .cloned()
            .unwrap_or_else(Self::empty_activity))
    }

    async fn get_next_activity_id(&self) -> GridResult<u64> {
        self.check()?;
        Ok(self.next_activity_id.load(Ordering::SeqCst))
    }

    async fn get_participant_count(&self) -> GridResult<u64> {
        self.check()?;
        Ok(lock(&self.participants).len() as u64)
    }

    async fn chain_id(&self) -> GridResult<u64> {
        self.check()?;
        Ok(mg_core::DEFAULT_CHAIN_ID)
    }
}

/// Timestamp helper for tests: `base + block` seconds
pub fn block_time(block: u64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + block as i64, 0)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::IMicrogridManager;

    #[tokio::test]
    async fn test_call_fixture_matches_encoded_call() {
        let reader = MockChainReader::new();
        let manager = Address::repeat_byte(0x80);
        let call = IMicrogridManager::meterNonceCall {
            meter: Address::repeat_byte(9).0,
        };
        reader.set_call_result(&manager, &call, vec![7]);
        assert_eq!(reader.call(&manager, &call.abi_encode()).await.unwrap(), vec![7]);

        let other = IMicrogridManager::meterNonceCall {
            meter: Address::repeat_byte(8).0,
        };
        assert!(reader.call(&manager, &other.abi_encode()).await.is_err());
        assert_eq!(reader.eth_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_reader_fail_mode() {
        let reader = MockChainReader::new();
        reader.set_fail_mode(true);
        assert!(reader.chain_id().await.is_err());
        assert!(reader.block_header(1).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_ledger_nonce_consumption() {
        let ledger = MockLedger::new();
        let meter = Address::repeat_byte(9);
        assert_eq!(ledger.get_meter_nonce(&meter).await, Lookup::Known(0));
        ledger.consume_nonce(&meter);
        assert_eq!(ledger.get_meter_nonce(&meter).await, Lookup::Known(1));
    }

    #[tokio::test]
    async fn test_mock_ledger_unknown_activity_is_sentinel() {
        let ledger = MockLedger::new();
        assert_eq!(ledger.get_activity(42).await.unwrap().id, 0);
        assert_eq!(ledger.activity_reads(), 1);
    }
}
