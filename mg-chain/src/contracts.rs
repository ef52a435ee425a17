//! Ledger contract interfaces
//!
//! Solidity declarations of the token and manager contracts, and the glue
//! between their generated bindings and the domain types. All ABI encoding
//! and decoding goes through `alloy-sol-types`; decoding is always strict
//! (canonical encoding, clean address and bool words).
//!
//! `getActivity` is declared as returning a struct, which encodes with a
//! leading offset word. Some deployments return the same fields as a flat
//! tuple instead; [`decode_activity`] accepts both.

use alloy_primitives::{LogData, U256};
use alloy_sol_types::{sol, SolCall, SolEvent, SolValue};
use chrono::{DateTime, Utc};
use mg_core::{
    Activity, ActivityState, Address, Amount, DomainEvent, EventId, EventKind, GridError,
    GridResult, LogPosition, TxHash, ValidatorSet, B256,
};

use crate::rpc::{decode_hex_data, parse_quantity, RawLog};

sol! {
    /// Fungible energy token
    interface IEnergyToken {
        function balanceOf(address account) external view returns (uint256 balance);
        function totalSupply() external view returns (uint256 supply);
        function transfer(address to, uint256 amount) external returns (bool success);

        event Transfer(address indexed from, address indexed to, uint256 value);
    }

    /// Microgrid manager: participants, meters, activities and validators
    interface IMicrogridManager {
        struct ActivityRecord {
            uint256 id;
            string description;
            uint256 reward;
            address executor;
            uint8 state;
            address[3] validators;
            uint8 approvals;
        }

        function isRegistered(address participant) external view returns (bool registered);
        function participantType(address participant) external view returns (uint8 role);
        function getCurrentValidators() external view returns (address[3] memory validators);
        function authorizedMeters(address meter) external view returns (bool authorized);
        function meterNonce(address meter) external view returns (uint256 nonce);
        function getActivity(uint256 id) external view returns (ActivityRecord memory activity);
        function nextActivityId() external view returns (uint256 next);
        function getParticipantCount() external view returns (uint256 count);

        function generateEnergy(
            address participant,
            uint256 amount,
            uint256 nonce,
            bytes calldata signature,
            address meter
        ) external;
        function consumeEnergySigned(
            address participant,
            uint256 amount,
            uint256 nonce,
            bytes calldata signature,
            address meter
        ) external;
        function createActivity(string calldata description, uint256 reward) external;
        function claimActivity(uint256 id) external;
        function submitActivity(uint256 id) external;
        function approveActivity(uint256 id) external;
        function processPayment(uint256 id) external;
        function cancelActivity(uint256 id) external;
        function registerParticipant(address participant, uint8 role) external;
        function authorizeMeter(address meter, bool authorized) external;
        function updateValidators() external;

        event EnergyGenerated(
            address indexed participant,
            uint256 amount,
            address indexed meter,
            uint256 to_participant,
            uint256 to_fund
        );
        event EnergyConsumed(address indexed participant, uint256 amount, address indexed meter);
    }
}

use IMicrogridManager::ActivityRecord;

/// Decode the return data of `C`
pub fn decode_returns<C: SolCall>(data: &[u8]) -> GridResult<C::Return> {
    C::abi_decode_returns(data, true)
        .map_err(|e| GridError::Decode(format!("{}: {}", C::SIGNATURE, e)))
}

/// Narrow a counter word to 64 bits
pub fn to_u64(value: U256, what: &str) -> GridResult<u64> {
    u64::try_from(value)
        .map_err(|_| GridError::Decode(format!("{} {} exceeds 64 bits", what, value)))
}

/// Decode `getCurrentValidators()`, accepting the dynamic `address[]` form as well
pub fn decode_validators(data: &[u8]) -> GridResult<ValidatorSet> {
    let validators = match decode_returns::<IMicrogridManager::getCurrentValidatorsCall>(data) {
        Ok(ret) => ret.validators.to_vec(),
        Err(_) => <Vec<alloy_primitives::Address> as SolValue>::abi_decode(data, true)
            .map_err(|e| GridError::Decode(format!("getCurrentValidators(): {}", e)))?,
    };
    let validators: Vec<Address> = validators.into_iter().map(Address::from).collect();
    ValidatorSet::from_slice(&validators)
}

/// Decode `getActivity(uint256)` in either return layout
///
/// The record is returned as reported, including the id 0 sentinel; callers
/// decide what a sentinel means.
pub fn decode_activity(data: &[u8]) -> GridResult<Activity> {
    let record = match decode_returns::<IMicrogridManager::getActivityCall>(data) {
        Ok(ret) => ret.activity,
        Err(_) => <ActivityRecord as SolValue>::abi_decode_params(data, true).map_err(|_| {
            GridError::Decode("unrecognized getActivity return layout".to_string())
        })?,
    };
    activity_from_record(record)
}

fn activity_from_record(record: ActivityRecord) -> GridResult<Activity> {
    let validators: Vec<Address> = record
        .validators
        .iter()
        .copied()
        .map(Address::from)
        .collect();
    Ok(Activity {
        id: to_u64(record.id, "activity id")?,
        description: record.description,
        reward: Amount::from(record.reward),
        executor: Address::from(record.executor),
        state: ActivityState::from_u8(record.state)?,
        validators_snapshot: ValidatorSet::from_slice(&validators)?,
        approvals: record.approvals,
    })
}

fn record_from_activity(activity: &Activity) -> GridResult<ActivityRecord> {
    let mut validators = [alloy_primitives::Address::ZERO; 3];
    for (slot, validator) in validators.iter_mut().zip(activity.validators_snapshot.iter()) {
        *slot = validator.0;
    }
    Ok(ActivityRecord {
        id: U256::from(activity.id),
        description: activity.description.clone(),
        reward: activity.reward.to_u256()?,
        executor: activity.executor.0,
        state: activity.state.as_u8(),
        validators,
        approvals: activity.approvals,
    })
}

/// Encode an activity as the struct-returning `getActivity` does
pub fn encode_activity(activity: &Activity) -> GridResult<Vec<u8>> {
    Ok(record_from_activity(activity)?.abi_encode())
}

/// Encode an activity as a flat return tuple
pub fn encode_activity_flat(activity: &Activity) -> GridResult<Vec<u8>> {
    Ok(record_from_activity(activity)?.abi_encode_params())
}

// ============================================================================
// Event logs
// ============================================================================

/// Topic0 of logs of `kind`
pub fn event_topic(kind: EventKind) -> B256 {
    match kind {
        EventKind::EnergyGenerated => IMicrogridManager::EnergyGenerated::SIGNATURE_HASH,
        EventKind::EnergyConsumed => IMicrogridManager::EnergyConsumed::SIGNATURE_HASH,
        EventKind::Transfer => IEnergyToken::Transfer::SIGNATURE_HASH,
    }
}

/// Event fields carried by a log, before its block timestamp is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    EnergyGenerated {
        participant: Address,
        amount: Amount,
        meter: Address,
        to_participant: Amount,
        to_fund: Amount,
    },
    EnergyConsumed {
        participant: Address,
        amount: Amount,
        meter: Address,
    },
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
}

/// A decoded log awaiting its block timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLog {
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: TxHash,
    pub payload: LogPayload,
}

impl DecodedLog {
    pub fn id(&self) -> EventId {
        EventId {
            tx_hash: self.tx_hash,
            log_index: self.log_index,
        }
    }

    /// Attach the containing block's timestamp
    pub fn into_event(self, timestamp: DateTime<Utc>) -> DomainEvent {
        let position = LogPosition {
            block_number: self.block_number,
            log_index: self.log_index,
            tx_hash: self.tx_hash,
            timestamp,
        };
        match self.payload {
            LogPayload::EnergyGenerated {
                participant,
                amount,
                meter,
                to_participant,
                to_fund,
            } => DomainEvent::EnergyGenerated {
                participant,
                amount,
                meter,
                to_participant,
                to_fund,
                position,
            },
            LogPayload::EnergyConsumed {
                participant,
                amount,
                meter,
            } => DomainEvent::EnergyConsumed {
                participant,
                amount,
                meter,
                position,
            },
            LogPayload::Transfer { from, to, amount } => DomainEvent::Transfer {
                from,
                to,
                amount,
                position,
            },
        }
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> GridResult<&'a str> {
    field
        .as_deref()
        .ok_or_else(|| GridError::Decode(format!("log has no {}", name)))
}

fn parse_word(s: &str, what: &str) -> GridResult<B256> {
    s.parse::<B256>()
        .map_err(|e| GridError::Decode(format!("invalid {} {:?}: {}", what, s, e)))
}

fn event_error(kind: EventKind, e: alloy_sol_types::Error) -> GridError {
    GridError::Decode(format!("{} log: {}", kind, e))
}

/// Decode a raw log of the given kind
///
/// Fails on pending logs (no block number), on a topic0 that does not belong
/// to `kind`, and on data that is not the canonical encoding of the event.
pub fn decode_log(kind: EventKind, log: &RawLog) -> GridResult<DecodedLog> {
    let block_number = parse_quantity(required(&log.block_number, "block number")?)?;
    let log_index = parse_quantity(required(&log.log_index, "log index")?)?;
    let tx_hash = parse_word(
        required(&log.transaction_hash, "transaction hash")?,
        "transaction hash",
    )?;

    let topics = log
        .topics
        .iter()
        .map(|t| parse_word(t, "topic"))
        .collect::<GridResult<Vec<_>>>()?;
    if topics.len() != 3 {
        return Err(GridError::Decode(format!(
            "{} log needs 3 topics, got {}",
            kind,
            topics.len()
        )));
    }
    if topics[0] != event_topic(kind) {
        return Err(GridError::Decode(format!("topic0 is not {}", kind)));
    }

    let data = decode_hex_data(&log.data)?;
    let topics = topics.iter().copied();

    let payload = match kind {
        EventKind::EnergyGenerated => {
            let event = IMicrogridManager::EnergyGenerated::decode_raw_log(topics, &data, true)
                .map_err(|e| event_error(kind, e))?;
            LogPayload::EnergyGenerated {
                participant: event.participant.into(),
                amount: event.amount.into(),
                meter: event.meter.into(),
                to_participant: event.to_participant.into(),
                to_fund: event.to_fund.into(),
            }
        }
        EventKind::EnergyConsumed => {
            let event = IMicrogridManager::EnergyConsumed::decode_raw_log(topics, &data, true)
                .map_err(|e| event_error(kind, e))?;
            LogPayload::EnergyConsumed {
                participant: event.participant.into(),
                amount: event.amount.into(),
                meter: event.meter.into(),
            }
        }
        EventKind::Transfer => {
            let event = IEnergyToken::Transfer::decode_raw_log(topics, &data, true)
                .map_err(|e| event_error(kind, e))?;
            LogPayload::Transfer {
                from: event.from.into(),
                to: event.to.into(),
                amount: event.value.into(),
            }
        }
    };

    Ok(DecodedLog {
        block_number,
        log_index,
        tx_hash,
        payload,
    })
}

/// Build the raw log a contract would emit for `event`
pub fn encode_log(event: &DomainEvent, emitter: &Address) -> GridResult<RawLog> {
    let log: LogData = match event {
        DomainEvent::EnergyGenerated {
            participant,
            amount,
            meter,
            to_participant,
            to_fund,
            ..
        } => IMicrogridManager::EnergyGenerated {
            participant: participant.0,
            amount: amount.to_u256()?,
            meter: meter.0,
            to_participant: to_participant.to_u256()?,
            to_fund: to_fund.to_u256()?,
        }
        .encode_log_data(),
        DomainEvent::EnergyConsumed {
            participant,
            amount,
            meter,
            ..
        } => IMicrogridManager::EnergyConsumed {
            participant: participant.0,
            amount: amount.to_u256()?,
            meter: meter.0,
        }
        .encode_log_data(),
        DomainEvent::Transfer {
            from, to, amount, ..
        } => IEnergyToken::Transfer {
            from: from.0,
            to: to.0,
            value: amount.to_u256()?,
        }
        .encode_log_data(),
    };

    let word_hex = |word: &B256| format!("0x{}", hex::encode(word.as_slice()));
    let position = event.position();

    Ok(RawLog {
        address: emitter.to_hex(),
        topics: log.topics().iter().map(word_hex).collect(),
        data: format!("0x{}", hex::encode(&log.data[..])),
        block_number: Some(format!("0x{:x}", position.block_number)),
        transaction_hash: Some(word_hex(&position.tx_hash)),
        log_index: Some(format!("0x{:x}", position.log_index)),
        removed: false,
    })
}
