//! Integration tests for the read models over the RPC gateway
//!
//! Contract return data is scripted at the `eth_call` level, so these tests
//! cover selector encoding, return decoding and read-model logic together.

use alloy_primitives::U256;
use alloy_sol_types::SolValue;
use mg_chain::contracts::{encode_activity, IEnergyToken, IMicrogridManager};
use mg_chain::mock::MockChainReader;
use mg_chain::{
    ActivityLifecycleModel, ChainConfig, LedgerGateway, ParticipantRegistryView,
    RpcLedgerGateway,
};
use mg_core::{
    Activity, ActivityState, Address, Amount, GridError, Lookup, ParticipantType,
    ProtocolParams, ValidatorSet,
};
use std::sync::Arc;

const TOKEN: Address = Address::repeat_byte(0x70);
const MANAGER: Address = Address::repeat_byte(0x80);

fn addr(b: u8) -> Address {
    Address::repeat_byte(b)
}

fn activity(id: u64, state: ActivityState, approvals: u8) -> Activity {
    Activity {
        id,
        description: format!("Community task #{}", id),
        reward: Amount::from(100 + id),
        executor: if state == ActivityState::Available {
            Address::ZERO
        } else {
            addr(0x42)
        },
        state,
        validators_snapshot: ValidatorSet::new([addr(1), addr(2), addr(3)]),
        approvals,
    }
}

fn sentinel() -> Activity {
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

fn script_activity(reader: &MockChainReader, id: u64, record: &Activity) {
    reader.set_call_result(
        &MANAGER,
        &IMicrogridManager::getActivityCall { id: U256::from(id) },
        encode_activity(record).unwrap(),
    );
}

fn script_next_id(reader: &MockChainReader, next: u64) {
    reader.set_call_result(
        &MANAGER,
        &IMicrogridManager::nextActivityIdCall {},
        U256::from(next).abi_encode(),
    );
}

fn setup() -> (Arc<MockChainReader>, Arc<RpcLedgerGateway>) {
    let reader = Arc::new(MockChainReader::new());
    let gateway = Arc::new(RpcLedgerGateway::new(
        reader.clone(),
        &ChainConfig::development(TOKEN, MANAGER),
    ));
    (reader, gateway)
}

#[tokio::test]
async fn test_activity_zero_is_none_regardless_of_ledger() {
    let (reader, gateway) = setup();
    script_activity(&reader, 0, &activity(3, ActivityState::Claimed, 0));

    let model = ActivityLifecycleModel::new(gateway, ProtocolParams::default()).unwrap();
    assert_eq!(model.get_activity(0).await.unwrap(), None);
    assert_eq!(reader.eth_calls(), 0);
}

#[tokio::test]
async fn test_list_recent_with_gap() {
    let (reader, gateway) = setup();
    script_next_id(&reader, 12);
    for id in 1..12 {
        if id == 6 {
            script_activity(&reader, id, &sentinel());
        } else {
            script_activity(&reader, id, &activity(id, ActivityState::Available, 0));
        }
    }

    let model = ActivityLifecycleModel::new(gateway, ProtocolParams::default()).unwrap();
    let listed = model.list_recent(20).await.unwrap();
    let ids: Vec<u64> = listed.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![11, 10, 9, 8, 7, 5, 4, 3, 2, 1]);
    assert!(listed.iter().all(|a| a.id != 0));
    // nextActivityId plus one read per id in [1, 12)
    assert_eq!(reader.eth_calls(), 12);
}

#[tokio::test]
async fn test_list_recent_returns_at_most_count() {
    let (reader, gateway) = setup();
    script_next_id(&reader, 12);
    for id in 1..12 {
        script_activity(&reader, id, &activity(id, ActivityState::Available, 0));
    }

    let model = ActivityLifecycleModel::new(gateway, ProtocolParams::default()).unwrap();
    let listed = model.list_recent(3).await.unwrap();
    let ids: Vec<u64> = listed.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![11, 10, 9]);
}

#[tokio::test]
async fn test_list_recent_propagates_next_id_failure() {
    let (_reader, gateway) = setup();
    let model = ActivityLifecycleModel::new(gateway, ProtocolParams::default()).unwrap();
    assert!(matches!(
        model.list_recent(5).await,
        Err(GridError::RemoteUnavailable(_))
    ));
}

#[tokio::test]
async fn test_activity_quorum_from_ledger_state() {
    let (reader, gateway) = setup();
    script_activity(&reader, 9, &activity(9, ActivityState::InValidation, 2));

    let model = ActivityLifecycleModel::new(gateway, ProtocolParams::default()).unwrap();
    let fetched = model.get_activity(9).await.unwrap().unwrap();
    assert_eq!(fetched.state, ActivityState::InValidation);
    assert!(model.quorum_status(&fetched).reached);
    assert!(fetched.is_payable(2));
    assert!(model.is_validator_for(&fetched, &addr(3)));
}

#[tokio::test]
async fn test_profile_over_rpc() {
    let (reader, gateway) = setup();
    let who = addr(0x55);
    reader.set_call_result(
        &MANAGER,
        &IMicrogridManager::isRegisteredCall { participant: who.0 },
        true.abi_encode(),
    );
    reader.set_call_result(
        &MANAGER,
        &IMicrogridManager::participantTypeCall { participant: who.0 },
        <alloy_sol_types::sol_data::Uint<8> as alloy_sol_types::SolType>::abi_encode(&0u8),
    );
    reader.set_call_result(
        &TOKEN,
        &IEnergyToken::balanceOfCall { account: who.0 },
        U256::from(1234u64).abi_encode(),
    );

    let view = ParticipantRegistryView::new(gateway);
    let profile = view.get_profile(&who).await.unwrap();
    assert!(profile.is_registered);
    assert_eq!(profile.participant_type, ParticipantType::Consumer);
    assert_eq!(profile.balance, Amount::from(1234u64));
}

#[tokio::test]
async fn test_unknown_participant_type_is_decode_error() {
    let (reader, gateway) = setup();
    let who = addr(0x56);
    reader.set_call_result(
        &MANAGER,
        &IMicrogridManager::participantTypeCall { participant: who.0 },
        <alloy_sol_types::sol_data::Uint<8> as alloy_sol_types::SolType>::abi_encode(&7u8),
    );

    assert!(matches!(
        gateway.participant_type(&who).await,
        Err(GridError::Decode(_))
    ));
}

#[tokio::test]
async fn test_overview_over_rpc() {
    let (reader, gateway) = setup();
    let meter = addr(0x99);
    reader.set_call_result(
        &TOKEN,
        &IEnergyToken::totalSupplyCall {},
        U256::from(10_000u64).abi_encode(),
    );
    reader.set_call_result(
        &TOKEN,
        &IEnergyToken::balanceOfCall { account: MANAGER.0 },
        U256::from(120u64).abi_encode(),
    );
    reader.set_call_result(
        &MANAGER,
        &IMicrogridManager::getParticipantCountCall {},
        U256::from(4u64).abi_encode(),
    );
    let validators = [addr(1).0, addr(2).0, addr(3).0];
    reader.set_call_result(
        &MANAGER,
        &IMicrogridManager::getCurrentValidatorsCall {},
        validators.abi_encode(),
    );
    reader.set_call_result(
        &MANAGER,
        &IMicrogridManager::authorizedMetersCall { meter: meter.0 },
        true.abi_encode(),
    );
    // meterNonce left unanswered

    let view = ParticipantRegistryView::new(gateway);
    let overview = view.network_overview(Some(&meter)).await.unwrap();
    assert_eq!(overview.total_supply, Amount::from(10_000u64));
    assert_eq!(overview.fund_balance, Amount::from(120u64));
    assert_eq!(overview.participant_count, 4);
    assert_eq!(
        overview.validators,
        Lookup::Known(ValidatorSet::new([addr(1), addr(2), addr(3)]))
    );
    let status = overview.meter.unwrap();
    assert_eq!(status.authorized, Lookup::Known(true));
    assert_eq!(status.nonce, Lookup::Unknown);
}
