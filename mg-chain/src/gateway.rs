//! Ledger Gateway
//!
//! Typed read access to the two ledger contracts: the fungible token and the
//! microgrid manager. Each read is a single `eth_call`.
//!
//! Reads fail with `RemoteUnavailable` or `Decode` and are never coerced to a
//! zero value. The exceptions are the validator, meter-nonce and
//! meter-authorization queries, which are used for best-effort display and
//! return [`Lookup::Unknown`] instead of failing.

use alloy_primitives::U256;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use mg_core::logging::operations;
use mg_core::{
    Activity, Address, Amount, GridError, GridResult, Lookup, ParticipantRecord,
    ParticipantType, ValidatorSet,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::contracts::{
    decode_activity, decode_returns, decode_validators, to_u64, IEnergyToken, IMicrogridManager,
};
use crate::config::ChainConfig;
use crate::rpc::{ChainReader, JsonRpcClient};

/// Typed read facade over the token and manager contracts
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Registration and role of a participant
    async fn get_participant(&self, address: &Address) -> GridResult<ParticipantRecord> {
        Ok(ParticipantRecord {
            is_registered: self.is_registered(address).await?,
            participant_type: self.participant_type(address).await?,
        })
    }

    /// `isRegistered(address)`
    async fn is_registered(&self, address: &Address) -> GridResult<bool>;

    /// `participantType(address)`
    async fn participant_type(&self, address: &Address) -> GridResult<ParticipantType>;

    /// Token `balanceOf(address)`
    async fn get_balance(&self, address: &Address) -> GridResult<Amount>;

    /// Token `totalSupply()`
    async fn get_total_supply(&self) -> GridResult<Amount>;

    /// Token balance held by the manager contract (the community fund)
    async fn get_fund_balance(&self) -> GridResult<Amount>;

    /// Live validator set
    async fn get_validators(&self) -> Lookup<ValidatorSet>;

    /// `authorizedMeters(address)`
    async fn is_meter_authorized(&self, meter: &Address) -> Lookup<bool>;

    /// `meterNonce(address)`
    async fn get_meter_nonce(&self, meter: &Address) -> Lookup<u64>;

    /// `getActivity(uint256)`, returned as reported including the id 0 sentinel
    async fn get_activity(&self, id: u64) -> GridResult<Activity>;

    /// `nextActivityId()`
    async fn get_next_activity_id(&self) -> GridResult<u64>;

    /// `getParticipantCount()`
    async fn get_participant_count(&self) -> GridResult<u64>;

    /// Chain id reported by the node
    async fn chain_id(&self) -> GridResult<u64>;
}

/// [`LedgerGateway`] over a [`ChainReader`]
pub struct RpcLedgerGateway {
    reader: Arc<dyn ChainReader>,
    token: Address,
    manager: Address,
    expected_chain_id: u64,
}

impl RpcLedgerGateway {
    pub fn new(reader: Arc<dyn ChainReader>, config: &ChainConfig) -> Self {
        Self {
            reader,
            token: config.token_address,
            manager: config.manager_address,
            expected_chain_id: config.expected_chain_id,
        }
    }

    /// Build a gateway with its own JSON-RPC client
    pub fn connect(config: &ChainConfig) -> GridResult<Self> {
        config.validate()?;
        let client = JsonRpcClient::new(config.rpc_url.clone(), config.timeout_secs)?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn reader(&self) -> Arc<dyn ChainReader> {
        Arc::clone(&self.reader)
    }

    pub fn token_address(&self) -> &Address {
        &self.token
    }

    pub fn manager_address(&self) -> &Address {
        &self.manager
    }

    /// Fail with `NetworkMismatch` unless the node serves the expected chain
    pub async fn ensure_network(&self) -> GridResult<()> {
        let actual = self.reader.chain_id().await?;
        if actual != self.expected_chain_id {
            return Err(GridError::NetworkMismatch {
                expected: self.expected_chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// Issue `call` against `contract`, returning the raw return data
    async fn call_raw<C: SolCall + Send + Sync>(
        &self,
        contract: &Address,
        call: &C,
    ) -> GridResult<Vec<u8>> {
        debug!(
            operation = operations::LEDGER_READ,
            contract = %contract,
            function = C::SIGNATURE,
            "Ledger read"
        );
        self.reader.call(contract, &call.abi_encode()).await
    }

    async fn read<C: SolCall + Send + Sync>(
        &self,
        contract: &Address,
        call: C,
    ) -> GridResult<C::Return> {
        let data = self.call_raw(contract, &call).await?;
        decode_returns::<C>(&data)
    }
}

/// Degrade a failed best-effort read to `Unknown`, logging the cause
fn unknown_on_error<T>(function: &str, result: GridResult<T>) -> Lookup<T> {
    match result {
        Ok(v) => Lookup::Known(v),
        Err(e) => {
            warn!(
                operation = operations::LEDGER_READ,
                function,
                error = %e,
                "Ledger read failed, reporting unknown"
            );
            Lookup::Unknown
        }
    }
}

#[async_trait]
impl LedgerGateway for RpcLedgerGateway {
    async fn is_registered(&self, address: &Address) -> GridResult<bool> {
        let call = IMicrogridManager::isRegisteredCall {
            participant: address.0,
        };
        Ok(self.read(&self.manager, call).await?.registered)
    }

    async fn participant_type(&self, address: &Address) -> GridResult<ParticipantType> {
        let call = IMicrogridManager::participantTypeCall {
            participant: address.0,
        };
        ParticipantType::from_u8(self.read(&self.manager, call).await?.role)
    }

    async fn get_balance(&self, address: &Address) -> GridResult<Amount> {
        let call = IEnergyToken::balanceOfCall { account: address.0 };
        Ok(self.read(&self.token, call).await?.balance.into())
    }

    async fn get_total_supply(&self) -> GridResult<Amount> {
        let call = IEnergyToken::totalSupplyCall {};
        Ok(self.read(&self.token, call).await?.supply.into())
    }

    async fn get_fund_balance(&self) -> GridResult<Amount> {
        let manager = self.manager;
        self.get_balance(&manager).await
    }

    async fn get_validators(&self) -> Lookup<ValidatorSet> {
        let call = IMicrogridManager::getCurrentValidatorsCall {};
        let result = match self.call_raw(&self.manager, &call).await {
            Ok(data) => decode_validators(&data),
            Err(e) => Err(e),
        };
        unknown_on_error(IMicrogridManager::getCurrentValidatorsCall::SIGNATURE, result)
    }

    async fn is_meter_authorized(&self, meter: &Address) -> Lookup<bool> {
        let call = IMicrogridManager::authorizedMetersCall { meter: meter.0 };
        let result = self.read(&self.manager, call).await.map(|r| r.authorized);
        unknown_on_error(IMicrogridManager::authorizedMetersCall::SIGNATURE, result)
    }

    async fn get_meter_nonce(&self, meter: &Address) -> Lookup<u64> {
        let call = IMicrogridManager::meterNonceCall { meter: meter.0 };
        let result = match self.read(&self.manager, call).await {
            Ok(r) => to_u64(r.nonce, "meter nonce"),
            Err(e) => Err(e),
        };
        unknown_on_error(IMicrogridManager::meterNonceCall::SIGNATURE, result)
    }

    async fn get_activity(&self, id: u64) -> GridResult<Activity> {
        let call = IMicrogridManager::getActivityCall { id: U256::from(id) };
        let data = self.call_raw(&self.manager, &call).await?;
        decode_activity(&data)
    }

    async fn get_next_activity_id(&self) -> GridResult<u64> {
        let call = IMicrogridManager::nextActivityIdCall {};
        to_u64(self.read(&self.manager, call).await?.next, "next activity id")
    }

    async fn get_participant_count(&self) -> GridResult<u64> {
        let call = IMicrogridManager::getParticipantCountCall {};
        to_u64(self.read(&self.manager, call).await?.count, "participant count")
    }

    async fn chain_id(&self) -> GridResult<u64> {
        self.reader.chain_id().await
    }
}
