//! Produced contract calls
//!
//! Structured call descriptions handed to the transaction-submission
//! collaborator. Nothing here signs or sends. Each call carries its
//! arguments in domain form (decimal amounts, lower-case addresses) and the
//! ABI-encoded calldata for submitters that want raw transaction data.

use alloy_primitives::{Bytes, U256};
use alloy_sol_types::SolCall;
use mg_core::{
    Address, Amount, GridError, GridResult, OperationType, ParticipantType,
    SignedOperationAuthorization,
};
use serde::{Deserialize, Serialize};

use crate::config::ChainConfig;
use crate::contracts::{IEnergyToken, IMicrogridManager};

/// One call argument in its serialized domain form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallArgument {
    Address(Address),
    Uint(Amount),
    Bool(bool),
    Bytes(Bytes),
    String(String),
}

/// One contract call, ready for submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCall {
    pub target_contract: Address,
    /// Canonical function signature, e.g. `transfer(address,uint256)`
    pub function: String,
    /// `0x`-hex 4-byte selector
    pub function_selector: String,
    pub arguments: Vec<CallArgument>,
    /// Selector followed by the encoded arguments
    pub calldata: Bytes,
}

impl ContractCall {
    pub fn new<C: SolCall>(
        target_contract: Address,
        call: &C,
        arguments: Vec<CallArgument>,
    ) -> Self {
        Self {
            target_contract,
            function: C::SIGNATURE.to_string(),
            function_selector: format!("0x{}", hex::encode(C::SELECTOR)),
            arguments,
            calldata: Bytes::from(call.abi_encode()),
        }
    }

    /// Function name without the parameter list
    pub fn function_name(&self) -> &str {
        self.function
            .split_once('(')
            .map_or(self.function.as_str(), |(name, _)| name)
    }

    pub fn calldata(&self) -> &[u8] {
        &self.calldata[..]
    }

    pub fn calldata_hex(&self) -> String {
        format!("0x{}", hex::encode(self.calldata()))
    }
}

/// Builds calls against a fixed token / manager deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallBuilder {
    token: Address,
    manager: Address,
}

impl CallBuilder {
    pub fn new(token: Address, manager: Address) -> Self {
        Self { token, manager }
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(config.token_address, config.manager_address)
    }

    fn manager_call<C: SolCall>(&self, call: &C, arguments: Vec<CallArgument>) -> ContractCall {
        ContractCall::new(self.manager, call, arguments)
    }

    /// Submission of a signed metering authorization
    ///
    /// `GENERATE` maps to `generateEnergy`, `CONSUME` to `consumeEnergySigned`.
    pub fn signed_metering(
        &self,
        authorization: &SignedOperationAuthorization,
    ) -> GridResult<ContractCall> {
        let participant = authorization.participant.0;
        let amount = authorization.amount.to_u256()?;
        let nonce = U256::from(authorization.nonce);
        let signature = Bytes::from(authorization.signature.as_bytes().to_vec());
        let meter = authorization.meter_address.0;

        let arguments = vec![
            CallArgument::Address(authorization.participant),
            CallArgument::Uint(authorization.amount.clone()),
            CallArgument::Uint(Amount::from(authorization.nonce)),
            CallArgument::Bytes(signature.clone()),
            CallArgument::Address(authorization.meter_address),
        ];

        let call = match authorization.operation_type {
            OperationType::Generate => self.manager_call(
                &IMicrogridManager::generateEnergyCall {
                    participant,
                    amount,
                    nonce,
                    signature,
                    meter,
                },
                arguments,
            ),
            OperationType::Consume => self.manager_call(
                &IMicrogridManager::consumeEnergySignedCall {
                    participant,
                    amount,
                    nonce,
                    signature,
                    meter,
                },
                arguments,
            ),
        };
        Ok(call)
    }

    /// Token transfer from the submitting account
    pub fn transfer(&self, to: &Address, amount: &Amount) -> GridResult<ContractCall> {
        if to.is_zero() {
            return Err(GridError::InvalidInput("transfer to the zero address".to_string()));
        }
        let call = IEnergyToken::transferCall {
            to: to.0,
            amount: amount.to_u256()?,
        };
        Ok(ContractCall::new(
            self.token,
            &call,
            vec![CallArgument::Address(*to), CallArgument::Uint(amount.clone())],
        ))
    }

    pub fn claim_activity(&self, id: u64) -> GridResult<ContractCall> {
        let call = IMicrogridManager::claimActivityCall { id: activity_id(id)? };
        Ok(self.activity_call(&call, id))
    }

    pub fn submit_activity(&self, id: u64) -> GridResult<ContractCall> {
        let call = IMicrogridManager::submitActivityCall { id: activity_id(id)? };
        Ok(self.activity_call(&call, id))
    }

    pub fn approve_activity(&self, id: u64) -> GridResult<ContractCall> {
        let call = IMicrogridManager::approveActivityCall { id: activity_id(id)? };
        Ok(self.activity_call(&call, id))
    }

    pub fn process_payment(&self, id: u64) -> GridResult<ContractCall> {
        let call = IMicrogridManager::processPaymentCall { id: activity_id(id)? };
        Ok(self.activity_call(&call, id))
    }

    pub fn cancel_activity(&self, id: u64) -> GridResult<ContractCall> {
        let call = IMicrogridManager::cancelActivityCall { id: activity_id(id)? };
        Ok(self.activity_call(&call, id))
    }

    fn activity_call<C: SolCall>(&self, call: &C, id: u64) -> ContractCall {
        self.manager_call(call, vec![CallArgument::Uint(Amount::from(id))])
    }

    pub fn create_activity(&self, description: &str, reward: &Amount) -> GridResult<ContractCall> {
        if description.trim().is_empty() {
            return Err(GridError::InvalidInput("activity description is empty".to_string()));
        }
        let call = IMicrogridManager::createActivityCall {
            description: description.to_string(),
            reward: reward.to_u256()?,
        };
        Ok(self.manager_call(
            &call,
            vec![
                CallArgument::String(description.to_string()),
                CallArgument::Uint(reward.clone()),
            ],
        ))
    }

    pub fn register_participant(
        &self,
        participant: &Address,
        participant_type: ParticipantType,
    ) -> ContractCall {
        let call = IMicrogridManager::registerParticipantCall {
            participant: participant.0,
            role: participant_type.as_u8(),
        };
        self.manager_call(
            &call,
            vec![
                CallArgument::Address(*participant),
                CallArgument::Uint(Amount::from(u64::from(participant_type.as_u8()))),
            ],
        )
    }

    pub fn authorize_meter(&self, meter: &Address, authorized: bool) -> ContractCall {
        let call = IMicrogridManager::authorizeMeterCall {
            meter: meter.0,
            authorized,
        };
        self.manager_call(
            &call,
            vec![CallArgument::Address(*meter), CallArgument::Bool(authorized)],
        )
    }

    pub fn update_validators(&self) -> ContractCall {
        self.manager_call(&IMicrogridManager::updateValidatorsCall {}, Vec::new())
    }
}

/// Activity ids start at 1; 0 is the ledger's "does not exist" sentinel
fn activity_id(id: u64) -> GridResult<U256> {
    if id == 0 {
        return Err(GridError::InvalidInput("activity id 0 does not exist".to_string()));
    }
    Ok(U256::from(id))
}
