//! Participant registry view
//!
//! Composes gateway reads into participant profiles and a network overview.
//!
//! Known limitation: the sub-reads of a profile are separate calls and may be
//! answered from different blocks. A profile is a best-effort snapshot, not
//! an atomic one.

use mg_core::logging::operations;
use mg_core::{Address, Amount, GridResult, Lookup, ParticipantInfo, ValidatorSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::gateway::LedgerGateway;

/// Ledger-wide figures for dashboards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOverview {
    pub total_supply: Amount,
    /// Token balance held by the manager contract
    pub fund_balance: Amount,
    pub participant_count: u64,
    pub validators: Lookup<ValidatorSet>,
    /// Present when a meter was given
    pub meter: Option<MeterStatus>,
}

/// Ledger view of one smart meter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterStatus {
    pub address: Address,
    pub authorized: Lookup<bool>,
    pub nonce: Lookup<u64>,
}

/// Profile composition over a [`LedgerGateway`]
pub struct ParticipantRegistryView {
    gateway: Arc<dyn LedgerGateway>,
}

impl ParticipantRegistryView {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self { gateway }
    }

    /// Registration, role and balance of `address`
    ///
    /// Recomputed on every call; any failing sub-read fails the profile.
    pub async fn get_profile(&self, address: &Address) -> GridResult<ParticipantInfo> {
        let (is_registered, participant_type, balance) = tokio::try_join!(
            self.gateway.is_registered(address),
            self.gateway.participant_type(address),
            self.gateway.get_balance(address),
        )?;

        debug!(
            operation = operations::PROFILE,
            address = %address,
            is_registered,
            participant_type = %participant_type,
            "Composed participant profile"
        );

        Ok(ParticipantInfo {
            address: *address,
            is_registered,
            participant_type,
            balance,
        })
    }

    /// Supply, fund, validators and optionally one meter's status
    pub async fn network_overview(&self, meter: Option<&Address>) -> GridResult<NetworkOverview> {
        let (total_supply, fund_balance, participant_count) = tokio::try_join!(
            self.gateway.get_total_supply(),
            self.gateway.get_fund_balance(),
            self.gateway.get_participant_count(),
        )?;
        let validators = self.gateway.get_validators().await;

        let meter = match meter {
            Some(address) => {
                let (authorized, nonce) = tokio::join!(
                    self.gateway.is_meter_authorized(address),
                    self.gateway.get_meter_nonce(address),
                );
                Some(MeterStatus {
                    address: *address,
                    authorized,
                    nonce,
                })
            }
            None => None,
        };

        Ok(NetworkOverview {
            total_supply,
            fund_balance,
            participant_count,
            validators,
            meter,
        })
    }
}
