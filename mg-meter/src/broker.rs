//! Signed Metering Operation Broker
//!
//! Turns a metering request into a submittable, nonce-bound authorization:
//!
//! 1. the meter must currently be authorized on the ledger
//! 2. the signing service issues a signature bound to a fresh nonce
//! 3. the signature is packaged as a call to the matching manager entry point
//!
//! The broker keeps no nonce state. Every `authorize` asks the signing service
//! again, and the nonce it returns is carried through untouched. Nothing here
//! mutates the ledger; submission belongs to the caller.

use mg_chain::{CallBuilder, ChainConfig, ContractCall, LedgerGateway};
use mg_core::logging::operations;
use mg_core::{
    Address, Amount, AuthorizationValidity, GridError, GridResult, Lookup, OperationType,
    SignedOperationAuthorization,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::SigningService;
use crate::config::SignerConfig;

/// An authorization together with the call that submits it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedOperation {
    pub authorization: SignedOperationAuthorization,
    pub call: ContractCall,
}

/// Broker between metering requests, the ledger and the signing service
pub struct SignedMeterOperationBroker {
    gateway: Arc<dyn LedgerGateway>,
    signer: Arc<dyn SigningService>,
    meter: Address,
    calls: CallBuilder,
}

impl SignedMeterOperationBroker {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        signer: Arc<dyn SigningService>,
        meter: Address,
        calls: CallBuilder,
    ) -> Self {
        Self {
            gateway,
            signer,
            meter,
            calls,
        }
    }

    /// Build a broker for the meter the signing service reports
    pub async fn discover(
        gateway: Arc<dyn LedgerGateway>,
        signer: Arc<dyn SigningService>,
        calls: CallBuilder,
    ) -> GridResult<Self> {
        let meter = signer.meter_address().await?;
        info!(meter = %meter, "Discovered meter from signing service");
        Ok(Self::new(gateway, signer, meter, calls))
    }

    /// Build a broker from configuration, discovering the meter if unset
    pub async fn from_config(
        gateway: Arc<dyn LedgerGateway>,
        signer: Arc<dyn SigningService>,
        chain: &ChainConfig,
        signer_config: &SignerConfig,
    ) -> GridResult<Self> {
        let calls = CallBuilder::from_config(chain);
        match signer_config.meter_address {
            Some(meter) => Ok(Self::new(gateway, signer, meter, calls)),
            None => Self::discover(gateway, signer, calls).await,
        }
    }

    pub fn meter(&self) -> &Address {
        &self.meter
    }

    /// Issue a fresh authorization for one metering operation
    ///
    /// Fails with `MeterNotAuthorized` without contacting the signer when the
    /// ledger says the meter is not authorized, and with `RemoteUnavailable`
    /// when the ledger cannot answer. Any signer failure, including an echo
    /// that does not match the request, is a `SignatureService` error.
    pub async fn authorize(
        &self,
        participant: &Address,
        amount: &Amount,
        operation_type: OperationType,
    ) -> GridResult<AuthorizedOperation> {
        if participant.is_zero() {
            return Err(GridError::InvalidInput(
                "participant must not be the zero address".to_string(),
            ));
        }
        if amount.is_zero() {
            return Err(GridError::InvalidInput("amount must be positive".to_string()));
        }
        amount.to_u256()?;

        match self.gateway.is_meter_authorized(&self.meter).await {
            Lookup::Known(true) => {}
            Lookup::Known(false) => {
                warn!(
                    operation = operations::AUTHORIZE,
                    meter = %self.meter,
                    "Meter is not authorized on the ledger"
                );
                return Err(GridError::MeterNotAuthorized(self.meter.to_hex()));
            }
            Lookup::Unknown => {
                return Err(GridError::RemoteUnavailable(format!(
                    "authorization status of meter {} could not be read",
                    self.meter
                )));
            }
        }

        let authorization = self
            .signer
            .sign(participant, amount, operation_type)
            .await?;
        self.check_echo(participant, amount, operation_type, &authorization)?;

        let call = self.calls.signed_metering(&authorization)?;
        info!(
            operation = operations::AUTHORIZE,
            participant = %participant,
            amount = %amount,
            operation_type = %operation_type,
            meter = %authorization.meter_address,
            nonce = authorization.nonce,
            "Metering operation authorized"
        );

        Ok(AuthorizedOperation {
            authorization,
            call,
        })
    }

    fn check_echo(
        &self,
        participant: &Address,
        amount: &Amount,
        operation_type: OperationType,
        authorization: &SignedOperationAuthorization,
    ) -> GridResult<()> {
        let mismatch = if authorization.participant != *participant {
            Some(format!("participant {}", authorization.participant))
        } else if authorization.amount != *amount {
            Some(format!("amount {}", authorization.amount))
        } else if authorization.operation_type != operation_type {
            Some(format!("operation {}", authorization.operation_type))
        } else if authorization.meter_address != self.meter {
            Some(format!("meter {}", authorization.meter_address))
        } else {
            None
        };

        match mismatch {
            Some(field) => {
                warn!(
                    operation = operations::AUTHORIZE,
                    nonce = authorization.nonce,
                    "Signer echoed unexpected {}",
                    field
                );
                Err(GridError::SignatureService(format!(
                    "signed payload does not match request: {}",
                    field
                )))
            }
            None => Ok(()),
        }
    }

    /// Whether an authorization can still be submitted
    pub async fn check_validity(
        &self,
        authorization: &SignedOperationAuthorization,
    ) -> AuthorizationValidity {
        let current = self
            .gateway
            .get_meter_nonce(&authorization.meter_address)
            .await;
        let validity = authorization.check_against(current);
        debug!(
            meter = %authorization.meter_address,
            nonce = authorization.nonce,
            ?validity,
            "Checked authorization validity"
        );
        validity
    }

    /// Signing service health
    pub async fn health(&self) -> bool {
        self.signer.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockSigningService;
    use mg_chain::mock::MockLedger;

    const METER: Address = Address::repeat_byte(0x99);

    fn broker(
        ledger: Arc<MockLedger>,
        signer: Arc<MockSigningService>,
    ) -> SignedMeterOperationBroker {
        SignedMeterOperationBroker::new(
            ledger,
            signer,
            METER,
            CallBuilder::new(Address::repeat_byte(0x70), Address::repeat_byte(0x80)),
        )
    }

    #[tokio::test]
    async fn test_rejects_invalid_inputs_before_remote_calls() {
        let ledger = Arc::new(MockLedger::new());
        let signer = Arc::new(MockSigningService::new(METER));
        let broker = broker(ledger.clone(), signer.clone());

        let zero_participant = broker
            .authorize(&Address::ZERO, &Amount::from(1u64), OperationType::Generate)
            .await;
        assert!(matches!(zero_participant, Err(GridError::InvalidInput(_))));

        let zero_amount = broker
            .authorize(&Address::repeat_byte(1), &Amount::zero(), OperationType::Generate)
            .await;
        assert!(matches!(zero_amount, Err(GridError::InvalidInput(_))));

        let beyond_word = Amount::parse_decimal(&format!("1{}", "0".repeat(80))).unwrap();
        let oversized = broker
            .authorize(&Address::repeat_byte(1), &beyond_word, OperationType::Consume)
            .await;
        assert!(matches!(oversized, Err(GridError::InvalidInput(_))));

        assert_eq!(ledger.meter_checks(), 0);
        assert_eq!(signer.sign_calls(), 0);
    }

    #[tokio::test]
    async fn test_tampered_echo_is_signature_error() {
        let ledger = Arc::new(MockLedger::new());
        ledger.authorize_meter(METER, true);
        let signer = Arc::new(MockSigningService::new(METER));
        signer.set_tamper_echo(true);

        let result = broker(ledger, signer)
            .authorize(&Address::repeat_byte(1), &Amount::from(10u64), OperationType::Consume)
            .await;
        assert!(matches!(result, Err(GridError::SignatureService(_))));
    }

    #[tokio::test]
    async fn test_foreign_meter_in_echo_is_signature_error() {
        let ledger = Arc::new(MockLedger::new());
        ledger.authorize_meter(METER, true);
        let signer = Arc::new(MockSigningService::new(Address::repeat_byte(0x98)));

        let result = broker(ledger, signer)
            .authorize(&Address::repeat_byte(1), &Amount::from(10u64), OperationType::Generate)
            .await;
        assert!(matches!(result, Err(GridError::SignatureService(_))));
    }

    #[tokio::test]
    async fn test_discover_uses_signer_meter() {
        let ledger = Arc::new(MockLedger::new());
        let signer = Arc::new(MockSigningService::new(METER));
        let broker = SignedMeterOperationBroker::discover(
            ledger,
            signer,
            CallBuilder::new(Address::repeat_byte(0x70), Address::repeat_byte(0x80)),
        )
        .await
        .unwrap();
        assert_eq!(broker.meter(), &METER);
        assert!(broker.health().await);
    }
}
