//! Signing Service Client
//!
//! Client for the remote signing collaborator that owns meter nonces and
//! issues nonce-bound signatures for metering operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mg_core::logging::operations;
use mg_core::{
    keccak256, Address, Amount, GridError, GridResult, OperationType, Signature,
    SignedOperationAuthorization,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{SignatureRoute, SignerConfig};

/// Remote signing collaborator
///
/// Implementations:
/// - HTTP client (remote signing service)
/// - Mock client (testing)
///
/// Every successful `sign` consumes one nonce on the service side; the
/// returned nonce and meter address are authoritative.
#[async_trait]
pub trait SigningService: Send + Sync {
    /// Obtain a fresh signature for one metering operation
    async fn sign(
        &self,
        participant: &Address,
        amount: &Amount,
        operation_type: OperationType,
    ) -> GridResult<SignedOperationAuthorization>;

    /// Meter the service signs for
    async fn meter_address(&self) -> GridResult<Address>;

    /// Whether the service answers its health endpoint
    async fn health(&self) -> bool;
}

// ============================================================================
// Wire Types
// ============================================================================

/// Signature request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub participant: Address,
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<u8>,
}

/// Signing service response envelope
///
/// The service is not strict about property casing, so both camelCase and
/// PascalCase names are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureResponse {
    #[serde(alias = "Success")]
    pub success: bool,
    #[serde(default, alias = "Operation")]
    pub operation: String,
    #[serde(default, alias = "Data")]
    pub data: Option<SignatureData>,
    #[serde(default, alias = "Timestamp")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureData {
    #[serde(alias = "Participant")]
    pub participant: String,
    #[serde(alias = "Amount")]
    pub amount: WireAmount,
    #[serde(alias = "Nonce")]
    pub nonce: u64,
    #[serde(alias = "OperationType", alias = "operation_type")]
    pub operation_type: u8,
    #[serde(alias = "Signature")]
    pub signature: String,
    #[serde(alias = "MeterAddress", alias = "meter_address")]
    pub meter_address: String,
}

/// Amount as sent by the service: a decimal string, occasionally a number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireAmount {
    Text(String),
    Number(u64),
}

impl WireAmount {
    fn to_amount(&self) -> GridResult<Amount> {
        match self {
            WireAmount::Text(s) => Amount::parse_decimal(s),
            WireAmount::Number(n) => Ok(Amount::from(*n)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MeterAddressResponse {
    #[serde(alias = "Address")]
    address: String,
}

impl SignatureResponse {
    /// Convert into an authorization, keeping nonce and meter exactly as sent
    pub fn into_authorization(self) -> GridResult<SignedOperationAuthorization> {
        if !self.success {
            return Err(GridError::SignatureService(format!(
                "signer reported failure for '{}'",
                self.operation
            )));
        }
        let data = self
            .data
            .ok_or_else(|| GridError::SignatureService("response has no data".to_string()))?;

        let issued_at = self
            .timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map_or_else(Utc::now, |ts| ts.with_timezone(&Utc));

        Ok(SignedOperationAuthorization {
            participant: malformed("participant", Address::parse(&data.participant))?,
            amount: malformed("amount", data.amount.to_amount())?,
            nonce: data.nonce,
            operation_type: malformed(
                "operationType",
                OperationType::from_u8(data.operation_type),
            )?,
            signature: malformed("signature", Signature::parse(&data.signature))?,
            meter_address: malformed("meterAddress", Address::parse(&data.meter_address))?,
            issued_at,
        })
    }
}

fn malformed<T>(field: &str, result: GridResult<T>) -> GridResult<T> {
    result.map_err(|e| GridError::SignatureService(format!("malformed {}: {}", field, e)))
}

// ============================================================================
// HTTP Client Implementation
// ============================================================================

/// HTTP-based signing service client
pub struct HttpSigningService {
    base_url: String,
    client: Client,
    route: SignatureRoute,
}

impl HttpSigningService {
    pub fn new(config: &SignerConfig) -> GridResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GridError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            route: config.route,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn signature_request(
        &self,
        participant: &Address,
        amount: &Amount,
        operation_type: OperationType,
    ) -> (String, SignatureRequest) {
        let (path, explicit_type) = match (self.route, operation_type) {
            (SignatureRoute::PerOperation, OperationType::Generate) => {
                ("/api/signature/generate", None)
            }
            (SignatureRoute::PerOperation, OperationType::Consume) => {
                ("/api/signature/consume", None)
            }
            (SignatureRoute::Custom, op) => ("/api/signature/custom", Some(op.as_u8())),
        };

        let request = SignatureRequest {
            participant: *participant,
            amount: amount.clone(),
            operation_type: explicit_type,
        };
        (format!("{}{}", self.base_url, path), request)
    }
}

#[async_trait]
impl SigningService for HttpSigningService {
    async fn sign(
        &self,
        participant: &Address,
        amount: &Amount,
        operation_type: OperationType,
    ) -> GridResult<SignedOperationAuthorization> {
        let (url, request) = self.signature_request(participant, amount, operation_type);
        debug!(
            operation = operations::SIGN,
            url = %url,
            participant = %participant,
            amount = %amount,
            "Requesting signature"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "Signing service unreachable");
                GridError::SignatureService(format!("HTTP request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(url = %url, status = %status, "Signing service rejected request");
            return Err(GridError::SignatureService(format!(
                "signer returned status {}: {}",
                status, body
            )));
        }

        let body: SignatureResponse = response.json().await.map_err(|e| {
            GridError::SignatureService(format!("Failed to parse signature response: {}", e))
        })?;
        let authorization = body.into_authorization()?;

        info!(
            operation = operations::SIGN,
            participant = %authorization.participant,
            amount = %authorization.amount,
            nonce = authorization.nonce,
            "Signature obtained"
        );
        Ok(authorization)
    }

    async fn meter_address(&self) -> GridResult<Address> {
        let url = format!("{}/api/meter/address", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GridError::SignatureService(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GridError::SignatureService(format!(
                "meter address request failed: status {}",
                response.status()
            )));
        }

        let body: MeterAddressResponse = response
            .json()
            .await
            .map_err(|e| GridError::SignatureService(format!("Failed to parse: {}", e)))?;

        if body.address.trim().is_empty() {
            return Err(GridError::SignatureService(
                "signer did not report a meter address".to_string(),
            ));
        }
        malformed("address", Address::parse(&body.address))
    }

    async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);

        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(
                    operation = operations::HEALTH_CHECK,
                    status = %resp.status(),
                    "Signing service unhealthy"
                );
                false
            }
            Err(e) => {
                warn!(
                    operation = operations::HEALTH_CHECK,
                    error = %e,
                    "Signing service health check failed"
                );
                false
            }
        }
    }
}

// ============================================================================
// Mock Client for Testing
// ============================================================================

/// Mock signing service for testing
///
/// Hands out sequential nonces; a nonce is only consumed by a successful
/// signature.
pub struct MockSigningService {
    meter: Address,
    next_nonce: AtomicU64,
    sign_calls: AtomicUsize,
    fail_mode: AtomicBool,
    tamper_echo: AtomicBool,
}

impl MockSigningService {
    pub fn new(meter: Address) -> Self {
        Self::starting_at(meter, 0)
    }

    pub fn starting_at(meter: Address, nonce: u64) -> Self {
        Self {
            meter,
            next_nonce: AtomicU64::new(nonce),
            sign_calls: AtomicUsize::new(0),
            fail_mode: AtomicBool::new(false),
            tamper_echo: AtomicBool::new(false),
        }
    }

    /// Enable failure mode for testing
    pub fn set_fail_mode(&self, fail: bool) {
        self.fail_mode.store(fail, Ordering::SeqCst);
    }

    /// Echo a different amount than requested
    pub fn set_tamper_echo(&self, tamper: bool) {
        self.tamper_echo.store(tamper, Ordering::SeqCst);
    }

    /// Number of `sign` calls received, failed ones included
    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    /// Next nonce the service would issue
    pub fn next_nonce(&self) -> u64 {
        self.next_nonce.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SigningService for MockSigningService {
    async fn sign(
        &self,
        participant: &Address,
        amount: &Amount,
        operation_type: OperationType,
    ) -> GridResult<SignedOperationAuthorization> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mode.load(Ordering::SeqCst) {
            return Err(GridError::SignatureService("Mock failure mode".to_string()));
        }

        let amount = if self.tamper_echo.load(Ordering::SeqCst) {
            amount + &Amount::from(1u64)
        } else {
            amount.clone()
        };
        let amount_word = amount.to_u256()?;
        let nonce = self.next_nonce.fetch_add(1, Ordering::SeqCst);

        let mut payload = Vec::with_capacity(20 + 32 + 8 + 1 + 20);
        payload.extend_from_slice(participant.as_slice());
        payload.extend_from_slice(&amount_word.to_be_bytes::<32>());
        payload.extend_from_slice(&nonce.to_be_bytes());
        payload.push(operation_type.as_u8());
        payload.extend_from_slice(self.meter.as_slice());
        let digest = keccak256(&payload);

        let mut signature = Vec::with_capacity(65);
        signature.extend_from_slice(digest.as_slice());
        signature.extend_from_slice(keccak256(digest.as_slice()).as_slice());
        signature.push(27);

        Ok(SignedOperationAuthorization {
            participant: *participant,
            amount,
            nonce,
            operation_type,
            signature: Signature::new(signature),
            meter_address: self.meter,
            issued_at: Utc::now(),
        })
    }

    async fn meter_address(&self) -> GridResult<Address> {
        if self.fail_mode.load(Ordering::SeqCst) {
            return Err(GridError::SignatureService("Mock failure mode".to_string()));
        }
        Ok(self.meter)
    }

    async fn health(&self) -> bool {
        !self.fail_mode.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meter() -> Address {
        Address::repeat_byte(0x99)
    }

    #[test]
    fn test_response_camel_case() {
        let body = json!({
            "success": true,
            "operation": "generate",
            "data": {
                "participant": "0x1111111111111111111111111111111111111111",
                "amount": "1000",
                "nonce": 7,
                "operationType": 0,
                "signature": "0xdeadbeef",
                "meterAddress": "0xDbC1f6ee28C545ebd291D1D2d49646Bc834549eF"
            },
            "contractCall": { "function": "generateEnergy", "parameters": [] },
            "timestamp": "2024-05-01T10:00:00Z"
        });
        let response: SignatureResponse = serde_json::from_value(body).unwrap();
        let auth = response.into_authorization().unwrap();
        assert_eq!(auth.nonce, 7);
        assert_eq!(auth.amount, Amount::from(1000u64));
        assert_eq!(auth.operation_type, OperationType::Generate);
        assert_eq!(auth.signature.as_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(
            auth.meter_address.to_hex(),
            "0xdbc1f6ee28c545ebd291d1d2d49646bc834549ef"
        );
        assert_eq!(auth.issued_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_response_pascal_case_numeric_amount() {
        let body = json!({
            "Success": true,
            "Operation": "consume",
            "Data": {
                "Participant": "0x1111111111111111111111111111111111111111",
                "Amount": 25,
                "Nonce": 3,
                "OperationType": 1,
                "Signature": "0x01",
                "MeterAddress": "0x9999999999999999999999999999999999999999"
            }
        });
        let response: SignatureResponse = serde_json::from_value(body).unwrap();
        let auth = response.into_authorization().unwrap();
        assert_eq!(auth.amount, Amount::from(25u64));
        assert_eq!(auth.operation_type, OperationType::Consume);
        assert_eq!(auth.meter_address, meter());
    }

    #[test]
    fn test_unsuccessful_response_rejected() {
        let response: SignatureResponse =
            serde_json::from_value(json!({ "success": false, "operation": "generate" })).unwrap();
        assert!(matches!(
            response.into_authorization(),
            Err(GridError::SignatureService(_))
        ));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let body = json!({
            "success": true,
            "data": {
                "participant": "0x1111111111111111111111111111111111111111",
                "amount": "5",
                "nonce": 1,
                "operationType": 0,
                "signature": "",
                "meterAddress": "0x9999999999999999999999999999999999999999"
            }
        });
        let response: SignatureResponse = serde_json::from_value(body).unwrap();
        assert!(matches!(
            response.into_authorization(),
            Err(GridError::SignatureService(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let service =
            HttpSigningService::new(&SignerConfig::development("http://signer/")).unwrap();
        let (url, request) = service.signature_request(
            &Address::repeat_byte(0xAB),
            &Amount::from(12u64),
            OperationType::Consume,
        );
        assert_eq!(url, "http://signer/api/signature/consume");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "participant": "0xabababababababababababababababababababab",
                "amount": "12"
            })
        );

        let mut config = SignerConfig::development("http://signer");
        config.route = SignatureRoute::Custom;
        let custom = HttpSigningService::new(&config).unwrap();
        let (url, request) = custom.signature_request(
            &Address::repeat_byte(0xAB),
            &Amount::from(12u64),
            OperationType::Consume,
        );
        assert_eq!(url, "http://signer/api/signature/custom");
        assert_eq!(serde_json::to_value(&request).unwrap()["operationType"], 1);
    }

    #[tokio::test]
    async fn test_mock_nonces_advance_only_on_success() {
        let mock = MockSigningService::starting_at(meter(), 10);
        let first = mock
            .sign(&Address::repeat_byte(1), &Amount::from(5u64), OperationType::Generate)
            .await
            .unwrap();
        assert_eq!(first.nonce, 10);
        assert_eq!(first.signature.as_bytes().len(), 65);

        mock.set_fail_mode(true);
        assert!(mock
            .sign(&Address::repeat_byte(1), &Amount::from(5u64), OperationType::Generate)
            .await
            .is_err());
        assert!(!mock.health().await);
        mock.set_fail_mode(false);

        let second = mock
            .sign(&Address::repeat_byte(1), &Amount::from(5u64), OperationType::Generate)
            .await
            .unwrap();
        assert_eq!(second.nonce, 11);
        assert_ne!(first.signature, second.signature);
        assert_eq!(mock.sign_calls(), 3);
    }
}
