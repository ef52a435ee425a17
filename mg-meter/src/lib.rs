//! MG Meter - Signed Metering Operations
//!
//! This crate brokers nonce-bound authorizations for energy generation and
//! consumption:
//!
//! - **SigningService**: seam to the remote signing collaborator, with an
//!   HTTP implementation and a mock for tests
//! - **SignedMeterOperationBroker**: meter authorization check, fresh
//!   signature, entry-point packaging
//! - **SignerConfig**: signing service endpoint and meter identity
//!
//! # Usage
//!
//! ```rust,no_run
//! use mg_chain::{ChainConfig, RpcLedgerGateway};
//! use mg_core::{Address, Amount, OperationType};
//! use mg_meter::{HttpSigningService, SignedMeterOperationBroker, SignerConfig};
//! use std::sync::Arc;
//!
//! async fn example(participant: Address) -> mg_core::GridResult<()> {
//!     let chain = ChainConfig::from_env()?;
//!     let signer_config = SignerConfig::from_env()?;
//!     let gateway = Arc::new(RpcLedgerGateway::connect(&chain)?);
//!     let signer = Arc::new(HttpSigningService::new(&signer_config)?);
//!
//!     let broker =
//!         SignedMeterOperationBroker::from_config(gateway, signer, &chain, &signer_config).await?;
//!     let op = broker
//!         .authorize(&participant, &Amount::from(1000u64), OperationType::Generate)
//!         .await?;
//!     println!("{} with nonce {}", op.call.function_name(), op.authorization.nonce);
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod client;
pub mod config;

pub use broker::{AuthorizedOperation, SignedMeterOperationBroker};
pub use client::{HttpSigningService, MockSigningService, SigningService};
pub use config::{SignatureRoute, SignerConfig};
