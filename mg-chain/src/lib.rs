//! MG Chain - Ledger Access and Read Models
//!
//! This crate provides everything that reads from the microgrid ledger:
//!
//! - **ChainReader**: JSON-RPC seam to the ledger node (`eth_call`, `eth_getLogs`, blocks)
//! - **LedgerGateway**: typed reads of the token and manager contracts
//! - **ChainEventIndexer**: deduplicated, most-recent-first domain event scans
//! - **ActivityLifecycleModel**: activity records and quorum progress
//! - **ParticipantRegistryView**: participant profiles and network overview
//! - **CallBuilder**: contract calls for the transaction-submission collaborator
//! - **contracts**: `sol!` bindings of the token and manager ABIs
//!
//! # Usage
//!
//! ```rust,no_run
//! use mg_chain::{BlockRange, ChainConfig, ChainEventIndexer, RpcLedgerGateway};
//!
//! async fn example() -> mg_core::GridResult<()> {
//!     let config = ChainConfig::from_env()?;
//!     let gateway = RpcLedgerGateway::connect(&config)?;
//!     gateway.ensure_network().await?;
//!
//!     let indexer = ChainEventIndexer::new(gateway.reader(), &config);
//!     let events = indexer.energy_generated(None, BlockRange::all()).await?;
//!     println!("{} generation events", events.len());
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod calls;
pub mod config;
pub mod contracts;
pub mod gateway;
pub mod indexer;
pub mod mock;
pub mod registry;
pub mod rpc;

pub use activity::ActivityLifecycleModel;
pub use calls::{CallArgument, CallBuilder, ContractCall};
pub use config::ChainConfig;
pub use gateway::{LedgerGateway, RpcLedgerGateway};
pub use indexer::{AddressFilter, BlockRange, ChainEventIndexer, EventFeed};
pub use registry::{MeterStatus, NetworkOverview, ParticipantRegistryView};
pub use rpc::{BlockTag, ChainReader, JsonRpcClient, RawLog};
