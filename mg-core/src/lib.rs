//! MG Core - Microgrid Ledger Domain
//!
//! This crate provides the core types and interfaces shared by every layer of
//! the microgrid ledger core:
//! - Ledger primitives (addresses, 256-bit amounts, transaction hashes)
//! - Participant registry and community activity models
//! - Decoded domain events emitted by the token and manager contracts
//! - Nonce-bound signed metering authorizations
//!
//! Remote access (JSON-RPC node, signing service) lives in `mg-chain` and
//! `mg-meter`; nothing in this crate performs I/O beyond reading
//! environment variables.

pub mod constants;
pub mod env;
pub mod error;
pub mod logging;
pub mod params;
pub mod types;

pub use constants::*;
pub use error::*;
pub use params::ProtocolParams;
pub use types::*;
