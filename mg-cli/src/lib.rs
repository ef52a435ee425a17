//! MG CLI - Command Line Interface
//!
//! Thin command line front end over the microgrid read models and the
//! signed metering broker.
//!
//! # Usage
//!
//! ```text
//! mg [OPTIONS] <COMMAND>
//!
//! Commands:
//!   profile    Show a participant's registration, type and balance
//!   overview   Show supply, fund, validators and optionally a meter's status
//!   activity   Community activities (get, list)
//!   events     Scan ledger events
//!   authorize  Obtain a signed metering authorization
//!   health     Check the signing service
//!   call       Build contract calls for submission elsewhere
//! ```
//!
//! # Examples
//!
//! ```text
//! mg activity list --count 10
//! mg events generated --participant 0xdbc1f6ee28c545ebd291d1d2d49646bc834549ef --from-block 1200
//! mg authorize 0xdbc1f6ee28c545ebd291d1d2d49646bc834549ef 1500 --operation consume -f json
//! ```

pub mod commands;
pub mod error;
pub mod handler;
pub mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};
