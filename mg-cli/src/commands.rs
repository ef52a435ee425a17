//! CLI Commands
//!
//! Command definitions for the microgrid CLI. Connection settings come from
//! `MG_*` environment variables (a `.env` file is honored); flags override them.

use clap::{Parser, Subcommand, ValueEnum};
use mg_core::{Address, Amount, EventKind, OperationType, ParticipantType, DEFAULT_ACTIVITY_PAGE};

/// Microgrid ledger CLI
#[derive(Parser, Debug)]
#[command(name = "mg")]
#[command(version)]
#[command(about = "Microgrid ledger read models and signed metering")]
pub struct Cli {
    /// JSON-RPC endpoint, overrides MG_RPC_URL
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Signing service URL, overrides MG_SIGNER_URL
    #[arg(long)]
    pub signer_url: Option<String>,

    /// Skip the chain id check against MG_CHAIN_ID
    #[arg(long)]
    pub skip_network_check: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Log filter directive, overrides RUST_LOG
    #[arg(long)]
    pub log: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable
    #[default]
    Table,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show a participant's registration, type and balance
    Profile {
        #[arg(value_parser = parse_address)]
        address: Address,
    },

    /// Show supply, fund, validators and optionally a meter's status
    Overview {
        /// Meter to include
        #[arg(short, long, value_parser = parse_address)]
        meter: Option<Address>,
    },

    /// Community activities
    #[command(subcommand)]
    Activity(ActivityCommands),

    /// Scan ledger events
    Events {
        #[arg(value_enum)]
        kind: EventKindArg,
        /// Participant (or either transfer side)
        #[arg(short, long, value_parser = parse_address)]
        participant: Option<Address>,
        /// Transfer sender
        #[arg(long, value_parser = parse_address)]
        from_address: Option<Address>,
        /// Transfer recipient
        #[arg(long, value_parser = parse_address)]
        to_address: Option<Address>,
        /// First block, inclusive
        #[arg(long, default_value = "0")]
        from_block: u64,
        /// Last block, inclusive; latest when omitted
        #[arg(long)]
        to_block: Option<u64>,
    },

    /// Obtain a signed metering authorization
    Authorize {
        #[arg(value_parser = parse_address)]
        participant: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
        #[arg(short, long, value_enum, default_value = "generate")]
        operation: OperationArg,
        /// Meter to authorize for, overrides MG_METER_ADDRESS
        #[arg(short, long, value_parser = parse_address)]
        meter: Option<Address>,
    },

    /// Check the signing service
    Health,

    /// Build contract calls for submission elsewhere
    #[command(subcommand)]
    Call(CallCommands),
}

/// Activity subcommands
#[derive(Subcommand, Debug)]
pub enum ActivityCommands {
    /// Show one activity and its quorum progress
    Get { id: u64 },

    /// List the most recent activities
    List {
        #[arg(short, long, default_value_t = DEFAULT_ACTIVITY_PAGE)]
        count: u64,
    },
}

/// Call subcommands
#[derive(Subcommand, Debug)]
pub enum CallCommands {
    Transfer {
        #[arg(value_parser = parse_address)]
        to: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },
    CreateActivity {
        description: String,
        #[arg(value_parser = parse_amount)]
        reward: Amount,
    },
    ClaimActivity { id: u64 },
    SubmitActivity { id: u64 },
    ApproveActivity { id: u64 },
    ProcessPayment { id: u64 },
    CancelActivity { id: u64 },
    RegisterParticipant {
        #[arg(value_parser = parse_address)]
        address: Address,
        #[arg(value_enum)]
        participant_type: ParticipantTypeArg,
    },
    AuthorizeMeter {
        #[arg(value_parser = parse_address)]
        meter: Address,
        /// Revoke instead of grant
        #[arg(long)]
        revoke: bool,
    },
    UpdateValidators,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventKindArg {
    Generated,
    Consumed,
    Transfer,
}

impl From<EventKindArg> for EventKind {
    fn from(arg: EventKindArg) -> Self {
        match arg {
            EventKindArg::Generated => EventKind::EnergyGenerated,
            EventKindArg::Consumed => EventKind::EnergyConsumed,
            EventKindArg::Transfer => EventKind::Transfer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperationArg {
    Generate,
    Consume,
}

impl From<OperationArg> for OperationType {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Generate => OperationType::Generate,
            OperationArg::Consume => OperationType::Consume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ParticipantTypeArg {
    Consumer,
    Prosumer,
}

impl From<ParticipantTypeArg> for ParticipantType {
    fn from(arg: ParticipantTypeArg) -> Self {
        match arg {
            ParticipantTypeArg::Consumer => ParticipantType::Consumer,
            ParticipantTypeArg::Prosumer => ParticipantType::Prosumer,
        }
    }
}

fn parse_address(s: &str) -> Result<Address, String> {
    Address::parse(s).map_err(|e| e.to_string())
}

fn parse_amount(s: &str) -> Result<Amount, String> {
    Amount::parse_decimal(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_help() {
        let result = Cli::try_parse_from(["mg", "--help"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_authorize() {
        let cli = Cli::try_parse_from([
            "mg",
            "authorize",
            "0xDbC1f6ee28C545ebd291D1D2d49646Bc834549eF",
            "1500",
            "--operation",
            "consume",
        ])
        .unwrap();
        match cli.command {
            Commands::Authorize {
                amount, operation, ..
            } => {
                assert_eq!(amount, Amount::from(1500u64));
                assert_eq!(OperationType::from(operation), OperationType::Consume);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(Cli::try_parse_from(["mg", "profile", "0x1234"]).is_err());
    }

    #[test]
    fn test_activity_list_default_count() {
        let cli = Cli::try_parse_from(["mg", "activity", "list"]).unwrap();
        match cli.command {
            Commands::Activity(ActivityCommands::List { count }) => {
                assert_eq!(count, DEFAULT_ACTIVITY_PAGE)
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
