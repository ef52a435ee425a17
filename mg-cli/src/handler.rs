//! Command Handlers

use mg_chain::{
    ActivityLifecycleModel, AddressFilter, BlockRange, CallBuilder, ChainConfig,
    ChainEventIndexer, ParticipantRegistryView, RpcLedgerGateway,
};
use mg_core::{EventKind, ProtocolParams};
use mg_meter::{HttpSigningService, SignedMeterOperationBroker, SignerConfig, SigningService};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::commands::{ActivityCommands, CallCommands, Cli, Commands};
use crate::error::{CliError, CliResult};
use crate::output;

/// Chain configuration from the environment with CLI overrides
fn chain_config(cli: &Cli) -> CliResult<ChainConfig> {
    let mut config = ChainConfig::from_env()?;
    if let Some(url) = &cli.rpc_url {
        config = config.with_rpc_url(url.clone());
    }
    config.validate()?;
    Ok(config)
}

fn signer_config(cli: &Cli) -> CliResult<SignerConfig> {
    let mut config = SignerConfig::from_env()?;
    if let Some(url) = &cli.signer_url {
        config.base_url = url.clone();
    }
    Ok(config)
}

async fn connect(cli: &Cli, config: &ChainConfig) -> CliResult<Arc<RpcLedgerGateway>> {
    let gateway = RpcLedgerGateway::connect(config)?;
    if !cli.skip_network_check {
        gateway.ensure_network().await?;
    }
    debug!(rpc_url = %config.rpc_url, "Connected to ledger node");
    Ok(Arc::new(gateway))
}

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> CliResult<()> {
    let format = cli.format;

    match &cli.command {
        Commands::Health => {
            let signer = HttpSigningService::new(&signer_config(&cli)?)?;
            let healthy = signer.health().await;
            match format {
                crate::OutputFormat::Json => output::print_json(&serde_json::json!({
                    "signer": signer.base_url(),
                    "healthy": healthy,
                })),
                crate::OutputFormat::Table => {
                    println!(
                        "Signing service {}: {}",
                        signer.base_url(),
                        if healthy { "healthy" } else { "unavailable" }
                    );
                    Ok(())
                }
            }
        }

        Commands::Call(cmd) => {
            let config = ChainConfig::from_env()?;
            let call = build_call(&CallBuilder::from_config(&config), cmd)?;
            output::print_call(&call, format)
        }

        Commands::Profile { address } => {
            let config = chain_config(&cli)?;
            let view = ParticipantRegistryView::new(connect(&cli, &config).await?);
            output::print_profile(&view.get_profile(address).await?, format)
        }

        Commands::Overview { meter } => {
            let config = chain_config(&cli)?;
            let view = ParticipantRegistryView::new(connect(&cli, &config).await?);
            output::print_overview(&view.network_overview(meter.as_ref()).await?, format)
        }

        Commands::Activity(cmd) => {
            let config = chain_config(&cli)?;
            let params = ProtocolParams::from_env()?;
            let model = ActivityLifecycleModel::new(connect(&cli, &config).await?, params)?;
            match cmd {
                ActivityCommands::Get { id } => {
                    let activity = model
                        .get_activity(*id)
                        .await?
                        .ok_or_else(|| CliError::not_found(format!("activity {}", id)))?;
                    output::print_activity(&activity, model.quorum_status(&activity), format)
                }
                ActivityCommands::List { count } => {
                    output::print_activities(&model.list_recent(*count).await?, format)
                }
            }
        }

        Commands::Events {
            kind,
            participant,
            from_address,
            to_address,
            from_block,
            to_block,
        } => {
            let kind = EventKind::from(*kind);
            let filter = match (participant, from_address, to_address) {
                (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                    return Err(CliError::invalid_arg(
                        "--participant cannot be combined with --from-address/--to-address",
                    ))
                }
                (Some(p), None, None) => AddressFilter::Participant(*p),
                (None, None, None) => AddressFilter::Any,
                (None, from, to) => AddressFilter::Transfer {
                    from: *from,
                    to: *to,
                },
            };
            let range = match to_block {
                Some(to) => BlockRange::new(*from_block, *to),
                None => BlockRange::from_block(*from_block),
            };

            let params = ProtocolParams::from_env()?;
            let config = chain_config(&cli)?;
            let gateway = connect(&cli, &config).await?;
            let indexer = ChainEventIndexer::new(gateway.reader(), &config);
            let events = indexer.scan(kind, &filter, range).await?;

            let mismatched = events
                .iter()
                .filter(|e| params.generation_split_matches(e) == Some(false))
                .count();
            if mismatched > 0 {
                warn!(
                    count = mismatched,
                    commission_rate = params.commission_rate,
                    commission_base = params.commission_base,
                    "Generation events with an unexpected commission split"
                );
            }
            output::print_events(&events, &params, format)
        }

        Commands::Authorize {
            participant,
            amount,
            operation,
            meter,
        } => {
            let config = chain_config(&cli)?;
            let mut signer_config = signer_config(&cli)?;
            if let Some(meter) = meter {
                signer_config.meter_address = Some(*meter);
            }

            let gateway = connect(&cli, &config).await?;
            let signer: Arc<dyn SigningService> =
                Arc::new(HttpSigningService::new(&signer_config)?);
            let broker =
                SignedMeterOperationBroker::from_config(gateway, signer, &config, &signer_config)
                    .await?;

            let op = broker
                .authorize(participant, amount, (*operation).into())
                .await?;
            output::print_authorized(&op, format)
        }
    }
}

fn build_call(calls: &CallBuilder, cmd: &CallCommands) -> CliResult<mg_chain::ContractCall> {
    let call = match cmd {
        CallCommands::Transfer { to, amount } => calls.transfer(to, amount)?,
        CallCommands::CreateActivity {
            description,
            reward,
        } => calls.create_activity(description, reward)?,
        CallCommands::ClaimActivity { id } => calls.claim_activity(*id)?,
        CallCommands::SubmitActivity { id } => calls.submit_activity(*id)?,
        CallCommands::ApproveActivity { id } => calls.approve_activity(*id)?,
        CallCommands::ProcessPayment { id } => calls.process_payment(*id)?,
        CallCommands::CancelActivity { id } => calls.cancel_activity(*id)?,
        CallCommands::RegisterParticipant {
            address,
            participant_type,
        } => calls.register_participant(address, (*participant_type).into()),
        CallCommands::AuthorizeMeter { meter, revoke } => calls.authorize_meter(meter, !revoke),
        CallCommands::UpdateValidators => calls.update_validators(),
    };
    Ok(call)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_core::{Address, Amount, GridError, ParticipantType};

    fn builder() -> CallBuilder {
        CallBuilder::new(Address::repeat_byte(0x70), Address::repeat_byte(0x80))
    }

    #[test]
    fn test_build_call_maps_commands() {
        let call = build_call(
            &builder(),
            &CallCommands::AuthorizeMeter {
                meter: Address::repeat_byte(0x99),
                revoke: true,
            },
        )
        .unwrap();
        assert_eq!(call.function, "authorizeMeter(address,bool)");
        assert_eq!(call.arguments[1], mg_chain::CallArgument::Bool(false));

        let register = build_call(
            &builder(),
            &CallCommands::RegisterParticipant {
                address: Address::repeat_byte(1),
                participant_type: crate::commands::ParticipantTypeArg::Prosumer,
            },
        )
        .unwrap();
        assert_eq!(
            register,
            builder().register_participant(&Address::repeat_byte(1), ParticipantType::Prosumer)
        );
    }

    #[test]
    fn test_build_call_rejects_invalid_input() {
        let err = build_call(&builder(), &CallCommands::ClaimActivity { id: 0 }).unwrap_err();
        assert!(matches!(err, CliError::Grid(GridError::InvalidInput(_))));

        let err = build_call(
            &builder(),
            &CallCommands::Transfer {
                to: Address::ZERO,
                amount: Amount::from(1u64),
            },
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
