//! Output Formatting

use mg_chain::{ContractCall, NetworkOverview};
use mg_core::{Activity, DomainEvent, Lookup, ParticipantInfo, ProtocolParams, QuorumStatus};
use mg_meter::AuthorizedOperation;
use serde::Serialize;
use std::fmt::Display;

use crate::commands::OutputFormat;
use crate::error::CliResult;

/// Print as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(data: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

fn lookup<T: Display>(value: &Lookup<T>) -> String {
    match value {
        Lookup::Known(v) => v.to_string(),
        Lookup::Unknown => "unknown".to_string(),
    }
}

pub fn print_profile(profile: &ParticipantInfo, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(profile),
        OutputFormat::Table => {
            println!("Participant: {}", profile.address);
            println!("  Registered: {}", profile.is_registered);
            println!("  Type:       {}", profile.participant_type);
            println!("  Balance:    {}", profile.balance);
            Ok(())
        }
    }
}

pub fn print_overview(overview: &NetworkOverview, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(overview),
        OutputFormat::Table => {
            println!("Microgrid Overview");
            println!("==================");
            println!("Total supply:  {}", overview.total_supply);
            println!("Fund balance:  {}", overview.fund_balance);
            println!("Participants:  {}", overview.participant_count);
            match &overview.validators {
                Lookup::Known(set) => {
                    println!("Validators:");
                    for validator in set.iter() {
                        println!("  - {}", validator);
                    }
                }
                Lookup::Unknown => println!("Validators:    unknown"),
            }
            if let Some(meter) = &overview.meter {
                println!("Meter {}:", meter.address);
                println!("  Authorized: {}", lookup(&meter.authorized));
                println!("  Nonce:      {}", lookup(&meter.nonce));
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct ActivityView<'a> {
    #[serde(flatten)]
    activity: &'a Activity,
    quorum: QuorumStatus,
}

pub fn print_activity(
    activity: &Activity,
    quorum: QuorumStatus,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&ActivityView { activity, quorum }),
        OutputFormat::Table => {
            println!("Activity #{}", activity.id);
            println!("  Description: {}", activity.description);
            println!("  Reward:      {}", activity.reward);
            println!("  State:       {}", activity.state);
            if !activity.executor.is_zero() {
                println!("  Executor:    {}", activity.executor);
            }
            println!(
                "  Approvals:   {}/{}{}",
                quorum.approvals,
                quorum.required,
                if quorum.reached { " (quorum reached)" } else { "" }
            );
            println!("  Validators:");
            for validator in activity.validators_snapshot.iter() {
                println!("    - {}", validator);
            }
            Ok(())
        }
    }
}

pub fn print_activities(activities: &[Activity], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(activities),
        OutputFormat::Table => {
            if activities.is_empty() {
                println!("No activities.");
                return Ok(());
            }
            println!(
                "{:>6}  {:<12}  {:>20}  {:>9}  DESCRIPTION",
                "ID", "STATE", "REWARD", "APPROVALS"
            );
            for a in activities {
                println!(
                    "{:>6}  {:<12}  {:>20}  {:>9}  {}",
                    a.id,
                    a.state.to_string(),
                    a.reward.to_string(),
                    a.approvals,
                    a.description
                );
            }
            Ok(())
        }
    }
}

/// Print scanned events
///
/// In table form, generation events whose reported split disagrees with
/// `params` are marked.
pub fn print_events(
    events: &[DomainEvent],
    params: &ProtocolParams,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(events),
        OutputFormat::Table => {
            if events.is_empty() {
                println!("No events.");
                return Ok(());
            }
            for event in events {
                let subject = match event {
                    DomainEvent::EnergyGenerated {
                        participant,
                        to_participant,
                        to_fund,
                        ..
                    } => format!("{} (+{} / fund {})", participant, to_participant, to_fund),
                    DomainEvent::EnergyConsumed { participant, .. } => participant.to_string(),
                    DomainEvent::Transfer { from, to, .. } => format!("{} -> {}", from, to),
                };
                let marker = match params.generation_split_matches(event) {
                    Some(false) => format!(
                        "  [split differs from {}/{} commission]",
                        params.commission_rate, params.commission_base
                    ),
                    _ => String::new(),
                };
                println!(
                    "#{:<9} {:>4}  {}  {:<16} {:>20}  {}{}",
                    event.block_number(),
                    event.log_index(),
                    event.timestamp().format("%Y-%m-%d %H:%M:%S"),
                    event.kind().to_string(),
                    event.amount().to_string(),
                    subject,
                    marker
                );
            }
            println!("{} event(s)", events.len());
            Ok(())
        }
    }
}

pub fn print_authorized(op: &AuthorizedOperation, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(op),
        OutputFormat::Table => {
            let auth = &op.authorization;
            println!("Authorization");
            println!("  Participant: {}", auth.participant);
            println!("  Amount:      {}", auth.amount);
            println!("  Operation:   {}", auth.operation_type);
            println!("  Meter:       {}", auth.meter_address);
            println!("  Nonce:       {}", auth.nonce);
            println!("  Signature:   {}", auth.signature);
            println!("  Issued at:   {}", auth.issued_at);
            print_call_table(&op.call)
        }
    }
}

pub fn print_call(call: &ContractCall, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(call),
        OutputFormat::Table => print_call_table(call),
    }
}

fn print_call_table(call: &ContractCall) -> CliResult<()> {
    println!("Call {} on {}", call.function, call.target_contract);
    println!("  Selector: {}", call.function_selector);
    println!("  Calldata: {}", call.calldata_hex());
    Ok(())
}
