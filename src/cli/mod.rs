//! Administrative CLI: command definitions and dispatch.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::domain::errors::FleetResult;
use crate::service::FleetService;

#[derive(Parser, Debug)]
#[command(name = "fleetctl")]
#[command(about = "Administrative CLI for the fleet coordination core", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Work order submission and lifecycle
    #[command(subcommand)]
    WorkOrder(commands::work_order::WorkOrderCommands),

    /// Mission submission and status
    #[command(subcommand)]
    Mission(commands::mission::MissionCommands),

    /// Pilot registration, listing, and heartbeats
    #[command(subcommand)]
    Pilot(commands::pilot::PilotCommands),

    /// Path reservations
    #[command(subcommand)]
    Reservation(commands::reservation::ReservationCommands),

    /// Named mutex locks
    #[command(subcommand)]
    Lock(commands::lock::LockCommands),

    /// Checkpoint and resume
    #[command(subcommand)]
    Checkpoint(commands::checkpoint::CheckpointCommands),

    /// Learned pattern matching
    #[command(subcommand)]
    Pattern(commands::pattern::PatternCommands),

    /// Dead-letter queue and worker health
    #[command(subcommand)]
    DeadLetter(commands::dead_letter::DeadLetterCommands),
}

/// Dispatch a parsed command to its handler, returning the process exit code
/// per `spec.md` §6 (0 success, non-zero via `FleetError::exit_code()`).
pub async fn run(cli: Cli, service: &FleetService) -> i32 {
    let result = dispatch(cli, service).await;
    match result {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, service: &FleetService) -> FleetResult<()> {
    let json = cli.json;
    match cli.command {
        Commands::WorkOrder(command) => {
            commands::work_order::run(commands::work_order::WorkOrderArgs { command }, service, json).await
        }
        Commands::Mission(command) => commands::mission::run(commands::mission::MissionArgs { command }, service, json).await,
        Commands::Pilot(command) => commands::pilot::run(commands::pilot::PilotArgs { command }, service, json).await,
        Commands::Reservation(command) => {
            commands::reservation::run(commands::reservation::ReservationArgs { command }, service, json).await
        }
        Commands::Lock(command) => commands::lock::run(commands::lock::LockArgs { command }, service, json).await,
        Commands::Checkpoint(command) => {
            commands::checkpoint::run(commands::checkpoint::CheckpointArgs { command }, service, json).await
        }
        Commands::Pattern(command) => commands::pattern::run(commands::pattern::PatternArgs { command }, service, json).await,
        Commands::DeadLetter(command) => {
            commands::dead_letter::run(commands::dead_letter::DeadLetterArgs { command }, service, json).await
        }
    }
}
