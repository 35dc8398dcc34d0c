//! Path reservation CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::FleetResult;
use crate::domain::ids::ReservationId;
use crate::domain::models::Reservation;
use crate::service::FleetService;

#[derive(Args, Debug)]
pub struct ReservationArgs {
    #[command(subcommand)]
    pub command: ReservationCommands,
}

#[derive(Subcommand, Debug)]
pub enum ReservationCommands {
    /// List currently active reservations
    List,
    /// Acquire a reservation over a path pattern
    Reserve {
        path_pattern: String,
        holder: String,
        #[arg(short, long)]
        exclusive: bool,
    },
    /// Release a held reservation
    Release { id: String },
}

#[derive(Debug, Serialize)]
pub struct ReservationOutput {
    pub id: String,
    pub path_pattern: String,
    pub holder: String,
    pub exclusive: bool,
    pub status: String,
}

impl From<&Reservation> for ReservationOutput {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id.to_string(),
            path_pattern: r.path_pattern.clone(),
            holder: r.holder.clone(),
            exclusive: r.exclusive,
            status: format!("{:?}", r.status),
        }
    }
}

impl CommandOutput for ReservationOutput {
    fn to_human(&self) -> String {
        format!(
            "{} [{}] {} holder={} exclusive={}",
            self.id, self.status, self.path_pattern, self.holder, self.exclusive
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ReservationListOutput {
    pub reservations: Vec<ReservationOutput>,
}

impl CommandOutput for ReservationListOutput {
    fn to_human(&self) -> String {
        if self.reservations.is_empty() {
            return "No active reservations.".to_string();
        }
        self.reservations.iter().map(ReservationOutput::to_human).collect::<Vec<_>>().join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn run(args: ReservationArgs, service: &FleetService, json: bool) -> FleetResult<()> {
    match args.command {
        ReservationCommands::List => {
            let reservations = service.list_reservations().await?;
            output(&ReservationListOutput { reservations: reservations.iter().map(ReservationOutput::from).collect() }, json);
        }
        ReservationCommands::Reserve { path_pattern, holder, exclusive } => {
            let reservation = service.reserve(&path_pattern, &holder, exclusive).await?;
            output(&ReservationOutput::from(&reservation), json);
        }
        ReservationCommands::Release { id } => {
            let id: ReservationId = id.parse()?;
            service.release_reservation(id).await?;
        }
    }
    Ok(())
}
