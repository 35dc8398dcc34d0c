//! Pilot CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::FleetResult;
use crate::domain::ids::PilotId;
use crate::domain::models::{Capability, Pilot, PilotHealth};
use crate::service::FleetService;

#[derive(Args, Debug)]
pub struct PilotArgs {
    #[command(subcommand)]
    pub command: PilotCommands,
}

#[derive(Subcommand, Debug)]
pub enum PilotCommands {
    /// Register a pilot (idempotent by callsign)
    Register {
        callsign: String,
        agent_type: String,
        #[arg(short, long, default_value_t = 3)]
        max_workload: u32,
    },
    /// List all pilots
    List,
    /// Show a pilot by callsign
    Show { callsign: String },
    /// Record a heartbeat, reporting all health signals as ok
    Heartbeat { id: String },
}

#[derive(Debug, Serialize)]
pub struct PilotOutput {
    pub pilot_id: String,
    pub callsign: String,
    pub agent_type: String,
    pub status: String,
    pub current_workload: u32,
    pub max_workload: u32,
}

impl From<&Pilot> for PilotOutput {
    fn from(pilot: &Pilot) -> Self {
        Self {
            pilot_id: pilot.pilot_id.to_string(),
            callsign: pilot.callsign.clone(),
            agent_type: pilot.agent_type.clone(),
            status: format!("{:?}", pilot.status),
            current_workload: pilot.current_workload,
            max_workload: pilot.max_workload,
        }
    }
}

impl CommandOutput for PilotOutput {
    fn to_human(&self) -> String {
        format!(
            "{} ({}) [{}] workload={}/{}",
            self.callsign, self.agent_type, self.status, self.current_workload, self.max_workload
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct PilotListOutput {
    pub pilots: Vec<PilotOutput>,
}

impl CommandOutput for PilotListOutput {
    fn to_human(&self) -> String {
        if self.pilots.is_empty() {
            return "No pilots registered.".to_string();
        }
        self.pilots.iter().map(PilotOutput::to_human).collect::<Vec<_>>().join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct HeartbeatOutput {
    pub health: String,
}

impl CommandOutput for HeartbeatOutput {
    fn to_human(&self) -> String {
        format!("health: {}", self.health)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn run(args: PilotArgs, service: &FleetService, json: bool) -> FleetResult<()> {
    match args.command {
        PilotCommands::Register { callsign, agent_type, max_workload } => {
            let pilot = service.register_pilot(&callsign, &agent_type, max_workload, Vec::<Capability>::new()).await?;
            output(&PilotOutput::from(&pilot), json);
        }
        PilotCommands::List => {
            let pilots = service.list_pilots().await?;
            output(&PilotListOutput { pilots: pilots.iter().map(PilotOutput::from).collect() }, json);
        }
        PilotCommands::Show { callsign } => {
            let pilot = service
                .get_pilot_by_callsign(&callsign)
                .await?
                .ok_or_else(|| crate::domain::errors::FleetError::NotFound(format!("pilot {callsign}")))?;
            output(&PilotOutput::from(&pilot), json);
        }
        PilotCommands::Heartbeat { id } => {
            let id: PilotId = id.parse()?;
            let health = service.heartbeat_pilot(id, PilotHealth::default()).await?;
            output(&HeartbeatOutput { health: format!("{health:?}") }, json);
        }
    }
    Ok(())
}
