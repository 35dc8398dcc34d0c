//! Mission CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::work_order::parse_priority;
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::FleetResult;
use crate::domain::ids::MissionId;
use crate::domain::models::Mission;
use crate::domain::ports::MissionFilter;
use crate::service::FleetService;

#[derive(Args, Debug)]
pub struct MissionArgs {
    #[command(subcommand)]
    pub command: MissionCommands,
}

#[derive(Subcommand, Debug)]
pub enum MissionCommands {
    /// Submit a new mission
    Submit {
        title: String,
        #[arg(short, long, default_value = "medium")]
        priority: String,
    },
    /// List missions
    List,
    /// Show a single mission
    Show { id: String },
}

#[derive(Debug, Serialize)]
pub struct MissionOutput {
    pub id: String,
    pub title: String,
    pub status: String,
    pub priority: String,
}

impl From<&Mission> for MissionOutput {
    fn from(mission: &Mission) -> Self {
        Self {
            id: mission.id.to_string(),
            title: mission.title.clone(),
            status: format!("{:?}", mission.status),
            priority: format!("{:?}", mission.priority),
        }
    }
}

impl CommandOutput for MissionOutput {
    fn to_human(&self) -> String {
        format!("{} [{}] {} priority={}", self.id, self.status, self.title, self.priority)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct MissionListOutput {
    pub missions: Vec<MissionOutput>,
}

impl CommandOutput for MissionListOutput {
    fn to_human(&self) -> String {
        if self.missions.is_empty() {
            return "No missions found.".to_string();
        }
        self.missions.iter().map(MissionOutput::to_human).collect::<Vec<_>>().join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn run(args: MissionArgs, service: &FleetService, json: bool) -> FleetResult<()> {
    match args.command {
        MissionCommands::Submit { title, priority } => {
            let mission = service.submit_mission(&title, parse_priority(&priority)?).await?;
            output(&MissionOutput::from(&mission), json);
        }
        MissionCommands::List => {
            let missions = service.list_missions(MissionFilter::default()).await?;
            output(&MissionListOutput { missions: missions.iter().map(MissionOutput::from).collect() }, json);
        }
        MissionCommands::Show { id } => {
            let id: MissionId = id.parse()?;
            let mission =
                service.get_mission(id).await?.ok_or_else(|| crate::domain::errors::FleetError::NotFound(format!("mission {id}")))?;
            output(&MissionOutput::from(&mission), json);
        }
    }
    Ok(())
}
