//! Checkpoint and resume CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::FleetResult;
use crate::domain::ids::{CheckpointId, MissionId};
use crate::domain::models::{Checkpoint, CheckpointTrigger, ResumePlan};
use crate::service::FleetService;

#[derive(Args, Debug)]
pub struct CheckpointArgs {
    #[command(subcommand)]
    pub command: CheckpointCommands,
}

#[derive(Subcommand, Debug)]
pub enum CheckpointCommands {
    /// Take a checkpoint of the current fleet state
    Create {
        #[arg(short, long)]
        mission: Option<String>,
        #[arg(short, long, default_value = "manual")]
        trigger: String,
    },
    /// List recent checkpoints
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Show a checkpoint by id
    Show { id: String },
    /// Show the most recent checkpoint
    Latest,
    /// Preview what resuming a checkpoint would restore, without acting
    DryRunResume { id: String },
    /// Resume from a checkpoint
    Resume { id: String },
}

fn parse_trigger(s: &str) -> FleetResult<CheckpointTrigger> {
    match s {
        "manual" => Ok(CheckpointTrigger::Manual),
        "auto" => Ok(CheckpointTrigger::Auto),
        "progress" => Ok(CheckpointTrigger::Progress),
        "error" => Ok(CheckpointTrigger::Error),
        "context_limit" => Ok(CheckpointTrigger::ContextLimit),
        "compaction" => Ok(CheckpointTrigger::Compaction),
        other => Err(crate::domain::errors::FleetError::InvalidInput(format!("unknown trigger: {other}"))),
    }
}

#[derive(Debug, Serialize)]
pub struct CheckpointOutput {
    pub id: String,
    pub mission_id: Option<String>,
    pub trigger: String,
    pub event_watermark: String,
}

impl From<&Checkpoint> for CheckpointOutput {
    fn from(c: &Checkpoint) -> Self {
        Self {
            id: c.id.to_string(),
            mission_id: c.mission_id.map(|m| m.to_string()),
            trigger: format!("{:?}", c.trigger),
            event_watermark: c.event_watermark.to_string(),
        }
    }
}

impl CommandOutput for CheckpointOutput {
    fn to_human(&self) -> String {
        format!(
            "{} trigger={} mission={} watermark={}",
            self.id,
            self.trigger,
            self.mission_id.as_deref().unwrap_or("-"),
            self.event_watermark
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct CheckpointListOutput {
    pub checkpoints: Vec<CheckpointOutput>,
}

impl CommandOutput for CheckpointListOutput {
    fn to_human(&self) -> String {
        if self.checkpoints.is_empty() {
            return "No checkpoints found.".to_string();
        }
        self.checkpoints.iter().map(CheckpointOutput::to_human).collect::<Vec<_>>().join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ResumePlanOutput {
    pub checkpoint_id: String,
    pub missions_to_restore: usize,
    pub work_orders_to_requeue: usize,
    pub reservations_to_drop: usize,
    pub events_to_replay: usize,
}

impl From<&ResumePlan> for ResumePlanOutput {
    fn from(plan: &ResumePlan) -> Self {
        Self {
            checkpoint_id: plan.checkpoint_id.to_string(),
            missions_to_restore: plan.missions_to_restore,
            work_orders_to_requeue: plan.work_orders_to_requeue,
            reservations_to_drop: plan.reservations_to_drop,
            events_to_replay: plan.events_to_replay as usize,
        }
    }
}

impl CommandOutput for ResumePlanOutput {
    fn to_human(&self) -> String {
        format!(
            "checkpoint {}: missions={} work_orders={} reservations_dropped={} events_replayed={}",
            self.checkpoint_id,
            self.missions_to_restore,
            self.work_orders_to_requeue,
            self.reservations_to_drop,
            self.events_to_replay
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn run(args: CheckpointArgs, service: &FleetService, json: bool) -> FleetResult<()> {
    match args.command {
        CheckpointCommands::Create { mission, trigger } => {
            let mission_id: Option<MissionId> = mission.map(|m| m.parse()).transpose()?;
            let checkpoint = service.create_checkpoint(mission_id, parse_trigger(&trigger)?).await?;
            output(&CheckpointOutput::from(&checkpoint), json);
        }
        CheckpointCommands::List { limit } => {
            let checkpoints = service.list_checkpoints(limit).await?;
            output(&CheckpointListOutput { checkpoints: checkpoints.iter().map(CheckpointOutput::from).collect() }, json);
        }
        CheckpointCommands::Show { id } => {
            let id: CheckpointId = id.parse()?;
            let checkpoint = service
                .get_checkpoint(id)
                .await?
                .ok_or_else(|| crate::domain::errors::FleetError::NotFound(format!("checkpoint {id}")))?;
            output(&CheckpointOutput::from(&checkpoint), json);
        }
        CheckpointCommands::Latest => {
            let checkpoint = service
                .get_latest_checkpoint()
                .await?
                .ok_or_else(|| crate::domain::errors::FleetError::NotFound("no checkpoints exist".to_string()))?;
            output(&CheckpointOutput::from(&checkpoint), json);
        }
        CheckpointCommands::DryRunResume { id } => {
            let id: CheckpointId = id.parse()?;
            let plan = service.dry_run_resume(id).await?;
            output(&ResumePlanOutput::from(&plan), json);
        }
        CheckpointCommands::Resume { id } => {
            let id: CheckpointId = id.parse()?;
            let plan = service.resume(id).await?;
            output(&ResumePlanOutput::from(&plan), json);
        }
    }
    Ok(())
}
