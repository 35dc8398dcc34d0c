//! Dead-letter queue and circuit-breaker CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::FleetResult;
use crate::domain::ids::EventId;
use crate::domain::models::{CircuitBreakerRecord, DeadLetterEntry};
use crate::service::FleetService;

#[derive(Args, Debug)]
pub struct DeadLetterArgs {
    #[command(subcommand)]
    pub command: DeadLetterCommands,
}

#[derive(Subcommand, Debug)]
pub enum DeadLetterCommands {
    /// List dead-lettered events, optionally scoped to a mailbox
    List {
        #[arg(short, long)]
        mailbox: Option<String>,
    },
    /// Retry a dead-lettered event's delivery
    Retry { id: String, mailbox: String },
    /// Show a mailbox's circuit-breaker state
    Health { mailbox: String },
}

#[derive(Debug, Serialize)]
pub struct DeadLetterOutput {
    pub id: String,
    pub original_event_id: String,
    pub mailbox: String,
    pub failure_reason: String,
    pub delivery_attempts: u32,
}

impl From<&DeadLetterEntry> for DeadLetterOutput {
    fn from(entry: &DeadLetterEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            original_event_id: entry.original_event_id.to_string(),
            mailbox: entry.mailbox.clone(),
            failure_reason: entry.failure_reason.clone(),
            delivery_attempts: entry.delivery_attempts,
        }
    }
}

impl CommandOutput for DeadLetterOutput {
    fn to_human(&self) -> String {
        format!(
            "{} mailbox={} attempts={} reason={}",
            self.id, self.mailbox, self.delivery_attempts, self.failure_reason
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct DeadLetterListOutput {
    pub entries: Vec<DeadLetterOutput>,
}

impl CommandOutput for DeadLetterListOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No dead-lettered events.".to_string();
        }
        self.entries.iter().map(DeadLetterOutput::to_human).collect::<Vec<_>>().join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct WorkerHealthOutput {
    pub mailbox: String,
    pub state: String,
    pub consecutive_failures: u32,
}

impl From<&CircuitBreakerRecord> for WorkerHealthOutput {
    fn from(record: &CircuitBreakerRecord) -> Self {
        Self {
            mailbox: record.mailbox.clone(),
            state: format!("{:?}", record.state),
            consecutive_failures: record.consecutive_failures,
        }
    }
}

impl CommandOutput for WorkerHealthOutput {
    fn to_human(&self) -> String {
        format!("{} [{}] consecutive_failures={}", self.mailbox, self.state, self.consecutive_failures)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn run(args: DeadLetterArgs, service: &FleetService, json: bool) -> FleetResult<()> {
    match args.command {
        DeadLetterCommands::List { mailbox } => {
            let entries = service.list_dead_letters(mailbox.as_deref()).await?;
            output(&DeadLetterListOutput { entries: entries.iter().map(DeadLetterOutput::from).collect() }, json);
        }
        DeadLetterCommands::Retry { id, mailbox } => {
            let id: EventId = id.parse()?;
            service.retry_dead_letter(id, &mailbox).await?;
        }
        DeadLetterCommands::Health { mailbox } => {
            let record = service
                .worker_health(&mailbox)
                .await?
                .ok_or_else(|| crate::domain::errors::FleetError::NotFound(format!("mailbox {mailbox} has no circuit record")))?;
            output(&WorkerHealthOutput::from(&record), json);
        }
    }
    Ok(())
}
