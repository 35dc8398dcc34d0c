//! Mutex lock CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::FleetResult;
use crate::domain::models::Lock;
use crate::service::FleetService;

#[derive(Args, Debug)]
pub struct LockArgs {
    #[command(subcommand)]
    pub command: LockCommands,
}

#[derive(Subcommand, Debug)]
pub enum LockCommands {
    /// List currently held locks
    List,
    /// Acquire a named lock
    Acquire { key: String, holder: String },
    /// Release a named lock
    Release { key: String, holder: String },
}

#[derive(Debug, Serialize)]
pub struct LockOutput {
    pub id: String,
    pub key: String,
    pub holder: String,
    pub status: String,
}

impl From<&Lock> for LockOutput {
    fn from(lock: &Lock) -> Self {
        Self { id: lock.id.to_string(), key: lock.key.clone(), holder: lock.holder.clone(), status: format!("{:?}", lock.status) }
    }
}

impl CommandOutput for LockOutput {
    fn to_human(&self) -> String {
        format!("{} [{}] key={} holder={}", self.id, self.status, self.key, self.holder)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct LockListOutput {
    pub locks: Vec<LockOutput>,
}

impl CommandOutput for LockListOutput {
    fn to_human(&self) -> String {
        if self.locks.is_empty() {
            return "No locks held.".to_string();
        }
        self.locks.iter().map(LockOutput::to_human).collect::<Vec<_>>().join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn run(args: LockArgs, service: &FleetService, json: bool) -> FleetResult<()> {
    match args.command {
        LockCommands::List => {
            let locks = service.list_locks().await?;
            output(&LockListOutput { locks: locks.iter().map(LockOutput::from).collect() }, json);
        }
        LockCommands::Acquire { key, holder } => {
            let lock = service.acquire_lock(&key, &holder).await?;
            output(&LockOutput::from(&lock), json);
        }
        LockCommands::Release { key, holder } => {
            service.release_lock(&key, &holder).await?;
        }
    }
    Ok(())
}
