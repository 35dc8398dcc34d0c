//! sqlx-backed `CheckpointRepository` (`spec.md` §4.8).

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::{CheckpointId, Sequence};
use crate::domain::models::{Checkpoint, CheckpointTrigger};
use crate::domain::ports::CheckpointRepository;
use crate::infrastructure::database::utils::parse_datetime;

fn trigger_str(trigger: CheckpointTrigger) -> &'static str {
    match trigger {
        CheckpointTrigger::Manual => "manual",
        CheckpointTrigger::Auto => "auto",
        CheckpointTrigger::Progress => "progress",
        CheckpointTrigger::Error => "error",
        CheckpointTrigger::ContextLimit => "context_limit",
        CheckpointTrigger::Compaction => "compaction",
    }
}

fn parse_trigger(s: &str) -> FleetResult<CheckpointTrigger> {
    match s {
        "manual" => Ok(CheckpointTrigger::Manual),
        "auto" => Ok(CheckpointTrigger::Auto),
        "progress" => Ok(CheckpointTrigger::Progress),
        "error" => Ok(CheckpointTrigger::Error),
        "context_limit" => Ok(CheckpointTrigger::ContextLimit),
        "compaction" => Ok(CheckpointTrigger::Compaction),
        other => Err(FleetError::Internal(format!("unknown checkpoint trigger in storage: {other}"))),
    }
}

fn row_to_checkpoint(row: &sqlx::sqlite::SqliteRow) -> FleetResult<Checkpoint> {
    let snapshot: serde_json::Value = serde_json::from_str(row.get::<String, _>("snapshot").as_str())?;
    Ok(Checkpoint {
        id: row.get::<String, _>("id").parse()?,
        mission_id: row.get::<Option<String>, _>("mission_id").as_deref().map(str::parse).transpose()?,
        trigger: parse_trigger(row.get::<String, _>("trigger").as_str())?,
        event_watermark: Sequence(row.get::<i64, _>("event_watermark") as u64),
        snapshot,
        created_at: parse_datetime(row.get::<String, _>("created_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
        consumed_at: row
            .get::<Option<String>, _>("consumed_at")
            .as_deref()
            .map(parse_datetime)
            .transpose()
            .map_err(|e| FleetError::Internal(e.to_string()))?,
    })
}

pub struct SqliteCheckpointRepository {
    pool: SqlitePool,
}

impl SqliteCheckpointRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CheckpointRepository for SqliteCheckpointRepository {
    async fn create(&self, checkpoint: &Checkpoint) -> FleetResult<()> {
        let snapshot = serde_json::to_string(&checkpoint.snapshot)?;
        sqlx::query(
            "INSERT INTO checkpoints (id, mission_id, trigger, event_watermark, snapshot, created_at, consumed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(checkpoint.id.to_string())
        .bind(checkpoint.mission_id.map(|id| id.to_string()))
        .bind(trigger_str(checkpoint.trigger))
        .bind(checkpoint.event_watermark.0 as i64)
        .bind(&snapshot)
        .bind(checkpoint.created_at.to_rfc3339())
        .bind(checkpoint.consumed_at.map(|ts| ts.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, checkpoint: &Checkpoint) -> FleetResult<()> {
        sqlx::query("UPDATE checkpoints SET consumed_at = ? WHERE id = ?")
            .bind(checkpoint.consumed_at.map(|ts| ts.to_rfc3339()))
            .bind(checkpoint.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: CheckpointId) -> FleetResult<Option<Checkpoint>> {
        let row = sqlx::query("SELECT * FROM checkpoints WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_checkpoint).transpose()
    }

    async fn get_latest(&self) -> FleetResult<Option<Checkpoint>> {
        let row = sqlx::query("SELECT * FROM checkpoints ORDER BY created_at DESC LIMIT 1").fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_checkpoint).transpose()
    }

    async fn list(&self, limit: usize) -> FleetResult<Vec<Checkpoint>> {
        let rows = sqlx::query("SELECT * FROM checkpoints ORDER BY created_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_checkpoint).collect()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> FleetResult<u64> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE created_at < ?").bind(cutoff.to_rfc3339()).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
