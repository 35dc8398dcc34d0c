//! sqlx-backed `PilotRepository` (`spec.md` §4.5).

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::PilotId;
use crate::domain::models::{Capability, Pilot, PilotHealth, PilotStatus};
use crate::domain::ports::PilotRepository;
use crate::infrastructure::database::utils::parse_datetime;

fn status_str(status: PilotStatus) -> &'static str {
    match status {
        PilotStatus::Idle => "idle",
        PilotStatus::Busy => "busy",
        PilotStatus::Offline => "offline",
        PilotStatus::Error => "error",
    }
}

fn parse_status(s: &str) -> FleetResult<PilotStatus> {
    match s {
        "idle" => Ok(PilotStatus::Idle),
        "busy" => Ok(PilotStatus::Busy),
        "offline" => Ok(PilotStatus::Offline),
        "error" => Ok(PilotStatus::Error),
        other => Err(FleetError::Internal(format!("unknown pilot status in storage: {other}"))),
    }
}

fn row_to_pilot(row: &sqlx::sqlite::SqliteRow) -> FleetResult<Pilot> {
    let capabilities: Vec<Capability> = serde_json::from_str(row.get::<String, _>("capabilities").as_str())?;
    let health: PilotHealth = serde_json::from_str(row.get::<String, _>("health").as_str())?;
    Ok(Pilot {
        pilot_id: row.get::<String, _>("pilot_id").parse()?,
        callsign: row.get("callsign"),
        agent_type: row.get("agent_type"),
        status: parse_status(row.get::<String, _>("status").as_str())?,
        capabilities,
        current_workload: row.get::<i64, _>("current_workload") as u32,
        max_workload: row.get::<i64, _>("max_workload") as u32,
        last_heartbeat: parse_datetime(row.get::<String, _>("last_heartbeat").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
        created_at: parse_datetime(row.get::<String, _>("created_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
        health,
    })
}

pub struct SqlitePilotRepository {
    pool: SqlitePool,
}

impl SqlitePilotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PilotRepository for SqlitePilotRepository {
    async fn register(&self, pilot: &Pilot) -> FleetResult<()> {
        let capabilities = serde_json::to_string(&pilot.capabilities)?;
        let health = serde_json::to_string(&pilot.health)?;
        sqlx::query(
            "INSERT INTO pilots (
                pilot_id, callsign, agent_type, status, capabilities, current_workload,
                max_workload, last_heartbeat, created_at, health
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(pilot.pilot_id.to_string())
        .bind(&pilot.callsign)
        .bind(&pilot.agent_type)
        .bind(status_str(pilot.status))
        .bind(&capabilities)
        .bind(pilot.current_workload as i64)
        .bind(pilot.max_workload as i64)
        .bind(pilot.last_heartbeat.to_rfc3339())
        .bind(pilot.created_at.to_rfc3339())
        .bind(&health)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: PilotId) -> FleetResult<Option<Pilot>> {
        let row = sqlx::query("SELECT * FROM pilots WHERE pilot_id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_pilot).transpose()
    }

    async fn get_by_callsign(&self, callsign: &str) -> FleetResult<Option<Pilot>> {
        let row = sqlx::query("SELECT * FROM pilots WHERE callsign = ?").bind(callsign).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_pilot).transpose()
    }

    async fn update(&self, pilot: &Pilot) -> FleetResult<()> {
        let capabilities = serde_json::to_string(&pilot.capabilities)?;
        let health = serde_json::to_string(&pilot.health)?;
        sqlx::query(
            "UPDATE pilots SET agent_type = ?, status = ?, capabilities = ?, current_workload = ?,
                max_workload = ?, last_heartbeat = ?, health = ? WHERE pilot_id = ?",
        )
        .bind(&pilot.agent_type)
        .bind(status_str(pilot.status))
        .bind(&capabilities)
        .bind(pilot.current_workload as i64)
        .bind(pilot.max_workload as i64)
        .bind(pilot.last_heartbeat.to_rfc3339())
        .bind(&health)
        .bind(pilot.pilot_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self) -> FleetResult<Vec<Pilot>> {
        let rows = sqlx::query("SELECT * FROM pilots ORDER BY created_at").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_pilot).collect()
    }

    async fn list_by_status(&self, status: PilotStatus) -> FleetResult<Vec<Pilot>> {
        let rows = sqlx::query("SELECT * FROM pilots WHERE status = ? ORDER BY created_at")
            .bind(status_str(status))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_pilot).collect()
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>) -> FleetResult<Vec<Pilot>> {
        let rows = sqlx::query("SELECT * FROM pilots WHERE last_heartbeat < ? AND status != 'offline'")
            .bind(cutoff.to_rfc3339())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_pilot).collect()
    }

    async fn deregister(&self, id: PilotId) -> FleetResult<()> {
        sqlx::query("DELETE FROM pilots WHERE pilot_id = ?").bind(id.to_string()).execute(&self.pool).await?;
        Ok(())
    }
}
