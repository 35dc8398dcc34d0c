//! sqlx-backed `MissionRepository`/`SortieRepository` (`spec.md` §4.7).

use sqlx::{Row, SqlitePool};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::{MissionId, SortieId};
use crate::domain::models::mission::MissionPriority;
use crate::domain::models::{Mission, MissionStatus, Sortie, SortieStatus};
use crate::domain::ports::{MissionFilter, MissionRepository, SortieRepository};
use crate::infrastructure::database::utils::parse_datetime;

fn mission_status_str(status: MissionStatus) -> &'static str {
    match status {
        MissionStatus::Pending => "pending",
        MissionStatus::InProgress => "in_progress",
        MissionStatus::Completed => "completed",
        MissionStatus::Failed => "failed",
        MissionStatus::Cancelled => "cancelled",
        MissionStatus::Archived => "archived",
    }
}

fn parse_mission_status(s: &str) -> FleetResult<MissionStatus> {
    match s {
        "pending" => Ok(MissionStatus::Pending),
        "in_progress" => Ok(MissionStatus::InProgress),
        "completed" => Ok(MissionStatus::Completed),
        "failed" => Ok(MissionStatus::Failed),
        "cancelled" => Ok(MissionStatus::Cancelled),
        "archived" => Ok(MissionStatus::Archived),
        other => Err(FleetError::Internal(format!("unknown mission status in storage: {other}"))),
    }
}

fn priority_str(priority: MissionPriority) -> &'static str {
    match priority {
        MissionPriority::Critical => "critical",
        MissionPriority::High => "high",
        MissionPriority::Medium => "medium",
        MissionPriority::Low => "low",
    }
}

fn parse_priority(s: &str) -> FleetResult<MissionPriority> {
    match s {
        "critical" => Ok(MissionPriority::Critical),
        "high" => Ok(MissionPriority::High),
        "medium" => Ok(MissionPriority::Medium),
        "low" => Ok(MissionPriority::Low),
        other => Err(FleetError::Internal(format!("unknown priority in storage: {other}"))),
    }
}

fn sortie_status_str(status: SortieStatus) -> &'static str {
    match status {
        SortieStatus::Open => "open",
        SortieStatus::InProgress => "in_progress",
        SortieStatus::Blocked => "blocked",
        SortieStatus::Closed => "closed",
    }
}

fn parse_sortie_status(s: &str) -> FleetResult<SortieStatus> {
    match s {
        "open" => Ok(SortieStatus::Open),
        "in_progress" => Ok(SortieStatus::InProgress),
        "blocked" => Ok(SortieStatus::Blocked),
        "closed" => Ok(SortieStatus::Closed),
        other => Err(FleetError::Internal(format!("unknown sortie status in storage: {other}"))),
    }
}

fn row_to_mission(row: &sqlx::sqlite::SqliteRow) -> FleetResult<Mission> {
    Ok(Mission {
        id: row.get::<String, _>("id").parse()?,
        title: row.get("title"),
        description: row.get("description"),
        status: parse_mission_status(row.get::<String, _>("status").as_str())?,
        priority: parse_priority(row.get::<String, _>("priority").as_str())?,
        created_at: parse_datetime(row.get::<String, _>("created_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
        started_at: row.get::<Option<String>, _>("started_at").as_deref().map(parse_datetime).transpose().map_err(|e| FleetError::Internal(e.to_string()))?,
        completed_at: row.get::<Option<String>, _>("completed_at").as_deref().map(parse_datetime).transpose().map_err(|e| FleetError::Internal(e.to_string()))?,
    })
}

fn row_to_sortie(row: &sqlx::sqlite::SqliteRow) -> FleetResult<Sortie> {
    let files: Vec<String> = serde_json::from_str(row.get::<String, _>("files").as_str())?;
    Ok(Sortie {
        id: row.get::<String, _>("id").parse()?,
        mission_id: row.get::<Option<String>, _>("mission_id").as_deref().map(str::parse).transpose()?,
        status: parse_sortie_status(row.get::<String, _>("status").as_str())?,
        assigned_to: row.get("assigned_to"),
        files,
        blocked_reason: row.get("blocked_reason"),
        created_at: parse_datetime(row.get::<String, _>("created_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
        updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
    })
}

pub struct SqliteMissionRepository {
    pool: SqlitePool,
}

impl SqliteMissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MissionRepository for SqliteMissionRepository {
    async fn create(&self, mission: &Mission) -> FleetResult<()> {
        sqlx::query(
            "INSERT INTO missions (id, title, description, status, priority, created_at, started_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(mission.id.to_string())
        .bind(&mission.title)
        .bind(&mission.description)
        .bind(mission_status_str(mission.status))
        .bind(priority_str(mission.priority))
        .bind(mission.created_at.to_rfc3339())
        .bind(mission.started_at.map(|dt| dt.to_rfc3339()))
        .bind(mission.completed_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: MissionId) -> FleetResult<Option<Mission>> {
        let row = sqlx::query("SELECT * FROM missions WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_mission).transpose()
    }

    async fn update(&self, mission: &Mission) -> FleetResult<()> {
        sqlx::query(
            "UPDATE missions SET title = ?, description = ?, status = ?, priority = ?, started_at = ?, completed_at = ?
             WHERE id = ?",
        )
        .bind(&mission.title)
        .bind(&mission.description)
        .bind(mission_status_str(mission.status))
        .bind(priority_str(mission.priority))
        .bind(mission.started_at.map(|dt| dt.to_rfc3339()))
        .bind(mission.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(mission.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, filter: MissionFilter) -> FleetResult<Vec<Mission>> {
        let rows = match filter.status {
            Some(status) => sqlx::query("SELECT * FROM missions WHERE status = ? ORDER BY created_at")
                .bind(mission_status_str(status))
                .fetch_all(&self.pool)
                .await?,
            None => sqlx::query("SELECT * FROM missions ORDER BY created_at").fetch_all(&self.pool).await?,
        };
        rows.iter().map(row_to_mission).collect()
    }
}

pub struct SqliteSortieRepository {
    pool: SqlitePool,
}

impl SqliteSortieRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SortieRepository for SqliteSortieRepository {
    async fn create(&self, sortie: &Sortie) -> FleetResult<()> {
        let files = serde_json::to_string(&sortie.files)?;
        sqlx::query(
            "INSERT INTO sorties (id, mission_id, status, assigned_to, files, blocked_reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(sortie.id.to_string())
        .bind(sortie.mission_id.map(|id| id.to_string()))
        .bind(sortie_status_str(sortie.status))
        .bind(&sortie.assigned_to)
        .bind(&files)
        .bind(&sortie.blocked_reason)
        .bind(sortie.created_at.to_rfc3339())
        .bind(sortie.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: SortieId) -> FleetResult<Option<Sortie>> {
        let row = sqlx::query("SELECT * FROM sorties WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_sortie).transpose()
    }

    async fn update(&self, sortie: &Sortie) -> FleetResult<()> {
        let files = serde_json::to_string(&sortie.files)?;
        sqlx::query(
            "UPDATE sorties SET status = ?, assigned_to = ?, files = ?, blocked_reason = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(sortie_status_str(sortie.status))
        .bind(&sortie.assigned_to)
        .bind(&files)
        .bind(&sortie.blocked_reason)
        .bind(sortie.updated_at.to_rfc3339())
        .bind(sortie.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_mission(&self, mission_id: MissionId) -> FleetResult<Vec<Sortie>> {
        let rows = sqlx::query("SELECT * FROM sorties WHERE mission_id = ? ORDER BY created_at")
            .bind(mission_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_sortie).collect()
    }

    async fn list_by_status(&self, status: SortieStatus) -> FleetResult<Vec<Sortie>> {
        let rows = sqlx::query("SELECT * FROM sorties WHERE status = ? ORDER BY created_at")
            .bind(sortie_status_str(status))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_sortie).collect()
    }
}
