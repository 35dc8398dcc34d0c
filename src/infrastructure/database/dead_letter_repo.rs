//! sqlx-backed `DeadLetterRepository` (`SPEC_FULL.md` §3/§10).

use chrono::DateTime;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::EventId;
use crate::domain::models::{CircuitBreakerRecord, CircuitState, DeadLetterEntry};
use crate::domain::ports::DeadLetterRepository;
use crate::infrastructure::database::utils::parse_datetime;

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> FleetResult<DeadLetterEntry> {
    Ok(DeadLetterEntry {
        id: row.get::<String, _>("id").parse()?,
        original_event_id: row.get::<String, _>("original_event_id").parse()?,
        mailbox: row.get("mailbox"),
        failure_reason: row.get("failure_reason"),
        delivery_attempts: row.get::<i64, _>("delivery_attempts") as u32,
        first_failed_at: parse_datetime(row.get::<String, _>("first_failed_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
        last_failed_at: parse_datetime(row.get::<String, _>("last_failed_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
    })
}

fn circuit_state_str(state: CircuitState) -> &'static str {
    match state {
        CircuitState::Closed => "closed",
        CircuitState::Open => "open",
        CircuitState::HalfOpen => "half_open",
    }
}

fn parse_circuit_state(s: &str) -> FleetResult<CircuitState> {
    match s {
        "closed" => Ok(CircuitState::Closed),
        "open" => Ok(CircuitState::Open),
        "half_open" => Ok(CircuitState::HalfOpen),
        other => Err(FleetError::Internal(format!("unknown circuit state in storage: {other}"))),
    }
}

fn row_to_circuit(row: &sqlx::sqlite::SqliteRow) -> FleetResult<CircuitBreakerRecord> {
    Ok(CircuitBreakerRecord {
        mailbox: row.get("mailbox"),
        state: parse_circuit_state(row.get::<String, _>("state").as_str())?,
        consecutive_failures: row.get::<i64, _>("consecutive_failures") as u32,
        failure_threshold: row.get::<i64, _>("failure_threshold") as u32,
        opened_at: row
            .get::<Option<String>, _>("opened_at")
            .as_deref()
            .map(parse_datetime)
            .transpose()
            .map_err(|e| FleetError::Internal(e.to_string()))?,
        cooldown: chrono::Duration::milliseconds(row.get::<i64, _>("cooldown_ms")),
    })
}

pub struct SqliteDeadLetterRepository {
    pool: SqlitePool,
}

impl SqliteDeadLetterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DeadLetterRepository for SqliteDeadLetterRepository {
    async fn create(&self, entry: &DeadLetterEntry) -> FleetResult<()> {
        sqlx::query(
            "INSERT INTO dead_letters (
                id, original_event_id, mailbox, failure_reason, delivery_attempts,
                first_failed_at, last_failed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(entry.original_event_id.to_string())
        .bind(&entry.mailbox)
        .bind(&entry.failure_reason)
        .bind(entry.delivery_attempts as i64)
        .bind(entry.first_failed_at.to_rfc3339())
        .bind(entry.last_failed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, entry: &DeadLetterEntry) -> FleetResult<()> {
        sqlx::query("UPDATE dead_letters SET failure_reason = ?, delivery_attempts = ?, last_failed_at = ? WHERE id = ?")
            .bind(&entry.failure_reason)
            .bind(entry.delivery_attempts as i64)
            .bind(entry.last_failed_at.to_rfc3339())
            .bind(entry.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, mailbox: Option<&str>) -> FleetResult<Vec<DeadLetterEntry>> {
        let rows = match mailbox {
            Some(mailbox) => {
                sqlx::query("SELECT * FROM dead_letters WHERE mailbox = ? ORDER BY last_failed_at").bind(mailbox).fetch_all(&self.pool).await?
            }
            None => sqlx::query("SELECT * FROM dead_letters ORDER BY last_failed_at").fetch_all(&self.pool).await?,
        };
        rows.iter().map(row_to_entry).collect()
    }

    async fn delete(&self, id: EventId) -> FleetResult<()> {
        sqlx::query("DELETE FROM dead_letters WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_circuit(&self, mailbox: &str) -> FleetResult<Option<CircuitBreakerRecord>> {
        let row = sqlx::query("SELECT * FROM circuit_breakers WHERE mailbox = ?").bind(mailbox).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_circuit).transpose()
    }

    async fn save_circuit(&self, circuit: &CircuitBreakerRecord) -> FleetResult<()> {
        sqlx::query(
            "INSERT INTO circuit_breakers (mailbox, state, consecutive_failures, failure_threshold, opened_at, cooldown_ms)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (mailbox) DO UPDATE SET
                state = excluded.state,
                consecutive_failures = excluded.consecutive_failures,
                failure_threshold = excluded.failure_threshold,
                opened_at = excluded.opened_at,
                cooldown_ms = excluded.cooldown_ms",
        )
        .bind(&circuit.mailbox)
        .bind(circuit_state_str(circuit.state))
        .bind(circuit.consecutive_failures as i64)
        .bind(circuit.failure_threshold as i64)
        .bind(circuit.opened_at.map(|dt: DateTime<chrono::Utc>| dt.to_rfc3339()))
        .bind(circuit.cooldown.num_milliseconds())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
