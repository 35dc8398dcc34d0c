//! sqlx-backed `EventRepository` (`spec.md` §4.2).
//!
//! Row mapping follows `infrastructure/database/task_repo.rs`'s idiom:
//! JSON-blob columns for nested data, `TEXT` columns for ids/timestamps.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::{EventId, Sequence};
use crate::domain::models::{Event, EventPayload, StreamType};
use crate::domain::ports::{EventFilter, EventRepository};
use crate::infrastructure::database::utils::parse_datetime;

pub struct SqliteEventRepository {
    pool: SqlitePool,
}

impl SqliteEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> FleetResult<Event> {
        let payload: EventPayload = serde_json::from_str(row.get::<String, _>("payload").as_str())?;
        Ok(Event {
            event_id: row.get::<String, _>("event_id").parse()?,
            stream_type: parse_stream_type(row.get::<String, _>("stream_type").as_str())?,
            stream_id: row.get("stream_id"),
            sequence: Sequence(row.get::<i64, _>("sequence") as u64),
            occurred_at: parse_datetime(row.get::<String, _>("occurred_at").as_str())
                .map_err(|e| FleetError::Internal(e.to_string()))?,
            recorded_at: parse_datetime(row.get::<String, _>("recorded_at").as_str())
                .map_err(|e| FleetError::Internal(e.to_string()))?,
            causation_id: row
                .get::<Option<String>, _>("causation_id")
                .as_deref()
                .map(str::parse)
                .transpose()?,
            correlation_id: row
                .get::<Option<String>, _>("correlation_id")
                .as_deref()
                .and_then(|s| uuid::Uuid::parse_str(s).ok()),
            metadata: row
                .get::<Option<String>, _>("metadata")
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok()),
            schema_version: row.get::<i64, _>("schema_version") as u32,
            payload,
        })
    }
}

fn parse_stream_type(s: &str) -> FleetResult<StreamType> {
    match s {
        "mission" => Ok(StreamType::Mission),
        "sortie" => Ok(StreamType::Sortie),
        "work_order" => Ok(StreamType::WorkOrder),
        "pilot" => Ok(StreamType::Pilot),
        "file" => Ok(StreamType::File),
        "lock" => Ok(StreamType::Lock),
        "checkpoint" => Ok(StreamType::Checkpoint),
        "mailbox" => Ok(StreamType::Mailbox),
        "system" => Ok(StreamType::System),
        other => Err(FleetError::Internal(format!("unknown stream_type in storage: {other}"))),
    }
}

#[async_trait::async_trait]
impl EventRepository for SqliteEventRepository {
    async fn append(&self, event: Event) -> FleetResult<Event> {
        let event_id = event.event_id.to_string();
        let stream_type = event.stream_type.to_string();
        let sequence = event.sequence.0 as i64;
        let occurred_at = event.occurred_at.to_rfc3339();
        let recorded_at = event.recorded_at.to_rfc3339();
        let causation_id = event.causation_id.map(|id| id.to_string());
        let correlation_id = event.correlation_id.map(|id| id.to_string());
        let metadata = event.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let event_type = event.event_type().to_string();
        let payload = serde_json::to_string(&event.payload)?;

        sqlx::query(
            "INSERT INTO events (
                event_id, stream_type, stream_id, sequence, occurred_at, recorded_at,
                causation_id, correlation_id, metadata, schema_version, event_type, payload
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event_id)
        .bind(&stream_type)
        .bind(&event.stream_id)
        .bind(sequence)
        .bind(&occurred_at)
        .bind(&recorded_at)
        .bind(&causation_id)
        .bind(&correlation_id)
        .bind(&metadata)
        .bind(event.schema_version as i64)
        .bind(&event_type)
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        Ok(event)
    }

    async fn get(&self, event_id: EventId) -> FleetResult<Option<Event>> {
        let id = event_id.to_string();
        let row = sqlx::query("SELECT * FROM events WHERE event_id = ?").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_event).transpose()
    }

    async fn query(&self, filter: EventFilter) -> FleetResult<Vec<Event>> {
        let mut sql = String::from("SELECT * FROM events WHERE 1 = 1");
        if filter.stream_type.is_some() {
            sql.push_str(" AND stream_type = ?");
        }
        if filter.stream_id.is_some() {
            sql.push_str(" AND stream_id = ?");
        }
        if filter.event_type.is_some() {
            sql.push_str(" AND event_type = ?");
        }
        if filter.since_sequence.is_some() {
            sql.push_str(" AND sequence > ?");
        }
        sql.push_str(" ORDER BY stream_type, stream_id, sequence");
        if filter.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(stream_type) = filter.stream_type {
            query = query.bind(stream_type.to_string());
        }
        if let Some(stream_id) = filter.stream_id {
            query = query.bind(stream_id);
        }
        if let Some(event_type) = filter.event_type {
            query = query.bind(event_type);
        }
        if let Some(since) = filter.since_sequence {
            query = query.bind(since.0 as i64);
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit as i64);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_event).collect()
    }

    async fn latest_sequence(&self, stream_type: StreamType, stream_id: &str) -> FleetResult<Sequence> {
        let row = sqlx::query("SELECT COALESCE(MAX(sequence), 0) AS max_seq FROM events WHERE stream_type = ? AND stream_id = ?")
            .bind(stream_type.to_string())
            .bind(stream_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Sequence(row.get::<i64, _>("max_seq") as u64))
    }

    async fn replay_since(&self, stream_type: StreamType, stream_id: &str, since: Sequence) -> FleetResult<Vec<Event>> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE stream_type = ? AND stream_id = ? AND sequence > ? ORDER BY sequence",
        )
        .bind(stream_type.to_string())
        .bind(stream_id)
        .bind(since.0 as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_event).collect()
    }

    async fn detect_sequence_gaps(&self, stream_type: StreamType, stream_id: &str) -> FleetResult<Vec<Sequence>> {
        let rows = sqlx::query("SELECT sequence FROM events WHERE stream_type = ? AND stream_id = ? ORDER BY sequence")
            .bind(stream_type.to_string())
            .bind(stream_id)
            .fetch_all(&self.pool)
            .await?;

        let mut gaps = Vec::new();
        let mut expected = 1u64;
        for row in &rows {
            let sequence = row.get::<i64, _>("sequence") as u64;
            while expected < sequence {
                gaps.push(Sequence(expected));
                expected += 1;
            }
            expected = sequence + 1;
        }
        Ok(gaps)
    }

    async fn count(&self) -> FleetResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM events").fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> FleetResult<u64> {
        let result = sqlx::query("DELETE FROM events WHERE recorded_at < ?").bind(cutoff.to_rfc3339()).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
