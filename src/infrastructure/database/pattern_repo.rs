//! sqlx-backed `PatternRepository` (`spec.md` §4.9).

use sqlx::{Row, SqlitePool};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::PatternId;
use crate::domain::models::{LearnedPattern, OrderedFloat, OutcomeResult, PatternOutcome};
use crate::domain::ports::PatternRepository;
use crate::infrastructure::database::utils::parse_datetime;

fn outcome_str(result: OutcomeResult) -> &'static str {
    match result {
        OutcomeResult::Success => "success",
        OutcomeResult::Failure => "failure",
        OutcomeResult::Partial => "partial",
    }
}

fn parse_outcome(s: &str) -> FleetResult<OutcomeResult> {
    match s {
        "success" => Ok(OutcomeResult::Success),
        "failure" => Ok(OutcomeResult::Failure),
        "partial" => Ok(OutcomeResult::Partial),
        other => Err(FleetError::Internal(format!("unknown outcome result in storage: {other}"))),
    }
}

fn row_to_pattern(row: &sqlx::sqlite::SqliteRow) -> FleetResult<LearnedPattern> {
    let trigger_words: Vec<String> = serde_json::from_str(row.get::<String, _>("trigger_words").as_str())?;
    Ok(LearnedPattern {
        id: row.get::<String, _>("id").parse()?,
        pattern_hash: row.get("pattern_hash"),
        pattern_type: row.get("pattern_type"),
        mission_type: row.get("mission_type"),
        trigger_words,
        approach: row.get("approach"),
        effectiveness: OrderedFloat(row.get::<f64, _>("effectiveness")),
        success_count: row.get::<i64, _>("success_count") as u32,
        failure_count: row.get::<i64, _>("failure_count") as u32,
        avg_duration: chrono::Duration::milliseconds(row.get::<i64, _>("avg_duration_ms")),
        usage_count: row.get::<i64, _>("usage_count") as u32,
        version: row.get::<i64, _>("version") as u32,
        archived: row.get::<i64, _>("archived") != 0,
        created_at: parse_datetime(row.get::<String, _>("created_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
        updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
        last_used_at: row
            .get::<Option<String>, _>("last_used_at")
            .as_deref()
            .map(parse_datetime)
            .transpose()
            .map_err(|e| FleetError::Internal(e.to_string()))?,
    })
}

fn row_to_outcome(row: &sqlx::sqlite::SqliteRow) -> FleetResult<PatternOutcome> {
    Ok(PatternOutcome {
        id: row.get::<String, _>("id").parse()?,
        pattern_id: row.get::<String, _>("pattern_id").parse()?,
        result: parse_outcome(row.get::<String, _>("result").as_str())?,
        recorded_at: parse_datetime(row.get::<String, _>("recorded_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
    })
}

pub struct SqlitePatternRepository {
    pool: SqlitePool,
}

impl SqlitePatternRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PatternRepository for SqlitePatternRepository {
    async fn create(&self, pattern: &LearnedPattern) -> FleetResult<()> {
        let trigger_words = serde_json::to_string(&pattern.trigger_words)?;
        sqlx::query(
            "INSERT INTO patterns (
                id, pattern_hash, pattern_type, mission_type, trigger_words, approach, effectiveness,
                success_count, failure_count, avg_duration_ms, usage_count, version,
                archived, created_at, updated_at, last_used_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(pattern.id.to_string())
        .bind(&pattern.pattern_hash)
        .bind(&pattern.pattern_type)
        .bind(&pattern.mission_type)
        .bind(&trigger_words)
        .bind(&pattern.approach)
        .bind(pattern.effectiveness.0)
        .bind(pattern.success_count as i64)
        .bind(pattern.failure_count as i64)
        .bind(pattern.avg_duration.num_milliseconds())
        .bind(pattern.usage_count as i64)
        .bind(pattern.version as i64)
        .bind(pattern.archived as i64)
        .bind(pattern.created_at.to_rfc3339())
        .bind(pattern.updated_at.to_rfc3339())
        .bind(pattern.last_used_at.map(|ts| ts.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: PatternId) -> FleetResult<Option<LearnedPattern>> {
        let row = sqlx::query("SELECT * FROM patterns WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_pattern).transpose()
    }

    async fn update(&self, pattern: &LearnedPattern) -> FleetResult<()> {
        sqlx::query(
            "UPDATE patterns SET effectiveness = ?, success_count = ?, failure_count = ?, avg_duration_ms = ?,
             usage_count = ?, version = ?, archived = ?, updated_at = ?, last_used_at = ?
             WHERE id = ?",
        )
        .bind(pattern.effectiveness.0)
        .bind(pattern.success_count as i64)
        .bind(pattern.failure_count as i64)
        .bind(pattern.avg_duration.num_milliseconds())
        .bind(pattern.usage_count as i64)
        .bind(pattern.version as i64)
        .bind(pattern.archived as i64)
        .bind(pattern.updated_at.to_rfc3339())
        .bind(pattern.last_used_at.map(|ts| ts.to_rfc3339()))
        .bind(pattern.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: PatternId) -> FleetResult<()> {
        sqlx::query("DELETE FROM patterns WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        Ok(())
    }

    async fn list_by_type(&self, pattern_type: &str) -> FleetResult<Vec<LearnedPattern>> {
        let rows = sqlx::query("SELECT * FROM patterns WHERE pattern_type = ? AND archived = 0 ORDER BY created_at")
            .bind(pattern_type)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_pattern).collect()
    }

    async fn list_all(&self) -> FleetResult<Vec<LearnedPattern>> {
        let rows = sqlx::query("SELECT * FROM patterns ORDER BY created_at").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_pattern).collect()
    }

    async fn record_outcome(&self, outcome: &PatternOutcome) -> FleetResult<()> {
        sqlx::query("INSERT INTO pattern_outcomes (id, pattern_id, result, recorded_at) VALUES (?, ?, ?, ?)")
            .bind(outcome.id.to_string())
            .bind(outcome.pattern_id.to_string())
            .bind(outcome_str(outcome.result))
            .bind(outcome.recorded_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_outcomes(&self, pattern_id: PatternId) -> FleetResult<Vec<PatternOutcome>> {
        let rows = sqlx::query("SELECT * FROM pattern_outcomes WHERE pattern_id = ? ORDER BY recorded_at")
            .bind(pattern_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_outcome).collect()
    }
}
