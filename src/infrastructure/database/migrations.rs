//! Hand-rolled, forward-only migration runner (`spec.md` §4.1).
//!
//! Adapted from `adapters/sqlite/migrations.rs`'s `Migrator`, renaming the
//! version table to `schema_meta` per the wire format named in `spec.md`.

use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to execute migration {version}: {source}")]
    ExecutionError {
        version: i64,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to read schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub sql: String,
}

pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_embedded_migrations(&self, migrations: Vec<Migration>) -> Result<usize, MigrationError> {
        self.ensure_schema_meta_table().await?;
        let current_version = self.get_current_version().await?;
        let pending: Vec<_> = migrations.into_iter().filter(|m| m.version > current_version).collect();

        if pending.is_empty() {
            return Ok(0);
        }
        for migration in &pending {
            self.apply_migration(migration).await?;
        }
        Ok(pending.len())
    }

    async fn ensure_schema_meta_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_meta (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::ExecutionError { version: 0, source: e })?;
        Ok(())
    }

    pub async fn get_current_version(&self) -> Result<i64, MigrationError> {
        let result: Option<(i64,)> = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_meta")
            .fetch_optional(&self.pool)
            .await
            .map_err(MigrationError::VersionCheckError)?;
        Ok(result.map_or(0, |(v,)| v))
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), MigrationError> {
        sqlx::raw_sql(&migration.sql)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::ExecutionError { version: migration.version, source: e })?;

        sqlx::query("INSERT OR IGNORE INTO schema_meta (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::ExecutionError { version: migration.version, source: e })?;
        Ok(())
    }
}

pub fn all_embedded_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "core entities".to_string(),
            sql: include_str!("../../../migrations/001_core_entities.sql").to_string(),
        },
        Migration {
            version: 2,
            description: "coordination primitives".to_string(),
            sql: include_str!("../../../migrations/002_coordination_primitives.sql").to_string(),
        },
        Migration {
            version: 3,
            description: "checkpoints and learning".to_string(),
            sql: include_str!("../../../migrations/003_checkpoints_and_learning.sql").to_string(),
        },
        Migration {
            version: 4,
            description: "dead letters and circuit breakers".to_string(),
            sql: include_str!("../../../migrations/004_dead_letters.sql").to_string(),
        },
        Migration {
            version: 5,
            description: "checkpoint resume and pattern lineage".to_string(),
            sql: include_str!("../../../migrations/005_checkpoint_resume_and_pattern_lineage.sql").to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::connection::create_test_pool;

    #[tokio::test]
    async fn migrations_apply_in_order_and_are_idempotent() {
        let pool = create_test_pool().await.unwrap();
        let migrator = Migrator::new(pool);

        let applied = migrator.run_embedded_migrations(all_embedded_migrations()).await.unwrap();
        assert_eq!(applied, 5);
        assert_eq!(migrator.get_current_version().await.unwrap(), 5);

        let reapplied = migrator.run_embedded_migrations(all_embedded_migrations()).await.unwrap();
        assert_eq!(reapplied, 0);
    }
}
