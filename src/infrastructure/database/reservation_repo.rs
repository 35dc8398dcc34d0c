//! sqlx-backed `ReservationRepository`/`LockRepository` (`spec.md` §4.4).

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::{LockId, ReservationId};
use crate::domain::models::{Lock, LockStatus, Reservation, ReservationStatus};
use crate::domain::ports::{LockRepository, ReservationRepository};
use crate::infrastructure::database::utils::parse_datetime;

fn reservation_status_str(status: ReservationStatus) -> &'static str {
    match status {
        ReservationStatus::Active => "active",
        ReservationStatus::Released => "released",
        ReservationStatus::Expired => "expired",
    }
}

fn parse_reservation_status(s: &str) -> FleetResult<ReservationStatus> {
    match s {
        "active" => Ok(ReservationStatus::Active),
        "released" => Ok(ReservationStatus::Released),
        "expired" => Ok(ReservationStatus::Expired),
        other => Err(FleetError::Internal(format!("unknown reservation status in storage: {other}"))),
    }
}

fn row_to_reservation(row: &sqlx::sqlite::SqliteRow) -> FleetResult<Reservation> {
    Ok(Reservation {
        id: row.get::<String, _>("id").parse()?,
        path_pattern: row.get("path_pattern"),
        holder: row.get("holder"),
        exclusive: row.get::<i64, _>("exclusive") != 0,
        status: parse_reservation_status(row.get::<String, _>("status").as_str())?,
        acquired_at: parse_datetime(row.get::<String, _>("acquired_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
        expires_at: parse_datetime(row.get::<String, _>("expires_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
    })
}

pub struct SqliteReservationRepository {
    pool: SqlitePool,
}

impl SqliteReservationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReservationRepository for SqliteReservationRepository {
    async fn create(&self, reservation: &Reservation) -> FleetResult<()> {
        sqlx::query(
            "INSERT INTO reservations (id, path_pattern, holder, exclusive, status, acquired_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(reservation.id.to_string())
        .bind(&reservation.path_pattern)
        .bind(&reservation.holder)
        .bind(reservation.exclusive as i64)
        .bind(reservation_status_str(reservation.status))
        .bind(reservation.acquired_at.to_rfc3339())
        .bind(reservation.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: ReservationId) -> FleetResult<Option<Reservation>> {
        let row = sqlx::query("SELECT * FROM reservations WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_reservation).transpose()
    }

    async fn update(&self, reservation: &Reservation) -> FleetResult<()> {
        sqlx::query("UPDATE reservations SET status = ? WHERE id = ?")
            .bind(reservation_status_str(reservation.status))
            .bind(reservation.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_active(&self) -> FleetResult<Vec<Reservation>> {
        let rows = sqlx::query("SELECT * FROM reservations WHERE status = 'active' ORDER BY acquired_at").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_reservation).collect()
    }

    async fn list_active_for_holder(&self, holder: &str) -> FleetResult<Vec<Reservation>> {
        let rows = sqlx::query("SELECT * FROM reservations WHERE status = 'active' AND holder = ? ORDER BY acquired_at")
            .bind(holder)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_reservation).collect()
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> FleetResult<Vec<Reservation>> {
        let rows = sqlx::query("SELECT * FROM reservations WHERE status = 'active' AND expires_at <= ?")
            .bind(now.to_rfc3339())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_reservation).collect()
    }
}

fn lock_status_str(status: LockStatus) -> &'static str {
    match status {
        LockStatus::Held => "held",
        LockStatus::Released => "released",
        LockStatus::Expired => "expired",
    }
}

fn parse_lock_status(s: &str) -> FleetResult<LockStatus> {
    match s {
        "held" => Ok(LockStatus::Held),
        "released" => Ok(LockStatus::Released),
        "expired" => Ok(LockStatus::Expired),
        other => Err(FleetError::Internal(format!("unknown lock status in storage: {other}"))),
    }
}

fn row_to_lock(row: &sqlx::sqlite::SqliteRow) -> FleetResult<Lock> {
    Ok(Lock {
        id: row.get::<String, _>("id").parse()?,
        key: row.get("key"),
        holder: row.get("holder"),
        status: parse_lock_status(row.get::<String, _>("status").as_str())?,
        acquired_at: parse_datetime(row.get::<String, _>("acquired_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
        expires_at: parse_datetime(row.get::<String, _>("expires_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
    })
}

pub struct SqliteLockRepository {
    pool: SqlitePool,
}

impl SqliteLockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LockRepository for SqliteLockRepository {
    async fn create(&self, lock: &Lock) -> FleetResult<()> {
        sqlx::query("INSERT INTO locks (id, key, holder, status, acquired_at, expires_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(lock.id.to_string())
            .bind(&lock.key)
            .bind(&lock.holder)
            .bind(lock_status_str(lock.status))
            .bind(lock.acquired_at.to_rfc3339())
            .bind(lock.expires_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_by_key(&self, key: &str) -> FleetResult<Option<Lock>> {
        let row = sqlx::query("SELECT * FROM locks WHERE key = ? AND status = 'held'").bind(key).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_lock).transpose()
    }

    async fn list_held_by(&self, holder: &str) -> FleetResult<Vec<Lock>> {
        let rows = sqlx::query("SELECT * FROM locks WHERE holder = ? AND status = 'held' ORDER BY key")
            .bind(holder)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_lock).collect()
    }

    async fn update(&self, lock: &Lock) -> FleetResult<()> {
        sqlx::query("UPDATE locks SET status = ? WHERE id = ?")
            .bind(lock_status_str(lock.status))
            .bind(lock.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> FleetResult<Vec<Lock>> {
        let rows = sqlx::query("SELECT * FROM locks WHERE status = 'held' AND expires_at <= ?")
            .bind(now.to_rfc3339())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_lock).collect()
    }

    async fn delete(&self, id: LockId) -> FleetResult<()> {
        sqlx::query("DELETE FROM locks WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        Ok(())
    }
}
