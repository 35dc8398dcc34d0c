//! File reservation service: acquire/release/sweep with FIFO waiters
//! (`spec.md` §4.4).
//!
//! Grounded on the registry/versioning idiom in `agent_service.rs`, adapted
//! to reservation conflict-checking: the per-key mutex is held only while
//! mutating the in-memory wait queue, never across the repository write.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::ReservationId;
use crate::domain::models::{Lock, LockWaitQueue, Reservation};
use crate::domain::ports::ReservationRepository;

pub struct ReservationService<R: ReservationRepository> {
    repository: Arc<R>,
    wait_queues: Mutex<HashMap<String, LockWaitQueue>>,
    default_ttl: chrono::Duration,
}

impl<R: ReservationRepository> ReservationService<R> {
    pub fn new(repository: Arc<R>, default_ttl: chrono::Duration) -> Self {
        Self { repository, wait_queues: Mutex::new(HashMap::new()), default_ttl }
    }

    /// Acquire a reservation on `path_pattern` for `holder`. If an active
    /// reservation conflicts, the caller is enqueued as a FIFO waiter and
    /// `Err(FleetError::Conflict)` is returned; callers are expected to
    /// retry via `poll_wait_queue` once notified (`spec.md` §4.4).
    pub async fn acquire(&self, path_pattern: &str, holder: &str, exclusive: bool) -> FleetResult<Reservation> {
        let active = self.repository.list_active().await?;
        let candidate = Reservation::new(path_pattern, holder, exclusive, self.default_ttl);

        let conflict = active.iter().any(|existing| {
            existing.holder != holder && (existing.exclusive || exclusive) && existing.overlaps(&candidate)
        });

        if conflict {
            let mut queues = self.wait_queues.lock().await;
            queues.entry(path_pattern.to_string()).or_default().enqueue(holder);
            return Err(FleetError::Conflict(format!("path pattern {path_pattern} held by a conflicting reservation")));
        }

        self.repository.create(&candidate).await?;
        info!(holder, path_pattern, exclusive, "reservation acquired");
        Ok(candidate)
    }

    pub async fn release(&self, id: ReservationId) -> FleetResult<Option<String>> {
        let mut reservation = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("reservation {id}")))?;
        reservation.release();
        self.repository.update(&reservation).await?;

        let mut queues = self.wait_queues.lock().await;
        let next = queues.get_mut(&reservation.path_pattern).and_then(LockWaitQueue::dequeue);
        Ok(next)
    }

    /// Expire all reservations past their TTL, returning the holders freed
    /// up so the caller can wake their waiters.
    pub async fn sweep_expired(&self) -> FleetResult<Vec<Reservation>> {
        let now = Utc::now();
        let expired = self.repository.list_expired(now).await?;
        let mut freed = Vec::new();
        for mut reservation in expired {
            reservation.expire();
            self.repository.update(&reservation).await?;
            freed.push(reservation);
        }
        Ok(freed)
    }

    pub async fn cancel_wait(&self, path_pattern: &str, holder: &str) {
        let mut queues = self.wait_queues.lock().await;
        if let Some(queue) = queues.get_mut(path_pattern) {
            queue.remove(holder);
        }
    }
}

/// Minimal key-based lock acquisition, sharing the same FIFO-waiter idiom
/// as `ReservationService` but keyed by an opaque string instead of a path
/// pattern (`spec.md` §4.4 named locks).
pub struct LockService<L: crate::domain::ports::LockRepository> {
    repository: Arc<L>,
    wait_queues: Mutex<HashMap<String, LockWaitQueue>>,
}

impl<L: crate::domain::ports::LockRepository> LockService<L> {
    pub fn new(repository: Arc<L>) -> Self {
        Self { repository, wait_queues: Mutex::new(HashMap::new()) }
    }

    /// Acquire `key` for `holder`. Enforces the deadlock-avoidance ordering
    /// rule (`spec.md` §4.4): a holder may only hold one exclusive lock at a
    /// time, so acquiring a second or later key while others are already
    /// held is only permitted when `key` sorts lexicographically after every
    /// key the holder already holds. Acquiring out of canonical order is
    /// rejected rather than risking a circular wait with another holder
    /// acquiring the same keys in the opposite order.
    pub async fn acquire(&self, key: &str, holder: &str, ttl: chrono::Duration) -> FleetResult<Lock> {
        if let Some(existing) = self.repository.get_by_key(key).await? {
            if existing.holder != holder {
                let mut queues = self.wait_queues.lock().await;
                queues.entry(key.to_string()).or_default().enqueue(holder);
                return Err(FleetError::Conflict(format!("lock {key} held by {}", existing.holder)));
            }
            return Ok(existing);
        }

        let held = self.repository.list_held_by(holder).await?;
        if let Some(out_of_order) = held.iter().find(|l| *l.key >= *key) {
            return Err(FleetError::Conflict(format!(
                "lock acquisition out of canonical order: {holder} holds {} but requested {key}",
                out_of_order.key
            )));
        }

        let lock = Lock::new(key, holder, ttl);
        self.repository.create(&lock).await?;
        Ok(lock)
    }

    pub async fn release(&self, key: &str, holder: &str) -> FleetResult<Option<String>> {
        let mut lock = self
            .repository
            .get_by_key(key)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("lock {key}")))?;
        if lock.holder != holder {
            return Err(FleetError::Forbidden(format!("{holder} does not hold lock {key}")));
        }
        lock.release();
        self.repository.update(&lock).await?;

        let mut queues = self.wait_queues.lock().await;
        Ok(queues.get_mut(key).and_then(LockWaitQueue::dequeue))
    }

    pub async fn sweep_expired(&self) -> FleetResult<Vec<Lock>> {
        let now = Utc::now();
        let expired = self.repository.list_expired(now).await?;
        let mut freed = Vec::new();
        for mut lock in expired {
            lock.expire();
            self.repository.update(&lock).await?;
            freed.push(lock);
        }
        Ok(freed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeReservationRepository {
        reservations: StdMutex<Vec<Reservation>>,
    }

    #[async_trait]
    impl ReservationRepository for FakeReservationRepository {
        async fn create(&self, reservation: &Reservation) -> FleetResult<()> {
            self.reservations.lock().unwrap().push(reservation.clone());
            Ok(())
        }
        async fn get(&self, id: ReservationId) -> FleetResult<Option<Reservation>> {
            Ok(self.reservations.lock().unwrap().iter().find(|r| r.id == id).cloned())
        }
        async fn update(&self, reservation: &Reservation) -> FleetResult<()> {
            let mut reservations = self.reservations.lock().unwrap();
            if let Some(existing) = reservations.iter_mut().find(|r| r.id == reservation.id) {
                *existing = reservation.clone();
            }
            Ok(())
        }
        async fn list_active(&self) -> FleetResult<Vec<Reservation>> {
            Ok(self
                .reservations
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.status == crate::domain::models::ReservationStatus::Active)
                .cloned()
                .collect())
        }
        async fn list_active_for_holder(&self, holder: &str) -> FleetResult<Vec<Reservation>> {
            Ok(self.reservations.lock().unwrap().iter().filter(|r| r.holder == holder).cloned().collect())
        }
        async fn list_expired(&self, now: chrono::DateTime<Utc>) -> FleetResult<Vec<Reservation>> {
            Ok(self.reservations.lock().unwrap().iter().filter(|r| r.is_expired(now)).cloned().collect())
        }
    }

    #[tokio::test]
    async fn second_exclusive_reservation_on_same_path_conflicts() {
        let service = ReservationService::new(Arc::new(FakeReservationRepository::default()), chrono::Duration::minutes(5));
        service.acquire("src/main.rs", "pilot-1", true).await.unwrap();
        let err = service.acquire("src/main.rs", "pilot-2", true).await.unwrap_err();
        assert!(matches!(err, FleetError::Conflict(_)));
    }

    #[tokio::test]
    async fn release_returns_next_fifo_waiter() {
        let service = ReservationService::new(Arc::new(FakeReservationRepository::default()), chrono::Duration::minutes(5));
        let reservation = service.acquire("src/main.rs", "pilot-1", true).await.unwrap();
        service.acquire("src/main.rs", "pilot-2", true).await.unwrap_err();
        service.acquire("src/main.rs", "pilot-3", true).await.unwrap_err();

        let next = service.release(reservation.id).await.unwrap();
        assert_eq!(next, Some("pilot-2".to_string()));
    }

    #[derive(Default)]
    struct FakeLockRepository {
        locks: StdMutex<Vec<Lock>>,
    }

    #[async_trait]
    impl crate::domain::ports::LockRepository for FakeLockRepository {
        async fn create(&self, lock: &Lock) -> FleetResult<()> {
            self.locks.lock().unwrap().push(lock.clone());
            Ok(())
        }
        async fn get_by_key(&self, key: &str) -> FleetResult<Option<Lock>> {
            Ok(self
                .locks
                .lock()
                .unwrap()
                .iter()
                .find(|l| l.key == key && l.status == crate::domain::models::LockStatus::Held)
                .cloned())
        }
        async fn list_held_by(&self, holder: &str) -> FleetResult<Vec<Lock>> {
            Ok(self
                .locks
                .lock()
                .unwrap()
                .iter()
                .filter(|l| l.holder == holder && l.status == crate::domain::models::LockStatus::Held)
                .cloned()
                .collect())
        }
        async fn update(&self, lock: &Lock) -> FleetResult<()> {
            let mut locks = self.locks.lock().unwrap();
            if let Some(existing) = locks.iter_mut().find(|l| l.id == lock.id) {
                *existing = lock.clone();
            }
            Ok(())
        }
        async fn list_expired(&self, now: chrono::DateTime<Utc>) -> FleetResult<Vec<Lock>> {
            Ok(self.locks.lock().unwrap().iter().filter(|l| l.is_expired(now)).cloned().collect())
        }
        async fn delete(&self, id: crate::domain::ids::LockId) -> FleetResult<()> {
            self.locks.lock().unwrap().retain(|l| l.id != id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn second_lock_in_canonical_order_succeeds() {
        let service = LockService::new(Arc::new(FakeLockRepository::default()));
        service.acquire("a/first", "pilot-1", chrono::Duration::minutes(5)).await.unwrap();
        let second = service.acquire("b/second", "pilot-1", chrono::Duration::minutes(5)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn second_lock_out_of_canonical_order_is_rejected() {
        let service = LockService::new(Arc::new(FakeLockRepository::default()));
        service.acquire("b/second", "pilot-1", chrono::Duration::minutes(5)).await.unwrap();
        let err = service.acquire("a/first", "pilot-1", chrono::Duration::minutes(5)).await.unwrap_err();
        assert!(matches!(err, FleetError::Conflict(_)));
    }
}
