//! Named lock repository port (`spec.md` §4.4).

use async_trait::async_trait;

use crate::domain::errors::FleetResult;
use crate::domain::ids::LockId;
use crate::domain::models::Lock;

#[async_trait]
pub trait LockRepository: Send + Sync {
    async fn create(&self, lock: &Lock) -> FleetResult<()>;

    async fn get_by_key(&self, key: &str) -> FleetResult<Option<Lock>>;

    /// Locks currently held by `holder`, used to enforce the deadlock-avoidance
    /// ordering rule on acquisition (`spec.md` §4.4).
    async fn list_held_by(&self, holder: &str) -> FleetResult<Vec<Lock>>;

    async fn update(&self, lock: &Lock) -> FleetResult<()>;

    async fn list_expired(&self, now: chrono::DateTime<chrono::Utc>) -> FleetResult<Vec<Lock>>;

    async fn delete(&self, id: LockId) -> FleetResult<()>;
}
