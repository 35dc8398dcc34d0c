//! Checkpoint repository port (`spec.md` §4.8).

use async_trait::async_trait;

use crate::domain::errors::FleetResult;
use crate::domain::ids::CheckpointId;
use crate::domain::models::Checkpoint;

#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    async fn create(&self, checkpoint: &Checkpoint) -> FleetResult<()>;

    /// Persist a mutation to an existing checkpoint, namely marking
    /// `consumed_at` once `resume` has consumed it (`spec.md` §4.8 step 6).
    async fn update(&self, checkpoint: &Checkpoint) -> FleetResult<()>;

    async fn get(&self, id: CheckpointId) -> FleetResult<Option<Checkpoint>>;

    async fn get_latest(&self) -> FleetResult<Option<Checkpoint>>;

    async fn list(&self, limit: usize) -> FleetResult<Vec<Checkpoint>>;

    async fn delete_older_than(&self, cutoff: chrono::DateTime<chrono::Utc>) -> FleetResult<u64>;
}
