//! Learned pattern repository port (`spec.md` §4.9).

use async_trait::async_trait;

use crate::domain::errors::FleetResult;
use crate::domain::ids::PatternId;
use crate::domain::models::{LearnedPattern, PatternOutcome};

#[async_trait]
pub trait PatternRepository: Send + Sync {
    async fn create(&self, pattern: &LearnedPattern) -> FleetResult<()>;

    async fn get(&self, id: PatternId) -> FleetResult<Option<LearnedPattern>>;

    async fn update(&self, pattern: &LearnedPattern) -> FleetResult<()>;

    /// Permanently remove a pattern (`DeletePattern`, `spec.md` §6).
    async fn delete(&self, id: PatternId) -> FleetResult<()>;

    async fn list_by_type(&self, pattern_type: &str) -> FleetResult<Vec<LearnedPattern>>;

    async fn list_all(&self) -> FleetResult<Vec<LearnedPattern>>;

    async fn record_outcome(&self, outcome: &PatternOutcome) -> FleetResult<()>;

    async fn list_outcomes(&self, pattern_id: PatternId) -> FleetResult<Vec<PatternOutcome>>;
}
