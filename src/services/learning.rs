//! Pattern learning and matching (`spec.md` §4.9).
//!
//! Learned patterns are matched to new work orders via Jaccard similarity
//! over trigger words (`domain::models::pattern`), then reinforced or
//! decayed as outcomes are recorded.

use std::sync::Arc;

use tracing::info;

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::PatternId;
use crate::domain::models::{
    LearnedPattern, OutcomeResult, PatternOutcome, WorkOrder, WorkOrderStatus, ARCHIVAL_DELTA_THRESHOLD,
    MIN_OUTCOMES_FOR_ARCHIVAL,
};
use crate::domain::ports::PatternRepository;

const DECAY_HALF_LIFE_OUTCOMES: f64 = 5.0;

/// Aggregate learning metrics for one `pattern_type` (`GetMetrics`,
/// `spec.md` §4.9/§6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct PatternTypeMetrics {
    pub pattern_type: String,
    pub pattern_count: usize,
    pub avg_effectiveness: f64,
    pub total_usage: u32,
    /// "improving"/"declining"/"stable": recent outcomes (most recent half)
    /// compared against the older half, by success rate.
    pub trend: String,
}

pub struct LearningService<R: PatternRepository> {
    repository: Arc<R>,
}

impl<R: PatternRepository> LearningService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Find the best-matching non-archived pattern of `pattern_type` for a
    /// work order's trigger words: Jaccard similarity at or above
    /// `MATCH_JACCARD_THRESHOLD` AND effectiveness at or above
    /// `MATCH_EFFECTIVENESS_THRESHOLD`, ties broken by effectiveness
    /// (`spec.md` §4.9).
    pub async fn find_match(&self, pattern_type: &str, work_order: &WorkOrder) -> FleetResult<Option<LearnedPattern>> {
        let candidates = self.repository.list_by_type(pattern_type).await?;
        let words = work_order.trigger_words();

        let best = candidates
            .into_iter()
            .filter(|p| p.is_match(pattern_type, &words))
            .max_by(|a, b| a.effectiveness.0.partial_cmp(&b.effectiveness.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(best)
    }

    pub async fn learn(&self, pattern_type: &str, trigger_words: Vec<String>, approach: &str) -> FleetResult<LearnedPattern> {
        let pattern = LearnedPattern::new(pattern_type, trigger_words, approach);
        self.repository.create(&pattern).await?;
        info!(pattern_id = %pattern.id, pattern_type, "pattern learned");
        Ok(pattern)
    }

    /// Extract a pattern from a mission that just reached `completed`
    /// (`spec.md` §4.9): the ordered sequence of completed work-order
    /// `work_type` values becomes the pattern's trigger words, and
    /// `pattern_hash` identifies this exact sequence so a repeat mission
    /// reinforces the same pattern instead of creating a duplicate.
    pub async fn extract_from_completed_work_orders(
        &self,
        mission_type: &str,
        completed_work_orders: &[WorkOrder],
    ) -> FleetResult<Option<LearnedPattern>> {
        let sequence: Vec<String> = completed_work_orders
            .iter()
            .filter(|w| w.status == WorkOrderStatus::Completed)
            .map(|w| w.work_type.clone())
            .collect();
        if sequence.is_empty() {
            return Ok(None);
        }

        let mut canonical = sequence.clone();
        canonical.sort();
        let pattern_hash = crate::domain::models::pattern::compute_pattern_hash("mission_sequence", mission_type, &canonical);

        if let Some(existing) = self.repository.list_all().await?.into_iter().find(|p| p.pattern_hash == pattern_hash) {
            return Ok(Some(existing));
        }

        let approach = sequence.join(" -> ");
        let pattern = LearnedPattern::with_mission_type("mission_sequence", mission_type, sequence, approach);
        self.repository.create(&pattern).await?;
        info!(pattern_id = %pattern.id, mission_type, "pattern extracted from completed mission");
        Ok(Some(pattern))
    }

    /// Record an outcome for a pattern's use and update its effectiveness.
    /// Per DESIGN.md's Open Question decision: the pattern is updated in
    /// place unless its effectiveness has swung by at least
    /// `ARCHIVAL_DELTA_THRESHOLD` across at least `MIN_OUTCOMES_FOR_ARCHIVAL`
    /// outcomes, in which case the old version is archived and a new
    /// version is created.
    pub async fn record_outcome(&self, pattern_id: PatternId, result: OutcomeResult) -> FleetResult<LearnedPattern> {
        let mut pattern = self
            .repository
            .get(pattern_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("pattern {pattern_id}")))?;

        let outcome = PatternOutcome::new(pattern_id, result);
        self.repository.record_outcome(&outcome).await?;

        let history = self.repository.list_outcomes(pattern_id).await?;
        let results: Vec<OutcomeResult> = history.iter().map(|o| o.result).collect();
        let new_effectiveness = crate::domain::models::pattern::decayed_effectiveness(&results, DECAY_HALF_LIFE_OUTCOMES);
        let delta = (new_effectiveness - pattern.effectiveness.0).abs();

        pattern.usage_count += 1;

        if results.len() >= MIN_OUTCOMES_FOR_ARCHIVAL && delta >= ARCHIVAL_DELTA_THRESHOLD {
            pattern.archived = true;
            self.repository.update(&pattern).await?;

            let mut next_version = pattern.clone();
            next_version.archived = false;
            next_version.version += 1;
            next_version.effectiveness = crate::domain::models::pattern::OrderedFloat(new_effectiveness);
            next_version.usage_count = 0;
            self.repository.create(&next_version).await?;
            info!(pattern_id = %pattern_id, new_version = next_version.version, "pattern effectiveness shifted, archived and versioned");
            return Ok(next_version);
        }

        pattern.effectiveness = crate::domain::models::pattern::OrderedFloat(new_effectiveness);
        self.repository.update(&pattern).await?;
        Ok(pattern)
    }

    pub async fn delete(&self, id: PatternId) -> FleetResult<()> {
        self.repository.delete(id).await
    }

    /// Counts, average effectiveness, total usage, and outcome trend per
    /// `pattern_type` (`GetMetrics`, `spec.md` §4.9/§6).
    pub async fn get_metrics(&self) -> FleetResult<Vec<PatternTypeMetrics>> {
        let patterns = self.repository.list_all().await?;
        let mut by_type: std::collections::BTreeMap<String, Vec<LearnedPattern>> = std::collections::BTreeMap::new();
        for pattern in patterns {
            by_type.entry(pattern.pattern_type.clone()).or_default().push(pattern);
        }

        let mut metrics = Vec::with_capacity(by_type.len());
        for (pattern_type, patterns) in by_type {
            let pattern_count = patterns.len();
            let avg_effectiveness = patterns.iter().map(|p| p.effectiveness.0).sum::<f64>() / pattern_count as f64;
            let total_usage = patterns.iter().map(|p| p.usage_count).sum();

            let mut results = Vec::new();
            for pattern in &patterns {
                results.extend(self.repository.list_outcomes(pattern.id).await?.into_iter().map(|o| o.result));
            }
            let trend = outcome_trend(&results);

            metrics.push(PatternTypeMetrics { pattern_type, pattern_count, avg_effectiveness, total_usage, trend });
        }
        Ok(metrics)
    }
}

/// Compare the success rate of the more recent half of `results` against
/// the older half. Fewer than 4 outcomes is too little signal to call a
/// direction, so it reads as stable.
fn outcome_trend(results: &[OutcomeResult]) -> String {
    if results.len() < 4 {
        return "stable".to_string();
    }
    let mid = results.len() / 2;
    let success_rate = |slice: &[OutcomeResult]| {
        slice.iter().filter(|r| matches!(r, OutcomeResult::Success)).count() as f64 / slice.len() as f64
    };
    let older = success_rate(&results[..mid]);
    let recent = success_rate(&results[mid..]);
    if recent - older > 0.1 {
        "improving".to_string()
    } else if older - recent > 0.1 {
        "declining".to_string()
    } else {
        "stable".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MissionPriority;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakePatternRepository {
        patterns: Mutex<HashMap<PatternId, LearnedPattern>>,
        outcomes: Mutex<Vec<PatternOutcome>>,
    }

    #[async_trait]
    impl PatternRepository for FakePatternRepository {
        async fn create(&self, pattern: &LearnedPattern) -> FleetResult<()> {
            self.patterns.lock().unwrap().insert(pattern.id, pattern.clone());
            Ok(())
        }
        async fn get(&self, id: PatternId) -> FleetResult<Option<LearnedPattern>> {
            Ok(self.patterns.lock().unwrap().get(&id).cloned())
        }
        async fn update(&self, pattern: &LearnedPattern) -> FleetResult<()> {
            self.patterns.lock().unwrap().insert(pattern.id, pattern.clone());
            Ok(())
        }
        async fn delete(&self, id: PatternId) -> FleetResult<()> {
            self.patterns.lock().unwrap().remove(&id);
            Ok(())
        }
        async fn list_by_type(&self, pattern_type: &str) -> FleetResult<Vec<LearnedPattern>> {
            Ok(self.patterns.lock().unwrap().values().filter(|p| p.pattern_type == pattern_type).cloned().collect())
        }
        async fn list_all(&self) -> FleetResult<Vec<LearnedPattern>> {
            Ok(self.patterns.lock().unwrap().values().cloned().collect())
        }
        async fn record_outcome(&self, outcome: &PatternOutcome) -> FleetResult<()> {
            self.outcomes.lock().unwrap().push(outcome.clone());
            Ok(())
        }
        async fn list_outcomes(&self, pattern_id: PatternId) -> FleetResult<Vec<PatternOutcome>> {
            Ok(self.outcomes.lock().unwrap().iter().filter(|o| o.pattern_id == pattern_id).cloned().collect())
        }
    }

    #[tokio::test]
    async fn find_match_returns_pattern_above_threshold() {
        let repo = Arc::new(FakePatternRepository::default());
        let service = LearningService::new(repo);
        service.learn("retry_backoff", vec!["timeout".into(), "retry".into()], "exponential backoff").await.unwrap();

        let wo = WorkOrder::new("retry", "timeout retry", MissionPriority::Medium, 2);
        let matched = service.find_match("retry_backoff", &wo).await.unwrap();
        assert!(matched.is_some());
    }

    #[tokio::test]
    async fn find_match_rejects_pattern_below_effectiveness_gate() {
        let repo = Arc::new(FakePatternRepository::default());
        let mut pattern = LearnedPattern::new("retry_backoff", vec!["timeout".into(), "retry".into()], "exponential backoff");
        pattern.effectiveness = crate::domain::models::pattern::OrderedFloat(0.2);
        repo.create(&pattern).await.unwrap();
        let service = LearningService::new(repo);

        let wo = WorkOrder::new("retry", "timeout retry", MissionPriority::Medium, 2);
        let matched = service.find_match("retry_backoff", &wo).await.unwrap();
        assert!(matched.is_none());
    }

    #[tokio::test]
    async fn extraction_builds_pattern_from_completed_work_order_sequence() {
        let repo = Arc::new(FakePatternRepository::default());
        let service = LearningService::new(repo);

        let mut first = WorkOrder::new("scaffold", "set up project", MissionPriority::Medium, 2);
        first.status = WorkOrderStatus::Completed;
        let mut second = WorkOrder::new("deploy", "ship to staging", MissionPriority::Medium, 2);
        second.status = WorkOrderStatus::Completed;
        let mut skipped = WorkOrder::new("cleanup", "never ran", MissionPriority::Medium, 2);
        skipped.status = WorkOrderStatus::Cancelled;

        let pattern = service
            .extract_from_completed_work_orders("deploy_pipeline", &[first, second, skipped])
            .await
            .unwrap()
            .expect("extraction should produce a pattern");
        assert_eq!(pattern.trigger_words, vec!["scaffold".to_string(), "deploy".to_string()]);
        assert_eq!(pattern.mission_type, "deploy_pipeline");

        let again = service
            .extract_from_completed_work_orders(
                "deploy_pipeline",
                &[
                    {
                        let mut w = WorkOrder::new("scaffold", "different description", MissionPriority::Low, 1);
                        w.status = WorkOrderStatus::Completed;
                        w
                    },
                    {
                        let mut w = WorkOrder::new("deploy", "another description", MissionPriority::Low, 1);
                        w.status = WorkOrderStatus::Completed;
                        w
                    },
                ],
            )
            .await
            .unwrap()
            .expect("repeat extraction should match the existing pattern");
        assert_eq!(again.id, pattern.id, "identical work-type sequence should reinforce the existing pattern");
    }

    #[tokio::test]
    async fn repeated_failures_drive_effectiveness_down() {
        let repo = Arc::new(FakePatternRepository::default());
        let service = LearningService::new(repo);
        let pattern = service.learn("retry_backoff", vec!["timeout".into()], "naive retry").await.unwrap();

        let mut updated = pattern.clone();
        for _ in 0..6 {
            updated = service.record_outcome(pattern.id, OutcomeResult::Failure).await.unwrap();
        }
        assert!(updated.effectiveness.0 < 0.5);
    }
}
