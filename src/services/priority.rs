//! Scheduler scoring: priority weighting and capability-match scoring
//! (`spec.md` §4.6).
//!
//! Grounded on `priority_calculator.rs`'s `PriorityCalculator` (weighted
//! sum of a base term, a dependency-depth boost, and a deadline boost),
//! reshaped around the spec's capability/load/priority weighted formula.

use std::collections::HashSet;

use crate::domain::models::{MissionPriority, Pilot, WorkOrder};

/// `W_cap * capability_match + W_load * (1 - workload_ratio) + W_pri * priority_weight`
/// (`spec.md` §4.6). Weights sum to 1.0 by convention but are not enforced
/// to, so callers can tune emphasis without recompiling a new formula.
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub capability: f64,
    pub load: f64,
    pub priority: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { capability: 0.4, load: 0.3, priority: 0.3 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreCalculator {
    weights: ScoringWeights,
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

impl ScoreCalculator {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Fraction of `work_order`'s trigger words matched by any of
    /// `pilot`'s capabilities, in `[0, 1]`.
    pub fn capability_match(&self, pilot: &Pilot, work_order_words: &HashSet<String>) -> f64 {
        if work_order_words.is_empty() {
            return 0.0;
        }
        let matched: HashSet<&String> = pilot
            .capabilities
            .iter()
            .flat_map(|cap| cap.trigger_words.iter())
            .filter(|w| work_order_words.contains(w.to_lowercase().as_str()))
            .collect();
        matched.len() as f64 / work_order_words.len() as f64
    }

    /// Composite score used to rank candidate pilots for a work order. Not
    /// normalized to `[0, 1]` since `priority_weight` alone can already
    /// reach 1.0; callers only need relative ordering.
    pub fn score(&self, pilot: &Pilot, work_order: &WorkOrder) -> f64 {
        let words = work_order.trigger_words();
        let capability = self.capability_match(pilot, &words);
        let load = 1.0 - pilot.workload_ratio();
        let priority = work_order.priority.weight();

        self.weights.capability * capability + self.weights.load * load + self.weights.priority * priority
    }

    /// Rank candidates for a work order, highest score first. Pilots with no
    /// free capacity are excluded up front. Ties go to the most recent
    /// `last_heartbeat`, then to the lexicographically earliest `callsign`
    /// (`spec.md` §4.6, §8).
    pub fn rank<'a>(&self, candidates: &'a [Pilot], work_order: &WorkOrder) -> Vec<&'a Pilot> {
        let mut scored: Vec<(&Pilot, f64)> = candidates
            .iter()
            .filter(|p| p.has_free_capacity())
            .map(|p| (p, self.score(p, work_order)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.last_heartbeat.cmp(&a.0.last_heartbeat))
                .then_with(|| a.0.callsign.cmp(&b.0.callsign))
        });
        scored.into_iter().map(|(p, _)| p).collect()
    }
}

/// Retry backoff boost: the longer a work order has been retried, the more
/// it is deprioritized relative to fresh work, so a flapping task doesn't
/// starve the queue (`spec.md` §4.6).
pub fn retry_penalty(retry_count: u32) -> f64 {
    0.1 * f64::from(retry_count)
}

pub const fn priority_weight(priority: MissionPriority) -> f64 {
    priority.weight()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Capability;

    fn pilot_with_capability(name: &str, words: &[&str], workload: u32, max: u32) -> Pilot {
        let mut pilot = Pilot::new(name, "backend", max);
        pilot.current_workload = workload;
        pilot.capabilities.push(Capability::new(name, words.iter().map(|s| s.to_string()).collect()));
        pilot
    }

    #[test]
    fn capability_match_is_full_when_all_words_covered() {
        let calc = ScoreCalculator::default();
        let pilot = pilot_with_capability("rust-dev", &["rust", "endpoint"], 0, 5);
        let wo = WorkOrder::new("rust endpoint", "add rust endpoint", MissionPriority::Medium, 3);
        assert!((calc.capability_match(&pilot, &wo.trigger_words()) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ranking_prefers_lower_workload_among_equal_capability() {
        let calc = ScoreCalculator::default();
        let idle = pilot_with_capability("idle", &["rust"], 0, 5);
        let busy = pilot_with_capability("busy", &["rust"], 4, 5);
        let wo = WorkOrder::new("rust task", "rust work", MissionPriority::Medium, 3);
        let pilots = [busy, idle.clone()];
        let ranked = calc.rank(&pilots, &wo);
        assert_eq!(ranked[0].callsign, idle.callsign);
    }

    #[test]
    fn equal_scores_break_tie_on_heartbeat_then_callsign() {
        let calc = ScoreCalculator::default();
        let mut stale = pilot_with_capability("bravo", &["rust"], 0, 5);
        stale.last_heartbeat = chrono::Utc::now() - chrono::Duration::minutes(5);
        let mut fresh = pilot_with_capability("alpha", &["rust"], 0, 5);
        fresh.last_heartbeat = chrono::Utc::now();
        let wo = WorkOrder::new("rust task", "rust work", MissionPriority::Medium, 3);

        let pilots = [stale.clone(), fresh.clone()];
        let ranked = calc.rank(&pilots, &wo);
        assert_eq!(ranked[0].callsign, fresh.callsign, "more recent heartbeat wins the tie");
    }

    #[test]
    fn full_pilots_are_excluded_from_ranking() {
        let calc = ScoreCalculator::default();
        let full = pilot_with_capability("full", &["rust"], 5, 5);
        let wo = WorkOrder::new("rust task", "rust work", MissionPriority::Medium, 3);
        assert!(calc.rank(&[full], &wo).is_empty());
    }
}
