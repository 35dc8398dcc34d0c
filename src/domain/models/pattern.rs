//! Learned pattern matching entities (`spec.md` §3, §4.9).

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{OutcomeId, PatternId};

/// Minimum Jaccard similarity and effectiveness a pattern must clear to be
/// considered a match (`spec.md` §4.9).
pub const MATCH_JACCARD_THRESHOLD: f64 = 0.6;
pub const MATCH_EFFECTIVENESS_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub id: PatternId,
    /// Content digest of `pattern_type ∥ mission_type ∥ canonical_sequence`,
    /// unique per pattern lineage (`spec.md` §3).
    pub pattern_hash: String,
    pub pattern_type: String,
    pub mission_type: String,
    pub trigger_words: Vec<String>,
    pub approach: String,
    pub effectiveness: OrderedFloat,
    pub success_count: u32,
    pub failure_count: u32,
    pub avg_duration: chrono::Duration,
    pub usage_count: u32,
    pub version: u32,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// A thin `f64` wrapper with `Eq`/`Ord` for use in derived equality; NaN is
/// never produced by `LearnedPattern::record_outcome`, so total ordering is
/// safe here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl Eq for OrderedFloat {}

/// Digest of `pattern_type ∥ mission_type ∥ canonical_sequence` used as the
/// unique `pattern_hash` (`spec.md` §3, §4.9). Not cryptographic — only
/// used for content-addressed identity within this fleet's pattern store.
pub fn compute_pattern_hash(pattern_type: &str, mission_type: &str, canonical_sequence: &[String]) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    pattern_type.hash(&mut hasher);
    mission_type.hash(&mut hasher);
    canonical_sequence.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

impl LearnedPattern {
    pub fn new(pattern_type: impl Into<String>, trigger_words: Vec<String>, approach: impl Into<String>) -> Self {
        Self::with_mission_type(pattern_type, "generic", trigger_words, approach)
    }

    /// Construct a pattern scoped to a specific `mission_type`, as produced
    /// by mission-completion extraction (`spec.md` §4.9) or an explicit
    /// `CreatePattern` call that names one.
    pub fn with_mission_type(
        pattern_type: impl Into<String>,
        mission_type: impl Into<String>,
        trigger_words: Vec<String>,
        approach: impl Into<String>,
    ) -> Self {
        let pattern_type = pattern_type.into();
        let mission_type = mission_type.into();
        let mut canonical = trigger_words.clone();
        canonical.sort();
        let pattern_hash = compute_pattern_hash(&pattern_type, &mission_type, &canonical);
        let now = Utc::now();
        Self {
            id: PatternId::new(),
            pattern_hash,
            pattern_type,
            mission_type,
            trigger_words,
            approach: approach.into(),
            effectiveness: OrderedFloat(0.5),
            success_count: 0,
            failure_count: 0,
            avg_duration: chrono::Duration::zero(),
            usage_count: 0,
            version: 1,
            archived: false,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        }
    }

    /// Jaccard similarity between this pattern's trigger words and a work
    /// order's tokenized trigger words (`spec.md` §4.9).
    pub fn jaccard_similarity(&self, words: &HashSet<String>) -> f64 {
        let pattern_words: HashSet<String> = self.trigger_words.iter().cloned().collect();
        if pattern_words.is_empty() && words.is_empty() {
            return 0.0;
        }
        let intersection = pattern_words.intersection(words).count();
        let union = pattern_words.union(words).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    /// Whether `other` is matchable against this pattern regardless of
    /// mission type, restricted only by `pattern_type` (DESIGN.md Open
    /// Question decision).
    pub fn matches_type(&self, pattern_type: &str) -> bool {
        !self.archived && self.pattern_type == pattern_type
    }

    /// Full match rule per `spec.md` §4.9: same `pattern_type`, Jaccard
    /// similarity at or above `MATCH_JACCARD_THRESHOLD`, and effectiveness
    /// at or above `MATCH_EFFECTIVENESS_THRESHOLD`.
    pub fn is_match(&self, pattern_type: &str, words: &HashSet<String>) -> bool {
        self.matches_type(pattern_type)
            && self.jaccard_similarity(words) >= MATCH_JACCARD_THRESHOLD
            && self.effectiveness.0 >= MATCH_EFFECTIVENESS_THRESHOLD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    Success,
    Failure,
    Partial,
}

impl OutcomeResult {
    const fn score(self) -> f64 {
        match self {
            Self::Success => 1.0,
            Self::Partial => 0.5,
            Self::Failure => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternOutcome {
    pub id: OutcomeId,
    pub pattern_id: PatternId,
    pub result: OutcomeResult,
    pub recorded_at: DateTime<Utc>,
}

impl PatternOutcome {
    pub fn new(pattern_id: PatternId, result: OutcomeResult) -> Self {
        Self { id: OutcomeId::new(), pattern_id, result, recorded_at: Utc::now() }
    }
}

/// Exponential recency decay weight: more recent outcomes count more.
/// `half_life_outcomes` controls how fast older outcomes fade (`spec.md`
/// §4.9).
pub fn decayed_effectiveness(outcomes: &[OutcomeResult], half_life_outcomes: f64) -> f64 {
    if outcomes.is_empty() {
        return 0.5;
    }
    let decay = std::f64::consts::LN_2 / half_life_outcomes;
    let n = outcomes.len();
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (age, outcome) in outcomes.iter().rev().enumerate() {
        let weight = (-decay * age as f64).exp();
        weighted_sum += weight * outcome.score();
        weight_total += weight;
    }
    let _ = n;
    weighted_sum / weight_total
}

/// Archival threshold per DESIGN.md: a pattern is version-bumped and
/// archived only when effectiveness swings by at least this delta across at
/// least `MIN_OUTCOMES_FOR_ARCHIVAL` outcomes; smaller deltas just update in
/// place.
pub const ARCHIVAL_DELTA_THRESHOLD: f64 = 0.2;
pub const MIN_OUTCOMES_FOR_ARCHIVAL: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_similarity_is_one_for_identical_sets() {
        let pattern = LearnedPattern::new("retry_backoff", vec!["timeout".into(), "retry".into()], "exponential backoff");
        let words: HashSet<String> = ["timeout".to_string(), "retry".to_string()].into_iter().collect();
        assert!((pattern.jaccard_similarity(&words) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn jaccard_similarity_is_zero_for_disjoint_sets() {
        let pattern = LearnedPattern::new("retry_backoff", vec!["timeout".into()], "exponential backoff");
        let words: HashSet<String> = ["unrelated".to_string()].into_iter().collect();
        assert_eq!(pattern.jaccard_similarity(&words), 0.0);
    }

    #[test]
    fn recent_outcomes_dominate_decayed_effectiveness() {
        let mostly_failing_then_one_success =
            vec![OutcomeResult::Failure, OutcomeResult::Failure, OutcomeResult::Failure, OutcomeResult::Success];
        let score = decayed_effectiveness(&mostly_failing_then_one_success, 2.0);
        assert!(score > 0.5, "most recent success should dominate: {score}");
    }

    #[test]
    fn empty_outcomes_default_to_neutral_effectiveness() {
        assert_eq!(decayed_effectiveness(&[], 2.0), 0.5);
    }

    #[test]
    fn is_match_requires_both_similarity_and_effectiveness_gates() {
        let mut pattern = LearnedPattern::new("retry_backoff", vec!["timeout".into(), "retry".into()], "exponential backoff");
        let words: HashSet<String> = ["timeout".to_string(), "retry".to_string()].into_iter().collect();
        assert!(pattern.is_match("retry_backoff", &words));

        pattern.effectiveness = OrderedFloat(0.4);
        assert!(!pattern.is_match("retry_backoff", &words));
    }

    #[test]
    fn pattern_hash_is_stable_for_the_same_canonical_sequence() {
        let a = compute_pattern_hash("retry_backoff", "deploy", &["timeout".to_string(), "retry".to_string()]);
        let b = compute_pattern_hash("retry_backoff", "deploy", &["timeout".to_string(), "retry".to_string()]);
        assert_eq!(a, b);
        let c = compute_pattern_hash("retry_backoff", "deploy", &["other".to_string()]);
        assert_ne!(a, c);
    }
}
