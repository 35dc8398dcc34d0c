//! File reservation entities (`spec.md` §3, §4.4).
//!
//! Reservations arbitrate concurrent pilot access to file paths. Path
//! matching supports a literal path or a single trailing `/**` wildcard
//! (see DESIGN.md Open Question decisions).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::ReservationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Released,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub path_pattern: String,
    pub holder: String,
    pub exclusive: bool,
    pub status: ReservationStatus,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(path_pattern: impl Into<String>, holder: impl Into<String>, exclusive: bool, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: ReservationId::new(),
            path_pattern: path_pattern.into(),
            holder: holder.into(),
            exclusive,
            status: ReservationStatus::Active,
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && now >= self.expires_at
    }

    pub fn release(&mut self) {
        self.status = ReservationStatus::Released;
    }

    pub fn expire(&mut self) {
        self.status = ReservationStatus::Expired;
    }

    /// Whether `self`'s pattern conflicts with `path`, i.e. both reservations
    /// would hold exclusive (or one exclusive) access over an overlapping
    /// path. A pattern ending in `/**` matches any path sharing its prefix
    /// segment; otherwise the match is literal.
    pub fn matches(&self, path: &str) -> bool {
        path_pattern_matches(&self.path_pattern, path)
    }

    /// Whether two reservation patterns overlap at all (used for conflict
    /// detection between two pending/active reservations rather than a
    /// single concrete path).
    pub fn overlaps(&self, other: &Reservation) -> bool {
        patterns_overlap(&self.path_pattern, &other.path_pattern)
    }
}

pub fn path_pattern_matches(pattern: &str, path: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("/**") {
        path == prefix || path.starts_with(&format!("{prefix}/"))
    } else {
        pattern == path
    }
}

fn patterns_overlap(a: &str, b: &str) -> bool {
    match (a.strip_suffix("/**"), b.strip_suffix("/**")) {
        (Some(pa), Some(pb)) => pa == pb || pa.starts_with(&format!("{pb}/")) || pb.starts_with(&format!("{pa}/")),
        (Some(pa), None) => path_pattern_matches(&format!("{pa}/**"), b),
        (None, Some(pb)) => path_pattern_matches(&format!("{pb}/**"), a),
        (None, None) => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches_only_exact_path() {
        assert!(path_pattern_matches("src/main.rs", "src/main.rs"));
        assert!(!path_pattern_matches("src/main.rs", "src/lib.rs"));
    }

    #[test]
    fn wildcard_pattern_matches_prefix_and_descendants() {
        assert!(path_pattern_matches("src/services/**", "src/services/mod.rs"));
        assert!(path_pattern_matches("src/services/**", "src/services"));
        assert!(!path_pattern_matches("src/services/**", "src/domain/mod.rs"));
    }

    #[test]
    fn reservation_expires_after_ttl() {
        let res = Reservation::new("src/**", "pilot-1", true, chrono::Duration::seconds(-1));
        assert!(res.is_expired(Utc::now()));
    }

    #[test]
    fn overlapping_wildcard_reservations_conflict() {
        let a = Reservation::new("src/services/**", "pilot-1", true, chrono::Duration::minutes(5));
        let b = Reservation::new("src/services/event_log.rs", "pilot-2", true, chrono::Duration::minutes(5));
        assert!(a.overlaps(&b));
    }
}
