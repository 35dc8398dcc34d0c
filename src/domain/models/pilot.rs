//! Pilot registry entities (`spec.md` §3, §4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::PilotId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PilotStatus {
    Idle,
    Busy,
    Offline,
    Error,
}

/// A named skill with trigger words used in scheduling (`spec.md` GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub trigger_words: Vec<String>,
}

impl Capability {
    pub fn new(name: impl Into<String>, trigger_words: Vec<String>) -> Self {
        Self { name: name.into(), trigger_words }
    }

    pub fn overlap_count(&self, words: &std::collections::HashSet<String>) -> usize {
        self.trigger_words
            .iter()
            .filter(|w| words.contains(w.to_lowercase().as_str()))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PilotHealth {
    pub heartbeat_ok: bool,
    pub memory_ok: bool,
    pub cpu_ok: bool,
    pub communication_ok: bool,
    pub task_processing_ok: bool,
}

impl Default for PilotHealth {
    fn default() -> Self {
        Self {
            heartbeat_ok: true,
            memory_ok: true,
            cpu_ok: true,
            communication_ok: true,
            task_processing_ok: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Offline,
}

impl PilotHealth {
    /// Aggregate per `spec.md` §4.5: healthy if all true, degraded if one
    /// false, unhealthy if two or more false. `offline` is decided by the
    /// caller from the heartbeat timeout, not from this struct alone.
    pub fn aggregate(&self) -> HealthStatus {
        let failures = [
            self.heartbeat_ok,
            self.memory_ok,
            self.cpu_ok,
            self.communication_ok,
            self.task_processing_ok,
        ]
        .iter()
        .filter(|ok| !**ok)
        .count();

        match failures {
            0 => HealthStatus::Healthy,
            1 => HealthStatus::Degraded,
            _ => HealthStatus::Unhealthy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pilot {
    pub pilot_id: PilotId,
    pub callsign: String,
    pub agent_type: String,
    pub status: PilotStatus,
    pub capabilities: Vec<Capability>,
    pub current_workload: u32,
    pub max_workload: u32,
    pub last_heartbeat: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub health: PilotHealth,
}

impl Pilot {
    pub fn new(callsign: impl Into<String>, agent_type: impl Into<String>, max_workload: u32) -> Self {
        let now = Utc::now();
        Self {
            pilot_id: PilotId::new(),
            callsign: callsign.into(),
            agent_type: agent_type.into(),
            status: PilotStatus::Idle,
            capabilities: Vec::new(),
            current_workload: 0,
            max_workload,
            last_heartbeat: now,
            created_at: now,
            health: PilotHealth::default(),
        }
    }

    pub fn has_free_capacity(&self) -> bool {
        self.current_workload < self.max_workload
    }

    pub fn workload_ratio(&self) -> f64 {
        if self.max_workload == 0 {
            1.0
        } else {
            f64::from(self.current_workload) / f64::from(self.max_workload)
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - self.last_heartbeat > timeout
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Utc::now();
        if self.status == PilotStatus::Offline {
            self.status = PilotStatus::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_exhausted_at_max_workload() {
        let mut pilot = Pilot::new("viper-1", "backend", 2);
        pilot.current_workload = 2;
        assert!(!pilot.has_free_capacity());
    }

    #[test]
    fn health_aggregates_to_degraded_on_single_failure() {
        let mut health = PilotHealth::default();
        health.cpu_ok = false;
        assert_eq!(health.aggregate(), HealthStatus::Degraded);
    }

    #[test]
    fn health_aggregates_to_unhealthy_on_two_failures() {
        let mut health = PilotHealth::default();
        health.cpu_ok = false;
        health.memory_ok = false;
        assert_eq!(health.aggregate(), HealthStatus::Unhealthy);
    }

    #[test]
    fn stale_heartbeat_detected_after_timeout() {
        let mut pilot = Pilot::new("bravo", "backend", 1);
        pilot.last_heartbeat = Utc::now() - chrono::Duration::minutes(10);
        assert!(pilot.is_stale(Utc::now(), chrono::Duration::minutes(3)));
    }
}
