//! Engine health snapshot and capability report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::diagnostics::ErrorCount;
use crate::recovery::Severity;

/// Point-in-time view of the engine for dashboards and self-checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineHealth {
    /// Highest severity seen in the error window, `Info` when quiet.
    pub overall_severity: Severity,
    pub error_counts: Vec<ErrorCount>,
    pub total_errors: u64,
    pub cache: CacheStats,
    pub pending_interventions: usize,
    pub checked_at: DateTime<Utc>,
}

impl EngineHealth {
    pub fn is_healthy(&self) -> bool {
        self.overall_severity <= Severity::Warning && self.pending_interventions == 0
    }
}

/// Whether a collaborator the engine can use was supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatus {
    pub capability: String,
    pub required: bool,
    pub present: bool,
}

impl CapabilityStatus {
    pub fn new(capability: impl Into<String>, required: bool, present: bool) -> Self {
        Self {
            capability: capability.into(),
            required,
            present,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.present || !self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_thresholds() {
        let mut health = EngineHealth {
            overall_severity: Severity::Warning,
            error_counts: vec![],
            total_errors: 1,
            cache: CacheStats::default(),
            pending_interventions: 0,
            checked_at: Utc::now(),
        };
        assert!(health.is_healthy());

        health.pending_interventions = 1;
        assert!(!health.is_healthy());

        health.pending_interventions = 0;
        health.overall_severity = Severity::Error;
        assert!(!health.is_healthy());
    }

    #[test]
    fn test_optional_capability_is_satisfied_when_absent() {
        assert!(CapabilityStatus::new("interactive prompt", false, false).is_satisfied());
        assert!(!CapabilityStatus::new("provider discovery", true, false).is_satisfied());
    }
}
