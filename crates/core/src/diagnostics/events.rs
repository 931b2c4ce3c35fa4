//! Structured engine events.

use serde::{Deserialize, Serialize};

use crate::cache::CacheTier;
use crate::detection::DetectionSource;
use crate::diagnostics::CorrelationId;
use crate::recovery::{ClassifiedError, ErrorCategory, RecoveryStrategy};

/// How one detection step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionOutcome {
    /// The step produced an identity.
    Resolved,
    /// The step ran and found nothing.
    NoMatch,
    /// The step failed and recovery did not produce an identity.
    Failed,
}

/// How one recovery strategy ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStepOutcome {
    Succeeded,
    Failed,
    NotApplicable,
    MaxRetriesExceeded,
    Skipped,
    Pending,
}

/// Event emitted to a [`crate::diagnostics::DiagnosticsSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineEvent {
    #[serde(rename_all = "camelCase")]
    Detection {
        correlation_id: CorrelationId,
        spreadsheet_id: String,
        method: DetectionSource,
        outcome: DetectionOutcome,
        duration_ms: u64,
        confidence: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    Cache {
        correlation_id: CorrelationId,
        key: String,
        hit: bool,
        tier: CacheTier,
    },
    #[serde(rename_all = "camelCase")]
    Recovery {
        correlation_id: CorrelationId,
        category: ErrorCategory,
        code: String,
        strategy: RecoveryStrategy,
        attempt: u32,
        outcome: RecoveryStepOutcome,
    },
}

impl EngineEvent {
    pub fn recovery(
        classified: &ClassifiedError,
        strategy: RecoveryStrategy,
        attempt: u32,
        outcome: RecoveryStepOutcome,
    ) -> Self {
        EngineEvent::Recovery {
            correlation_id: classified.correlation_id.clone(),
            category: classified.category,
            code: classified.code.clone(),
            strategy,
            attempt,
            outcome,
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        match self {
            EngineEvent::Detection { correlation_id, .. }
            | EngineEvent::Cache { correlation_id, .. }
            | EngineEvent::Recovery { correlation_id, .. } => correlation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = EngineEvent::Cache {
            correlation_id: CorrelationId::from("c-1"),
            key: "detection:sheet-1".to_string(),
            hit: true,
            tier: CacheTier::Ephemeral,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CACHE");
        assert_eq!(json["correlationId"], "c-1");
        assert_eq!(json["tier"], "EPHEMERAL");
    }
}
