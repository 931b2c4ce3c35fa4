//! Diagnostics sink trait and implementations.

use std::sync::{Arc, Mutex};

use log::{info, warn};

use super::{DetectionOutcome, EngineEvent, RecoveryStepOutcome};

/// Receives engine events.
///
/// `emit()` is called inline on the detection path, so implementations must
/// be fast and must not fail the caller.
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, event: EngineEvent);

    fn emit_batch(&self, events: Vec<EngineEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Renders each event as one log line.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDiagnosticsSink;

impl DiagnosticsSink for LogDiagnosticsSink {
    fn emit(&self, event: EngineEvent) {
        match &event {
            EngineEvent::Detection {
                correlation_id,
                spreadsheet_id,
                method,
                outcome,
                duration_ms,
                confidence,
            } => {
                let line = format!(
                    "[{}] detection {:?} for '{}' -> {:?} in {}ms (confidence {:?})",
                    correlation_id, method, spreadsheet_id, outcome, duration_ms, confidence
                );
                if *outcome == DetectionOutcome::Failed {
                    warn!("{}", line);
                } else {
                    info!("{}", line);
                }
            }
            EngineEvent::Cache {
                correlation_id,
                key,
                hit,
                tier,
            } => {
                info!(
                    "[{}] cache {} for '{}' ({})",
                    correlation_id,
                    if *hit { "hit" } else { "miss" },
                    key,
                    tier
                );
            }
            EngineEvent::Recovery {
                correlation_id,
                category,
                code,
                strategy,
                attempt,
                outcome,
            } => {
                let line = format!(
                    "[{}] recovery {} for {} ({}) attempt {} -> {:?}",
                    correlation_id, strategy, category, code, attempt, outcome
                );
                match outcome {
                    RecoveryStepOutcome::Failed | RecoveryStepOutcome::MaxRetriesExceeded => {
                        warn!("{}", line)
                    }
                    _ => info!("{}", line),
                }
            }
        }
    }
}

/// Discards events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpDiagnosticsSink;

impl DiagnosticsSink for NoOpDiagnosticsSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Collects emitted events, for tests.
#[derive(Clone, Default)]
pub struct MockDiagnosticsSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl MockDiagnosticsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticsSink for MockDiagnosticsSink {
    fn emit(&self, event: EngineEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheTier;
    use crate::diagnostics::CorrelationId;

    fn cache_event(hit: bool) -> EngineEvent {
        EngineEvent::Cache {
            correlation_id: CorrelationId::new(),
            key: "k".to_string(),
            hit,
            tier: CacheTier::Ephemeral,
        }
    }

    #[test]
    fn test_noop_and_log_sinks_do_not_panic() {
        NoOpDiagnosticsSink.emit(cache_event(true));
        LogDiagnosticsSink.emit_batch(vec![cache_event(true), cache_event(false)]);
    }

    #[test]
    fn test_mock_sink_collects_events() {
        let sink = MockDiagnosticsSink::new();
        assert!(sink.is_empty());

        sink.emit(cache_event(true));
        sink.emit_batch(vec![cache_event(false), cache_event(true)]);
        assert_eq!(sink.len(), 3);

        sink.clear();
        assert!(sink.is_empty());
    }
}
