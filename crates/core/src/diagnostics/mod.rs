//! Diagnostics: correlation ids, structured events, event sinks, rolling
//! error counts and health snapshots.

mod correlation;
mod error_stats;
mod events;
mod health;
mod sink;

pub use correlation::CorrelationId;
pub use error_stats::{ErrorCount, ErrorStats};
pub use events::{DetectionOutcome, EngineEvent, RecoveryStepOutcome};
pub use health::{CapabilityStatus, EngineHealth};
pub use sink::{DiagnosticsSink, LogDiagnosticsSink, MockDiagnosticsSink, NoOpDiagnosticsSink};
