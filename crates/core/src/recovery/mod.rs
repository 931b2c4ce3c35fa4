//! Error classification and recovery.
//!
//! Any failure raised while resolving a provider goes through [`classify`],
//! which yields a [`ClassifiedError`] carrying a fixed, category-specific
//! recovery plan. [`RecoveryExecutor`] then runs that plan against the
//! actions the caller offers.

mod classifier;
mod executor;
mod intervention;
mod recovery_model;
mod strategy;

pub use classifier::*;
pub use executor::{RecoveryActions, RecoveryExecutor, RecoveryOutcome};
pub use intervention::{
    InteractivePrompt, InterventionQueue, PendingIntervention, PromptRequest, PromptResponse,
};
pub use recovery_model::{
    ClassifiedError, Collaborator, ErrorCategory, ErrorContext, RecoveryStrategy, Severity,
};
pub use strategy::RetryPolicy;
