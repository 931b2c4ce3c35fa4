//! Operator interaction: the prompt collaborator and the queue of failures
//! waiting for operator input.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::diagnostics::CorrelationId;
use crate::errors::Result;
use crate::recovery::ClassifiedError;
use crate::utils::Clock;

/// Question shown to the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    pub title: String,
    pub message: String,
    pub suggestions: Vec<String>,
    pub correlation_id: CorrelationId,
}

/// Operator's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum PromptResponse {
    Answer(String),
    Cancelled,
}

impl PromptResponse {
    /// The trimmed answer, if one was given and is not blank.
    pub fn answer(&self) -> Option<&str> {
        match self {
            PromptResponse::Answer(text) if !text.trim().is_empty() => Some(text.trim()),
            _ => None,
        }
    }
}

/// Synchronous prompt surface supplied by the host.
pub trait InteractivePrompt: Send + Sync {
    fn ask(&self, request: &PromptRequest) -> Result<PromptResponse>;
}

/// A failure waiting for operator input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingIntervention {
    pub ticket: u64,
    pub error: ClassifiedError,
    pub queued_at: DateTime<Utc>,
    /// How many times this failure was raised while waiting.
    pub occurrences: u32,
}

impl PendingIntervention {
    fn same_failure(&self, error: &ClassifiedError) -> bool {
        self.error.category == error.category
            && self.error.code == error.code
            && self.error.operation == error.operation
    }

    pub fn to_prompt(&self) -> PromptRequest {
        PromptRequest {
            title: self.error.user_message().to_string(),
            message: format!(
                "{} during '{}' ({})",
                self.error.message, self.error.operation, self.error.code
            ),
            suggestions: vec![self.error.suggested_action().to_string()],
            correlation_id: self.error.correlation_id.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    next_ticket: u64,
    pending: Vec<PendingIntervention>,
}

/// In-process queue of pending interventions. Entries do not survive restarts.
///
/// One ticket is kept per (category, code, operation). A repeat of a queued
/// failure replaces the stored error instead of adding a ticket.
pub struct InterventionQueue {
    state: Mutex<QueueState>,
    clock: Arc<dyn Clock>,
}

impl InterventionQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                next_ticket: 1,
                pending: Vec::new(),
            }),
            clock,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Intervention queue mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Queues `error` and returns its ticket number.
    pub fn enqueue(&self, error: ClassifiedError) -> u64 {
        let mut state = self.lock_state();
        if let Some(existing) = state.pending.iter_mut().find(|p| p.same_failure(&error)) {
            existing.occurrences += 1;
            debug!(
                "[{}] {} ({}) already queued as ticket {} ({} occurrences)",
                error.correlation_id,
                error.category,
                error.code,
                existing.ticket,
                existing.occurrences
            );
            existing.error = error;
            return existing.ticket;
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        info!(
            "[{}] Queued {} ({}) for operator input as ticket {}",
            error.correlation_id, error.category, error.code, ticket
        );
        state.pending.push(PendingIntervention {
            ticket,
            error,
            queued_at: self.clock.now(),
            occurrences: 1,
        });
        ticket
    }

    pub fn pending(&self) -> Vec<PendingIntervention> {
        self.lock_state().pending.clone()
    }

    pub fn len(&self) -> usize {
        self.lock_state().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().pending.is_empty()
    }

    /// Removes a ticket once the operator has dealt with it.
    pub fn resolve(&self, ticket: u64) -> Option<PendingIntervention> {
        let mut state = self.lock_state();
        let index = state.pending.iter().position(|p| p.ticket == ticket)?;
        Some(state.pending.remove(index))
    }

    /// Asks the operator about every pending ticket, oldest first, and
    /// removes the ones that got a response.
    ///
    /// A prompt failure leaves that ticket queued.
    pub fn drain_with(
        &self,
        prompt: &dyn InteractivePrompt,
    ) -> Vec<(PendingIntervention, PromptResponse)> {
        let pending = self.pending();
        let mut answered = Vec::with_capacity(pending.len());

        for intervention in pending {
            match prompt.ask(&intervention.to_prompt()) {
                Ok(response) => {
                    if let Some(resolved) = self.resolve(intervention.ticket) {
                        answered.push((resolved, response));
                    }
                }
                Err(e) => warn!(
                    "[{}] Prompt failed for ticket {}: {}",
                    intervention.error.correlation_id, intervention.ticket, e
                ),
            }
        }

        answered
    }
}
