//! Runs a classified error's recovery plan.
//!
//! Strategies run in plan order and the first one that produces a value
//! wins. Retry counters are keyed by (category, code) and live in memory for
//! the lifetime of the executor. Each counter remembers the operations that
//! advanced it, and the first success of any of them clears it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};

use crate::diagnostics::{DiagnosticsSink, EngineEvent, ErrorStats, RecoveryStepOutcome};
use crate::errors::{DetectionError, Error, Result};
use crate::recovery::{
    classify, ClassifiedError, ErrorCategory, ErrorContext, InterventionQueue, RecoveryStrategy,
    RetryPolicy,
};

type RetryFn<'a, T> = Box<dyn FnMut() -> Result<T> + 'a>;
type CacheFallbackFn<'a, T> = Box<dyn Fn(Duration) -> Result<Option<T>> + 'a>;
type StaticFallbackFn<'a, T> = Box<dyn Fn() -> Option<T> + 'a>;

/// The concrete actions a caller offers for each strategy.
///
/// A strategy with no matching action is not applicable and is passed over.
pub struct RecoveryActions<'a, T> {
    retry: Option<RetryFn<'a, T>>,
    cache_fallback: Option<CacheFallbackFn<'a, T>>,
    static_fallback: Option<StaticFallbackFn<'a, T>>,
    skippable: bool,
}

impl<'a, T> Default for RecoveryActions<'a, T> {
    fn default() -> Self {
        Self {
            retry: None,
            cache_fallback: None,
            static_fallback: None,
            skippable: false,
        }
    }
}

impl<'a, T> RecoveryActions<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operation re-run by `Retry`.
    pub fn with_retry(mut self, op: impl FnMut() -> Result<T> + 'a) -> Self {
        self.retry = Some(Box::new(op));
        self
    }

    /// Lookup used by `CacheFallback`. Receives the fallback window.
    pub fn with_cache_fallback(
        mut self,
        lookup: impl Fn(Duration) -> Result<Option<T>> + 'a,
    ) -> Self {
        self.cache_fallback = Some(Box::new(lookup));
        self
    }

    pub fn with_static_fallback(mut self, lookup: impl Fn() -> Option<T> + 'a) -> Self {
        self.static_fallback = Some(Box::new(lookup));
        self
    }

    pub fn skippable(mut self, skippable: bool) -> Self {
        self.skippable = skippable;
        self
    }
}

/// Final result of running a recovery plan.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome<T> {
    Recovered {
        value: T,
        strategy: RecoveryStrategy,
    },
    /// The step was skippable and was skipped.
    Skipped,
    /// Queued for operator input under this ticket.
    Pending(u64),
    /// Retries hit their ceiling and no later strategy produced a value.
    MaxRetriesExceeded { attempts: u32 },
    /// Every strategy was tried or inapplicable.
    Exhausted,
}

impl<T> RecoveryOutcome<T> {
    pub fn is_recovered(&self) -> bool {
        matches!(self, RecoveryOutcome::Recovered { .. })
    }
}

type RetryKey = (ErrorCategory, String);

#[derive(Debug, Default)]
struct RetryCounters {
    attempts: HashMap<RetryKey, u32>,
    /// Operation name -> counters it has advanced.
    advanced_by: HashMap<String, HashSet<RetryKey>>,
}

impl RetryCounters {
    fn get(&self, key: &RetryKey) -> u32 {
        self.attempts.get(key).copied().unwrap_or(0)
    }

    fn advance(&mut self, key: &RetryKey, operation: &str) {
        *self.attempts.entry(key.clone()).or_insert(0) += 1;
        self.advanced_by
            .entry(operation.to_string())
            .or_default()
            .insert(key.clone());
    }

    /// Drops `keys` from the counters and from every operation's record.
    fn clear(&mut self, keys: &HashSet<RetryKey>) -> usize {
        let cleared = keys
            .iter()
            .filter(|key| self.attempts.remove(*key).is_some())
            .count();
        self.advanced_by.retain(|_, advanced| {
            advanced.retain(|key| !keys.contains(key));
            !advanced.is_empty()
        });
        cleared
    }
}

pub struct RecoveryExecutor {
    policy: RetryPolicy,
    fallback_window: Duration,
    counters: Mutex<RetryCounters>,
    interventions: Arc<InterventionQueue>,
    error_stats: Arc<ErrorStats>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl RecoveryExecutor {
    pub fn new(
        policy: RetryPolicy,
        fallback_window: Duration,
        interventions: Arc<InterventionQueue>,
        error_stats: Arc<ErrorStats>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            policy,
            fallback_window,
            counters: Mutex::new(RetryCounters::default()),
            interventions,
            error_stats,
            sink,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn lock_counters(&self) -> MutexGuard<'_, RetryCounters> {
        self.counters.lock().unwrap_or_else(|poisoned| {
            warn!("Retry counter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Consecutive retries recorded for (category, code).
    pub fn retry_count(&self, category: ErrorCategory, code: &str) -> u32 {
        self.lock_counters().get(&(category, code.to_string()))
    }

    /// Clears every retry counter `operation` has advanced, whatever its
    /// category. Call after the operation succeeds without help.
    pub fn note_success(&self, operation: &str) {
        let mut counters = self.lock_counters();
        let Some(keys) = counters.advanced_by.get(operation).cloned() else {
            return;
        };
        let cleared = counters.clear(&keys);
        if cleared > 0 {
            debug!(
                "Cleared {} retry counter(s) after '{}' succeeded",
                cleared, operation
            );
        }
    }

    /// Clears every retry counter of `category`.
    pub fn reset_category(&self, category: ErrorCategory) {
        let mut counters = self.lock_counters();
        let keys: HashSet<RetryKey> = counters
            .attempts
            .keys()
            .filter(|(c, _)| *c == category)
            .cloned()
            .collect();
        if counters.clear(&keys) > 0 {
            debug!("Cleared retry counters for {}", category);
        }
    }

    /// Runs `classified.recovery_plan` in order until a strategy produces a value.
    pub fn recover<T>(
        &self,
        classified: &ClassifiedError,
        mut actions: RecoveryActions<'_, T>,
    ) -> RecoveryOutcome<T> {
        self.error_stats
            .record(classified.category, classified.severity);
        info!(
            "[{}] Recovering from {} ({}) in '{}': {}",
            classified.correlation_id,
            classified.category,
            classified.code,
            classified.operation,
            classified.message
        );

        let mut exhausted_after: Option<u32> = None;

        for strategy in &classified.recovery_plan {
            match strategy {
                RecoveryStrategy::Retry => {
                    let Some(op) = actions.retry.as_mut() else {
                        self.emit(classified, *strategy, 0, RecoveryStepOutcome::NotApplicable);
                        continue;
                    };
                    match self.retry_with_backoff(classified, op) {
                        Ok(value) => {
                            return RecoveryOutcome::Recovered {
                                value,
                                strategy: *strategy,
                            }
                        }
                        Err(attempts) => exhausted_after = Some(attempts),
                    }
                }
                RecoveryStrategy::CacheFallback => {
                    let Some(lookup) = actions.cache_fallback.as_ref() else {
                        self.emit(classified, *strategy, 0, RecoveryStepOutcome::NotApplicable);
                        continue;
                    };
                    match lookup(self.fallback_window) {
                        Ok(Some(value)) => {
                            self.emit(classified, *strategy, 0, RecoveryStepOutcome::Succeeded);
                            return RecoveryOutcome::Recovered {
                                value,
                                strategy: *strategy,
                            };
                        }
                        Ok(None) => {
                            self.emit(classified, *strategy, 0, RecoveryStepOutcome::Failed);
                        }
                        Err(e) => {
                            warn!(
                                "[{}] Cache fallback failed: {}",
                                classified.correlation_id, e
                            );
                            self.emit(classified, *strategy, 0, RecoveryStepOutcome::Failed);
                        }
                    }
                }
                RecoveryStrategy::StaticFallback => {
                    let Some(lookup) = actions.static_fallback.as_ref() else {
                        self.emit(classified, *strategy, 0, RecoveryStepOutcome::NotApplicable);
                        continue;
                    };
                    match lookup() {
                        Some(value) => {
                            self.emit(classified, *strategy, 0, RecoveryStepOutcome::Succeeded);
                            return RecoveryOutcome::Recovered {
                                value,
                                strategy: *strategy,
                            };
                        }
                        None => self.emit(classified, *strategy, 0, RecoveryStepOutcome::Failed),
                    }
                }
                RecoveryStrategy::Skip => {
                    if actions.skippable {
                        self.emit(classified, *strategy, 0, RecoveryStepOutcome::Skipped);
                        return RecoveryOutcome::Skipped;
                    }
                    self.emit(classified, *strategy, 0, RecoveryStepOutcome::NotApplicable);
                }
                RecoveryStrategy::UserIntervention => {
                    let ticket = self.interventions.enqueue(classified.clone());
                    self.emit(classified, *strategy, 0, RecoveryStepOutcome::Pending);
                    return RecoveryOutcome::Pending(ticket);
                }
            }
        }

        match exhausted_after {
            Some(attempts) => RecoveryOutcome::MaxRetriesExceeded { attempts },
            None => RecoveryOutcome::Exhausted,
        }
    }

    /// Retries `op` until it succeeds or the (category, code) ceiling is hit.
    ///
    /// Returns the number of retries spent when giving up.
    fn retry_with_backoff<T, F>(
        &self,
        classified: &ClassifiedError,
        op: &mut F,
    ) -> std::result::Result<T, u32>
    where
        F: FnMut() -> Result<T> + ?Sized,
    {
        let key = (classified.category, classified.code.clone());
        let max_attempts = self.policy.max_attempts(classified.category);

        loop {
            let attempt = self.lock_counters().get(&key);
            if attempt >= max_attempts {
                warn!(
                    "[{}] {} ({}) reached its retry ceiling of {}",
                    classified.correlation_id, classified.category, classified.code, max_attempts
                );
                self.emit(
                    classified,
                    RecoveryStrategy::Retry,
                    attempt,
                    RecoveryStepOutcome::MaxRetriesExceeded,
                );
                return Err(attempt);
            }

            let delay = self.policy.delay_for(attempt);
            if !delay.is_zero() {
                debug!(
                    "[{}] Waiting {:?} before retry {} of {}",
                    classified.correlation_id,
                    delay,
                    attempt + 1,
                    max_attempts
                );
                std::thread::sleep(delay);
            }
            self.lock_counters().advance(&key, &classified.operation);

            match op() {
                Ok(value) => {
                    self.note_success(&classified.operation);
                    self.emit(
                        classified,
                        RecoveryStrategy::Retry,
                        attempt + 1,
                        RecoveryStepOutcome::Succeeded,
                    );
                    return Ok(value);
                }
                Err(e) => {
                    debug!(
                        "[{}] Retry {} failed: {}",
                        classified.correlation_id,
                        attempt + 1,
                        e
                    );
                    self.emit(
                        classified,
                        RecoveryStrategy::Retry,
                        attempt + 1,
                        RecoveryStepOutcome::Failed,
                    );
                }
            }
        }
    }

    /// Classify-then-recover for callers with a single operation.
    ///
    /// `Ok(None)` means the step was skipped. Pending interventions surface
    /// as [`Error::InterventionPending`] and exhausted retries as
    /// [`DetectionError::MaxRetriesExceeded`]. When nothing helps the
    /// original error is returned.
    pub fn run<T>(
        &self,
        context: &ErrorContext,
        mut op: impl FnMut() -> Result<T>,
    ) -> Result<Option<T>> {
        let error = match op() {
            Ok(value) => {
                self.note_success(&context.operation);
                return Ok(Some(value));
            }
            Err(e) => e,
        };

        let classified = classify(&error, context);
        let actions = RecoveryActions::new()
            .with_retry(&mut op)
            .skippable(context.skippable);

        match self.recover(&classified, actions) {
            RecoveryOutcome::Recovered { value, .. } => Ok(Some(value)),
            RecoveryOutcome::Skipped => Ok(None),
            RecoveryOutcome::Pending(ticket) => Err(Error::InterventionPending(ticket)),
            RecoveryOutcome::MaxRetriesExceeded { attempts } => {
                Err(DetectionError::MaxRetriesExceeded {
                    category: classified.category,
                    attempts,
                    message: classified.message,
                }
                .into())
            }
            RecoveryOutcome::Exhausted => Err(error),
        }
    }

    fn emit(
        &self,
        classified: &ClassifiedError,
        strategy: RecoveryStrategy,
        attempt: u32,
        outcome: RecoveryStepOutcome,
    ) {
        self.sink
            .emit(EngineEvent::recovery(classified, strategy, attempt, outcome));
    }
}
