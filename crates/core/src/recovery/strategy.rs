//! Retry backoff policy.

use std::time::Duration;

use crate::recovery::ErrorCategory;
use crate::settings::{MaxRetriesSettings, RecoverySettings};

/// Exponential backoff with a per-category attempt ceiling.
///
/// `delay(attempt) = min(initial_delay * multiplier^attempt, max_delay)`,
/// where `attempt` counts previous retries of the same (category, code).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_retries: MaxRetriesSettings,
}

impl RetryPolicy {
    pub fn from_settings(settings: &RecoverySettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            multiplier: settings.multiplier,
            max_delay: Duration::from_millis(settings.max_delay_ms),
            max_retries: settings.max_retries.clone(),
        }
    }

    /// Policy with no sleeping, for tests and replays.
    pub fn immediate(max_retries: MaxRetriesSettings) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            max_retries,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let max_millis = self.max_delay.as_millis() as f64;

        if !millis.is_finite() || millis >= max_millis {
            self.max_delay
        } else {
            Duration::from_millis(millis.max(0.0) as u64)
        }
    }

    pub fn max_attempts(&self, category: ErrorCategory) -> u32 {
        self.max_retries.for_category(category)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RecoverySettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays_double_until_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8_000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_default_ceilings() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(ErrorCategory::DatabaseConnection), 3);
        assert_eq!(policy.max_attempts(ErrorCategory::NetworkConnectivity), 3);
        assert_eq!(policy.max_attempts(ErrorCategory::SpreadsheetAccess), 2);
        assert_eq!(policy.max_attempts(ErrorCategory::ApiResponse), 2);
        assert_eq!(policy.max_attempts(ErrorCategory::Authentication), 0);
        assert_eq!(policy.max_attempts(ErrorCategory::Configuration), 0);
    }

    #[test]
    fn test_immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate(MaxRetriesSettings::default());
        for attempt in 0..10 {
            assert_eq!(policy.delay_for(attempt), Duration::ZERO);
        }
    }
}
