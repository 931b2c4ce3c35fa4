//! Rolling aggregate error counts.
//!
//! Only (timestamp, category, severity) triples are kept. Error payloads
//! are discarded once recovery completes.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::ERROR_STATS_WINDOW_HOURS;
use crate::recovery::{ErrorCategory, Severity};
use crate::utils::Clock;

/// Count of errors for one (category, severity) pair inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCount {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub count: u64,
}

#[derive(Debug, Clone, Copy)]
struct ErrorRecord {
    at: DateTime<Utc>,
    category: ErrorCategory,
    severity: Severity,
}

pub struct ErrorStats {
    window: Duration,
    clock: Arc<dyn Clock>,
    records: Mutex<VecDeque<ErrorRecord>>,
}

impl ErrorStats {
    /// Stats over the default 24 hour window.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_window(clock, Duration::hours(ERROR_STATS_WINDOW_HOURS))
    }

    pub fn with_window(clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            window,
            clock,
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// Locks the record list and drops anything older than the window.
    fn lock_pruned(&self) -> MutexGuard<'_, VecDeque<ErrorRecord>> {
        let mut records = self.records.lock().unwrap_or_else(|poisoned| {
            warn!("Error stats mutex was poisoned, recovering");
            poisoned.into_inner()
        });
        let cutoff = self.clock.now() - self.window;
        while records.front().is_some_and(|r| r.at < cutoff) {
            records.pop_front();
        }
        records
    }

    pub fn record(&self, category: ErrorCategory, severity: Severity) {
        let at = self.clock.now();
        self.lock_pruned().push_back(ErrorRecord {
            at,
            category,
            severity,
        });
    }

    /// Counts grouped by (category, severity), in category then severity order.
    pub fn counts(&self) -> Vec<ErrorCount> {
        let records = self.lock_pruned();
        let mut grouped: BTreeMap<(ErrorCategory, Severity), u64> = BTreeMap::new();
        for record in records.iter() {
            *grouped.entry((record.category, record.severity)).or_insert(0) += 1;
        }
        grouped
            .into_iter()
            .map(|((category, severity), count)| ErrorCount {
                category,
                severity,
                count,
            })
            .collect()
    }

    pub fn count_for(&self, category: ErrorCategory) -> u64 {
        self.lock_pruned()
            .iter()
            .filter(|r| r.category == category)
            .count() as u64
    }

    pub fn total(&self) -> u64 {
        self.lock_pruned().len() as u64
    }

    /// Highest severity seen inside the window.
    pub fn max_severity(&self) -> Option<Severity> {
        self.lock_pruned().iter().map(|r| r.severity).max()
    }
}
