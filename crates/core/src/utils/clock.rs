//! Time source abstraction.
//!
//! TTL checks, fallback windows and the rolling error window all read time
//! through [`Clock`] so tests can move time explicitly.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::warn;

use crate::constants::MAX_TTL_SECS;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.current.lock().unwrap_or_else(|poisoned| {
            warn!("Manual clock mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut current = self.lock();
        *current += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

/// Converts a std duration to whole chrono seconds, clamped to [`MAX_TTL_SECS`].
pub fn to_chrono_seconds(duration: std::time::Duration) -> Duration {
    let secs = i64::try_from(duration.as_secs()).unwrap_or(MAX_TTL_SECS);
    Duration::seconds(secs.min(MAX_TTL_SECS))
}
