//! In-process tier store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::warn;

use crate::cache::{CacheEntry, CacheTier, CacheTierStore};
use crate::errors::Result;

/// `HashMap`-backed tier. Contents vanish with the process.
pub struct MemoryTierStore {
    tier: CacheTier,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryTierStore {
    pub fn new(tier: CacheTier) -> Self {
        Self {
            tier,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Memory cache tier mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }
}

impl CacheTierStore for MemoryTierStore {
    fn tier(&self) -> CacheTier {
        self.tier
    }

    fn read(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.lock_entries().get(key).cloned())
    }

    fn write(&self, entry: CacheEntry) -> Result<()> {
        self.lock_entries().insert(entry.key.clone(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.lock_entries().remove(key).is_some())
    }

    fn purge_stale(&self, now: DateTime<Utc>, window: Duration) -> Result<usize> {
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_stale_at(now, window));
        Ok(before - entries.len())
    }
}
