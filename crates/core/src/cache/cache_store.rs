//! Tier-aware cache manager.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheEntry, CacheStats, CacheTier, CacheTierStore, MemoryTierStore};
use crate::errors::{Error, Result};
use crate::utils::{to_chrono_seconds, Clock, SystemClock};

/// Get/set/remove across named tiers with read fallback and promotion.
///
/// A `get` checks the preferred tier first, then the remaining tiers in
/// `fallback_order`. A hit found in a fallback tier is copied into the
/// preferred tier (keeping its original expiry) before it is returned.
/// `set` writes only the tier it is given.
///
/// The read-promote path and writes share one lock, so concurrent callers
/// never observe a half-promoted entry.
pub struct CacheStore {
    tiers: HashMap<CacheTier, Arc<dyn CacheTierStore>>,
    fallback_order: Vec<CacheTier>,
    clock: Arc<dyn Clock>,
    guard: Mutex<()>,
    stats: Mutex<CacheStats>,
}

impl CacheStore {
    /// Builds a store from tier backends and an explicit read order.
    ///
    /// Every backend must appear in `fallback_order` exactly once.
    pub fn new(
        stores: Vec<Arc<dyn CacheTierStore>>,
        fallback_order: Vec<CacheTier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if fallback_order.is_empty() {
            return Err(Error::InvalidConfigValue(
                "cache fallback order must list at least one tier".to_string(),
            ));
        }

        let mut tiers: HashMap<CacheTier, Arc<dyn CacheTierStore>> = HashMap::new();
        for store in stores {
            let tier = store.tier();
            if tiers.insert(tier, store).is_some() {
                return Err(Error::InvalidConfigValue(format!(
                    "cache tier {} configured twice",
                    tier
                )));
            }
        }

        for (index, tier) in fallback_order.iter().enumerate() {
            if fallback_order[..index].contains(tier) {
                return Err(Error::InvalidConfigValue(format!(
                    "cache tier {} repeated in fallback order",
                    tier
                )));
            }
            if !tiers.contains_key(tier) {
                return Err(Error::InvalidConfigValue(format!(
                    "cache tier {} has no backing store",
                    tier
                )));
            }
        }

        if let Some(orphan) = tiers.keys().find(|tier| !fallback_order.contains(tier)) {
            return Err(Error::InvalidConfigValue(format!(
                "cache tier {} missing from fallback order",
                orphan
            )));
        }

        Ok(Self {
            tiers,
            fallback_order,
            clock,
            guard: Mutex::new(()),
            stats: Mutex::new(CacheStats::default()),
        })
    }

    /// All three tiers in memory, default order, wall-clock time.
    pub fn in_memory() -> Self {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Self {
        let tiers: HashMap<CacheTier, Arc<dyn CacheTierStore>> = CacheTier::DEFAULT_ORDER
            .iter()
            .map(|tier| {
                let store: Arc<dyn CacheTierStore> = Arc::new(MemoryTierStore::new(*tier));
                (*tier, store)
            })
            .collect();

        Self {
            tiers,
            fallback_order: CacheTier::DEFAULT_ORDER.to_vec(),
            clock,
            guard: Mutex::new(()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn fallback_order(&self) -> &[CacheTier] {
        &self.fallback_order
    }

    pub fn has_tier(&self, tier: CacheTier) -> bool {
        self.tiers.contains_key(&tier)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn lock_guard(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(|poisoned| {
            warn!("Cache store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_stats(&self) -> MutexGuard<'_, CacheStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_order(&self, preferred: CacheTier) -> impl Iterator<Item = CacheTier> + '_ {
        std::iter::once(preferred).chain(
            self.fallback_order
                .iter()
                .copied()
                .filter(move |tier| *tier != preferred),
        )
    }

    /// Reads a live entry, falling back across tiers and promoting on a fallback hit.
    ///
    /// Expired entries and tier read failures count as misses.
    pub fn get_entry(&self, key: &str, preferred: CacheTier) -> Option<CacheEntry> {
        let _guard = self.lock_guard();
        let now = self.clock.now();

        for tier in self.read_order(preferred) {
            let Some(store) = self.tiers.get(&tier) else {
                continue;
            };

            match store.read(key) {
                Ok(Some(entry)) if !entry.is_expired_at(now) => {
                    if tier != preferred {
                        self.promote(&entry, preferred);
                    }
                    self.lock_stats().hits += 1;
                    debug!("Cache hit for '{}' in tier {}", key, tier);
                    return Some(entry);
                }
                Ok(Some(entry)) => {
                    debug!(
                        "Cache entry '{}' in tier {} expired at {}",
                        key,
                        tier,
                        entry.expires_at()
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Cache tier {} read failed for '{}': {}", tier, key, e);
                }
            }
        }

        self.lock_stats().misses += 1;
        debug!("Cache miss for '{}'", key);
        None
    }

    fn promote(&self, entry: &CacheEntry, preferred: CacheTier) {
        let Some(store) = self.tiers.get(&preferred) else {
            return;
        };
        match store.write(entry.promoted_to(preferred)) {
            Ok(()) => {
                self.lock_stats().promotions += 1;
                debug!(
                    "Promoted '{}' from tier {} into {}",
                    entry.key, entry.tier, preferred
                );
            }
            Err(e) => warn!("Failed to promote '{}' into {}: {}", entry.key, preferred, e),
        }
    }

    /// Typed read. A value that no longer deserializes is an error, not a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str, preferred: CacheTier) -> Result<Option<T>> {
        match self.get_entry(key, preferred) {
            Some(entry) => Ok(Some(serde_json::from_value(entry.value)?)),
            None => Ok(None),
        }
    }

    /// Writes `value` into `tier` only.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, tier: CacheTier, ttl: Duration) -> Result<()> {
        let store = self
            .tiers
            .get(&tier)
            .ok_or_else(|| Error::Cache(format!("cache tier {} is not configured", tier)))?;
        let value = serde_json::to_value(value)?;

        let _guard = self.lock_guard();
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            written_at: self.clock.now(),
            ttl_seconds: to_chrono_seconds(ttl).num_seconds(),
            tier,
        };
        store.write(entry)
    }

    /// Removes `key` from one tier.
    pub fn remove(&self, key: &str, tier: CacheTier) -> Result<bool> {
        let store = self
            .tiers
            .get(&tier)
            .ok_or_else(|| Error::Cache(format!("cache tier {} is not configured", tier)))?;
        let _guard = self.lock_guard();
        store.remove(key)
    }

    /// Removes `key` from every tier. Returns how many tiers held it.
    ///
    /// Every tier is attempted; the first failure is reported afterwards.
    pub fn invalidate(&self, key: &str) -> Result<usize> {
        let _guard = self.lock_guard();
        let mut removed = 0;
        let mut first_error = None;

        for tier in &self.fallback_order {
            if let Some(store) = self.tiers.get(tier) {
                match store.remove(key) {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Failed to invalidate '{}' in tier {}: {}", key, tier, e);
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Relaxed read used by recovery: newest entry across all tiers written
    /// within `window`, regardless of its TTL. Never promotes.
    pub fn get_within_window<T: DeserializeOwned>(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<Option<T>> {
        let _guard = self.lock_guard();
        let now = self.clock.now();
        let window = to_chrono_seconds(window);

        let newest = self
            .fallback_order
            .iter()
            .filter_map(|tier| self.tiers.get(tier))
            .filter_map(|store| match store.read(key) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Fallback read of '{}' failed in tier {}: {}", key, store.tier(), e);
                    None
                }
            })
            .filter(|entry| entry.is_within_window(now, window))
            .max_by_key(|entry| entry.written_at);

        match newest {
            Some(entry) => {
                self.lock_stats().fallback_reads += 1;
                debug!(
                    "Fallback read of '{}' served from tier {} (written {})",
                    key, entry.tier, entry.written_at
                );
                Ok(Some(serde_json::from_value(entry.value)?))
            }
            None => Ok(None),
        }
    }

    /// Optional sweep: deletes entries past their TTL from every tier.
    ///
    /// Entries written within `window` are kept even when expired, since a
    /// fallback read may still serve them.
    pub fn purge_expired(&self, window: Duration) -> Result<usize> {
        let _guard = self.lock_guard();
        let now = self.clock.now();
        let window = to_chrono_seconds(window);
        let mut purged = 0;
        for tier in &self.fallback_order {
            if let Some(store) = self.tiers.get(tier) {
                purged += store.purge_stale(now, window)?;
            }
        }
        debug!("Purged {} expired cache entries", purged);
        Ok(purged)
    }

    pub fn stats(&self) -> CacheStats {
        *self.lock_stats()
    }
}
