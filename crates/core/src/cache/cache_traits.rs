//! Storage contract for a single cache tier.

use chrono::{DateTime, Duration, Utc};

use crate::cache::{CacheEntry, CacheTier};
use crate::errors::Result;

/// Raw key/value storage behind one tier.
///
/// Implementations store entries verbatim; TTL and fallback logic live in
/// [`crate::cache::CacheStore`].
pub trait CacheTierStore: Send + Sync {
    /// Which tier this store backs.
    fn tier(&self) -> CacheTier;

    fn read(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Inserts or replaces the entry under `entry.key`.
    fn write(&self, entry: CacheEntry) -> Result<()>;

    /// Returns true when an entry was removed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Deletes entries that are stale at `now` (see [`CacheEntry::is_stale_at`]).
    /// Returns the number removed.
    fn purge_stale(&self, now: DateTime<Utc>, window: Duration) -> Result<usize>;
}
