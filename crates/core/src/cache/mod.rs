//! Multi-tier cache.
//!
//! Tiers are named storage layers with independent persistence:
//! - **Ephemeral**: in-process memory, lost on restart.
//! - **Durable**: survives restarts (SQLite in the storage crate).
//! - **Backup**: last-resort copy with a long lifetime.
//!
//! Reads fall back across tiers in an explicit order and promote hits into the
//! preferred tier. Expiry is lazy: an expired entry reads as a miss but stays
//! stored so relaxed fallback reads can still use it.

mod cache_model;
mod cache_store;
mod cache_traits;
mod memory;

pub use cache_model::{CacheEntry, CacheStats, CacheTier};
pub use cache_store::CacheStore;
pub use cache_traits::CacheTierStore;
pub use memory::MemoryTierStore;
