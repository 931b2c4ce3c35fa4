//! Database model for cache entries.

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;

use prodsync_core::cache::{CacheEntry, CacheTier};
use prodsync_core::errors::{Error, Result};

/// One row of `cache_entries`. The value is stored as JSON text.
#[derive(Queryable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::cache_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CacheEntryDB {
    pub tier: String,
    pub cache_key: String,
    pub value_json: String,
    pub written_at: NaiveDateTime,
    pub ttl_seconds: i64,
}

impl CacheEntryDB {
    /// Row for `entry` stored under `tier`, whatever tier the entry came from.
    pub fn from_entry(entry: &CacheEntry, tier: CacheTier) -> Result<Self> {
        Ok(Self {
            tier: tier.as_str().to_string(),
            cache_key: entry.key.clone(),
            value_json: serde_json::to_string(&entry.value)?,
            written_at: entry.written_at.naive_utc(),
            ttl_seconds: entry.ttl_seconds,
        })
    }
}

impl TryFrom<CacheEntryDB> for CacheEntry {
    type Error = Error;

    fn try_from(db: CacheEntryDB) -> Result<Self> {
        let tier = CacheTier::parse(&db.tier)
            .ok_or_else(|| Error::Cache(format!("unknown cache tier '{}'", db.tier)))?;
        Ok(Self {
            key: db.cache_key,
            value: serde_json::from_str(&db.value_json)?,
            written_at: DateTime::<Utc>::from_naive_utc_and_offset(db.written_at, Utc),
            ttl_seconds: db.ttl_seconds,
            tier,
        })
    }
}
