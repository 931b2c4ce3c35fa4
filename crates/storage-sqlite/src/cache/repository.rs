use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use log::debug;
use std::sync::Arc;

use super::model::CacheEntryDB;
use crate::db::{get_connection, DbPool};
use crate::errors::IntoCore;
use crate::schema::cache_entries;
use prodsync_core::cache::{CacheEntry, CacheTier, CacheTierStore};
use prodsync_core::errors::Result;

/// One cache tier stored in the `cache_entries` table.
///
/// Several tiers can share a database; rows are partitioned by tier name.
pub struct SqliteCacheTier {
    pool: Arc<DbPool>,
    tier: CacheTier,
}

impl SqliteCacheTier {
    pub fn new(pool: Arc<DbPool>, tier: CacheTier) -> Self {
        Self { pool, tier }
    }

    pub fn count(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        cache_entries::table
            .filter(cache_entries::tier.eq(self.tier.as_str()))
            .count()
            .get_result::<i64>(&mut conn)
            .into_core()
    }
}

impl CacheTierStore for SqliteCacheTier {
    fn tier(&self) -> CacheTier {
        self.tier
    }

    fn read(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let row = cache_entries::table
            .filter(cache_entries::tier.eq(self.tier.as_str()))
            .filter(cache_entries::cache_key.eq(key))
            .select(CacheEntryDB::as_select())
            .first::<CacheEntryDB>(&mut conn)
            .optional()
            .into_core()?;

        row.map(CacheEntry::try_from).transpose()
    }

    fn write(&self, entry: CacheEntry) -> Result<()> {
        let row = CacheEntryDB::from_entry(&entry, self.tier)?;
        let mut conn = get_connection(&self.pool)?;
        diesel::replace_into(cache_entries::table)
            .values(&row)
            .execute(&mut conn)
            .into_core()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;
        let removed = diesel::delete(
            cache_entries::table
                .filter(cache_entries::tier.eq(self.tier.as_str()))
                .filter(cache_entries::cache_key.eq(key)),
        )
        .execute(&mut conn)
        .into_core()?;
        Ok(removed > 0)
    }

    fn purge_stale(&self, now: DateTime<Utc>, window: Duration) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        // Anything written inside the window is still servable, so only
        // older rows need their TTL checked.
        let candidates = cache_entries::table
            .filter(cache_entries::tier.eq(self.tier.as_str()))
            .filter(cache_entries::written_at.lt((now - window).naive_utc()))
            .select(CacheEntryDB::as_select())
            .load::<CacheEntryDB>(&mut conn)
            .into_core()?;

        let mut stale = Vec::new();
        for row in candidates {
            let key = row.cache_key.clone();
            if CacheEntry::try_from(row)?.is_stale_at(now, window) {
                stale.push(key);
            }
        }
        if stale.is_empty() {
            return Ok(0);
        }

        let removed = diesel::delete(
            cache_entries::table
                .filter(cache_entries::tier.eq(self.tier.as_str()))
                .filter(cache_entries::cache_key.eq_any(&stale)),
        )
        .execute(&mut conn)
        .into_core()?;
        if removed > 0 {
            debug!("Purged {} entries from tier {}", removed, self.tier);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations};
    use chrono::{Duration, TimeZone};
    use prodsync_core::cache::{CacheStore, MemoryTierStore};
    use prodsync_core::utils::ManualClock;
    use tempfile::tempdir;

    fn create_test_pool() -> (Arc<DbPool>, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let pool = create_pool(&db_path.to_string_lossy()).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        (pool, temp_dir)
    }

    fn entry(key: &str, written_at: DateTime<Utc>) -> CacheEntry {
        entry_with_ttl(key, written_at, 3600)
    }

    fn entry_with_ttl(key: &str, written_at: DateTime<Utc>, ttl_seconds: i64) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            value: serde_json::json!({ "providerCode": "kamdi_irondi", "confidence": 0.9 }),
            written_at,
            ttl_seconds,
            tier: CacheTier::Durable,
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_write_read_remove() {
        let (pool, _dir) = create_test_pool();
        let tier = SqliteCacheTier::new(pool, CacheTier::Durable);

        assert!(tier.read("detection:sheet-1").unwrap().is_none());
        tier.write(entry("detection:sheet-1", start())).unwrap();

        let stored = tier.read("detection:sheet-1").unwrap().unwrap();
        assert_eq!(stored, entry("detection:sheet-1", start()));

        assert!(tier.remove("detection:sheet-1").unwrap());
        assert!(!tier.remove("detection:sheet-1").unwrap());
    }

    #[test]
    fn test_tiers_are_partitioned() {
        let (pool, _dir) = create_test_pool();
        let durable = SqliteCacheTier::new(Arc::clone(&pool), CacheTier::Durable);
        let backup = SqliteCacheTier::new(pool, CacheTier::Backup);

        durable.write(entry("k", start())).unwrap();
        assert!(backup.read("k").unwrap().is_none());

        // The row is labelled with the tier it is stored in.
        backup.write(entry("k", start())).unwrap();
        assert_eq!(backup.read("k").unwrap().unwrap().tier, CacheTier::Backup);
        assert_eq!(durable.count().unwrap(), 1);
    }

    #[test]
    fn test_purge_stale_respects_ttl() {
        let (pool, _dir) = create_test_pool();
        let tier = SqliteCacheTier::new(pool, CacheTier::Backup);
        tier.write(entry("old", start())).unwrap();
        tier.write(entry_with_ttl("backup", start(), 7 * 24 * 3600)).unwrap();
        tier.write(entry("new", start() + Duration::hours(47))).unwrap();

        let now = start() + Duration::hours(48);
        let removed = tier.purge_stale(now, Duration::hours(24)).unwrap();
        assert_eq!(removed, 1);
        assert!(tier.read("old").unwrap().is_none());
        assert!(tier.read("backup").unwrap().is_some());
        assert!(tier.read("new").unwrap().is_some());
        assert_eq!(tier.count().unwrap(), 2);
    }

    #[test]
    fn test_durable_tier_survives_restart() {
        let (pool, _dir) = create_test_pool();
        let clock = Arc::new(ManualClock::new(start()));

        let open_store = || {
            let ephemeral: Arc<dyn CacheTierStore> =
                Arc::new(MemoryTierStore::new(CacheTier::Ephemeral));
            let durable: Arc<dyn CacheTierStore> =
                Arc::new(SqliteCacheTier::new(Arc::clone(&pool), CacheTier::Durable));
            CacheStore::new(
                vec![ephemeral, durable],
                vec![CacheTier::Ephemeral, CacheTier::Durable],
                clock.clone(),
            )
            .unwrap()
        };

        let first = open_store();
        first
            .set(
                "detection:sheet-1",
                &"kamdi_irondi",
                CacheTier::Durable,
                std::time::Duration::from_secs(3600),
            )
            .unwrap();
        drop(first);

        let second = open_store();
        let value: Option<String> = second.get("detection:sheet-1", CacheTier::Ephemeral).unwrap();
        assert_eq!(value.as_deref(), Some("kamdi_irondi"));
        assert_eq!(second.stats().promotions, 1);
    }
}
