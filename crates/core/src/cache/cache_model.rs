//! Cache domain models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_TTL_SECS;

/// Named cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheTier {
    Ephemeral,
    Durable,
    Backup,
}

impl CacheTier {
    /// Default read fallback order.
    pub const DEFAULT_ORDER: [CacheTier; 3] =
        [CacheTier::Ephemeral, CacheTier::Durable, CacheTier::Backup];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Ephemeral => "EPHEMERAL",
            CacheTier::Durable => "DURABLE",
            CacheTier::Backup => "BACKUP",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "EPHEMERAL" => Some(CacheTier::Ephemeral),
            "DURABLE" => Some(CacheTier::Durable),
            "BACKUP" => Some(CacheTier::Backup),
            _ => None,
        }
    }
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One stored value. TTL is enforced at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub written_at: DateTime<Utc>,
    pub ttl_seconds: i64,
    pub tier: CacheTier,
}

impl CacheEntry {
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = Duration::seconds(self.ttl_seconds.clamp(0, MAX_TTL_SECS));
        self.written_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// True for any read strictly after `written_at + ttl`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    /// Relaxed usefulness check for fallback reads, measured from the write
    /// time and independent of the entry's own TTL.
    pub fn is_within_window(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.written_at.checked_add_signed(window) {
            Some(limit) => now <= limit,
            None => true,
        }
    }

    /// Past its TTL and too old for a fallback read: nothing can serve it.
    pub fn is_stale_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.is_expired_at(now) && !self.is_within_window(now, window)
    }

    /// Copy of this entry stored under another tier, keeping its expiry.
    pub fn promoted_to(&self, tier: CacheTier) -> Self {
        Self {
            tier,
            ..self.clone()
        }
    }
}

/// Hit/miss counters since the store was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub promotions: u64,
    pub fallback_reads: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(ttl_seconds: i64) -> CacheEntry {
        CacheEntry {
            key: "k".to_string(),
            value: serde_json::json!(1),
            written_at: Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap(),
            ttl_seconds,
            tier: CacheTier::Ephemeral,
        }
    }

    #[test]
    fn test_expiry_is_strictly_after_ttl() {
        let e = entry(60);
        assert!(!e.is_expired_at(e.written_at + Duration::seconds(60)));
        assert!(e.is_expired_at(e.written_at + Duration::seconds(61)));
    }

    #[test]
    fn test_window_ignores_ttl() {
        let e = entry(60);
        let later = e.written_at + Duration::hours(2);
        assert!(e.is_expired_at(later));
        assert!(e.is_within_window(later, Duration::hours(3)));
        assert!(!e.is_within_window(later, Duration::hours(1)));
    }

    #[test]
    fn test_tier_round_trip_names() {
        for tier in CacheTier::DEFAULT_ORDER {
            assert_eq!(CacheTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(CacheTier::parse("NOPE"), None);
    }
}
