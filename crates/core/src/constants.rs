/// Minimum confidence a discovered provider needs before it is accepted.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

/// Confidence reported for identities resolved from the static pattern table.
pub const DEFAULT_STATIC_CONFIDENCE: f64 = 0.8;

/// Honorific used for title patterns when a provider has none on record.
pub const DEFAULT_TITLE: &str = "Dr.";

/// Cache key prefix for resolved identities, followed by the spreadsheet id.
pub const DETECTION_CACHE_PREFIX: &str = "detection:";

/// Cache key for the last discovered provider list.
pub const DISCOVERY_CACHE_KEY: &str = "discovery:providers";

/// Long-lived copy of the provider list, kept only for fallbacks.
pub const DISCOVERY_BACKUP_KEY: &str = "discovery:providers:backup";

// Cache lifetimes
pub const DEFAULT_DETECTION_TTL_SECS: u64 = 6 * 60 * 60;
pub const DEFAULT_DISCOVERY_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_BACKUP_TTL_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_FALLBACK_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

// Retry backoff
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Rolling window for aggregate error counts.
pub const ERROR_STATS_WINDOW_HOURS: i64 = 24;

/// Scores are reported at this many decimal places.
pub const SCORE_PRECISION: f64 = 10_000.0;

/// Upper bound applied to any TTL or window, in seconds (about 100 years).
pub const MAX_TTL_SECS: i64 = 100 * 365 * 24 * 60 * 60;
