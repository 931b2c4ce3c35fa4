//! Prodsync Core - provider resolution and resilience engine.
//!
//! Production spreadsheets arrive with free-text names and no reliable
//! identifier for the provider they belong to. This crate infers that
//! identity and keeps doing so while its collaborators misbehave.
//!
//! # Architecture
//!
//! ```text
//!   spreadsheet name
//!          |
//!          v
//! +--------------------+     +----------------+
//! | DetectionService   | --> |  CacheStore    |  (ephemeral -> durable -> backup)
//! +--------------------+     +----------------+
//!          |
//!          v
//! +--------------------+     +----------------+
//! | DiscoveryService   | --> | backing store  |  (ProviderDiscoveryTrait)
//! +--------------------+     +----------------+
//!          |
//!          v
//! +--------------------+
//! | PatternGenerator   |  -> ConfidenceScorer -> StaticPatternTable -> prompt
//! +--------------------+
//!
//! any failure -> classify() -> RecoveryExecutor (retry, cache, static, skip, operator)
//! ```
//!
//! The crate is database-agnostic. The `storage-sqlite` crate implements the
//! collaborator traits against SQLite.

pub mod cache;
pub mod constants;
pub mod detection;
pub mod diagnostics;
pub mod errors;
pub mod providers;
pub mod recovery;
pub mod settings;
pub mod utils;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
