//! SQLite storage implementation for the prodsync provider engine.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the collaborator traits defined in `prodsync-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - Provider discovery and registration
//! - Durable and backup cache tiers
//! - Persisted setting overrides
//!
//! # Architecture
//!
//! This crate is the only place in the workspace where Diesel dependencies exist.
//! The core crate is database-agnostic and works with traits.
//!
//! ```text
//!        core (engine)
//!              │
//!              ▼
//!   storage-sqlite (this crate)
//!              │
//!              ▼
//!          SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;

// Repository implementations
pub mod cache;
pub mod providers;
pub mod settings;

// Re-export database utilities
pub use db::{
    create_pool, create_pool_with_timeout, get_connection, get_db_path, init, run_migrations,
    DbConnection, DbPool,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

pub use cache::SqliteCacheTier;
pub use providers::ProviderRepository;
pub use settings::SettingsRepository;

// Re-export from prodsync-core for convenience
pub use prodsync_core::errors::{DatabaseError, Error, Result};
