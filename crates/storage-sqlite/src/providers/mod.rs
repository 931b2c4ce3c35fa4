//! SQLite storage implementation for providers and their location links.

mod model;
mod repository;

pub use model::{ProviderDB, ProviderLocationDB};
pub use repository::ProviderRepository;

// Re-export trait from core for convenience
pub use prodsync_core::providers::ProviderDiscoveryTrait;
