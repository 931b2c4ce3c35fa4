//! Backing store contract for providers.

use crate::errors::Result;
use crate::providers::{NewProvider, ProviderRecord};

/// Read and upsert access to the provider tables of the backing store.
///
/// Implemented by the storage layer. An empty list from
/// [`discover_providers`](Self::discover_providers) means "no providers known"
/// and is not an error.
pub trait ProviderDiscoveryTrait: Send + Sync {
    /// Loads every active provider with its location links, in stable order.
    fn discover_providers(&self) -> Result<Vec<ProviderRecord>>;

    /// Inserts or updates a provider keyed by `code` and returns the stored record.
    fn register_provider(&self, new_provider: NewProvider) -> Result<ProviderRecord>;
}
