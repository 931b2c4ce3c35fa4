//! Providers module - provider records, discovery traits and the discovery service.

mod providers_model;
mod providers_service;
mod providers_traits;

pub use providers_model::*;
pub use providers_service::DiscoveryService;
pub use providers_traits::ProviderDiscoveryTrait;
