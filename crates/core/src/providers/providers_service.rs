use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::cache::{CacheStore, CacheTier};
use crate::constants::{DISCOVERY_BACKUP_KEY, DISCOVERY_CACHE_KEY};
use crate::diagnostics::{CorrelationId, DiagnosticsSink, EngineEvent};
use crate::errors::Result;
use crate::providers::{NewProvider, ProviderDiscoveryTrait, ProviderRecord};
use crate::settings::CacheSettings;

/// Loads the live provider list from the backing store and keeps cached
/// copies of it.
///
/// The list is cached twice: under [`DISCOVERY_CACHE_KEY`] in the ephemeral
/// tier with a short TTL for normal reads, and under
/// [`DISCOVERY_BACKUP_KEY`] in the backup tier with a long TTL, read only by
/// [`cached_providers_within`](Self::cached_providers_within) during outages.
pub struct DiscoveryService {
    source: Arc<dyn ProviderDiscoveryTrait>,
    cache: Arc<CacheStore>,
    sink: Arc<dyn DiagnosticsSink>,
    discovery_ttl: Duration,
    backup_ttl: Duration,
}

impl DiscoveryService {
    pub fn new(
        source: Arc<dyn ProviderDiscoveryTrait>,
        cache: Arc<CacheStore>,
        sink: Arc<dyn DiagnosticsSink>,
        settings: &CacheSettings,
    ) -> Self {
        Self {
            source,
            cache,
            sink,
            discovery_ttl: settings.discovery_ttl(),
            backup_ttl: settings.backup_ttl(),
        }
    }

    /// Returns every known provider, from cache unless `force_refresh`.
    ///
    /// Backing-store failures are returned unchanged for the caller to classify.
    pub fn discover(
        &self,
        force_refresh: bool,
        correlation_id: &CorrelationId,
    ) -> Result<Vec<ProviderRecord>> {
        if !force_refresh {
            match self
                .cache
                .get::<Vec<ProviderRecord>>(DISCOVERY_CACHE_KEY, CacheTier::Ephemeral)
            {
                Ok(Some(providers)) => {
                    self.emit_cache(correlation_id, true);
                    return Ok(providers);
                }
                Ok(None) => self.emit_cache(correlation_id, false),
                Err(e) => warn!(
                    "[{}] Ignoring unreadable cached provider list: {}",
                    correlation_id, e
                ),
            }
        }

        let providers = self.source.discover_providers()?;
        for provider in providers.iter().filter(|p| p.primary_link_count() > 1) {
            warn!(
                "Provider {} has {} primary locations; using {:?}",
                provider.code,
                provider.primary_link_count(),
                provider.primary_clinic_code()
            );
        }
        info!(
            "[{}] Discovered {} provider(s) from the backing store",
            correlation_id,
            providers.len()
        );

        self.store(&providers);
        Ok(providers)
    }

    fn store(&self, providers: &[ProviderRecord]) {
        if let Err(e) = self.cache.set(
            DISCOVERY_CACHE_KEY,
            &providers,
            CacheTier::Ephemeral,
            self.discovery_ttl,
        ) {
            warn!("Failed to cache provider list: {}", e);
        }
        if let Err(e) = self.cache.set(
            DISCOVERY_BACKUP_KEY,
            &providers,
            CacheTier::Backup,
            self.backup_ttl,
        ) {
            warn!("Failed to write backup provider list: {}", e);
        }
    }

    /// Cached provider list written within `window`, ignoring TTL.
    ///
    /// The short-lived copy is preferred over the backup copy.
    pub fn cached_providers_within(&self, window: Duration) -> Option<Vec<ProviderRecord>> {
        [DISCOVERY_CACHE_KEY, DISCOVERY_BACKUP_KEY]
            .into_iter()
            .find_map(|key| {
                match self
                    .cache
                    .get_within_window::<Vec<ProviderRecord>>(key, window)
                {
                    Ok(Some(providers)) => {
                        debug!("Using cached provider list '{}' as fallback", key);
                        Some(providers)
                    }
                    Ok(None) => None,
                    Err(e) => {
                        warn!("Cached provider list '{}' unreadable: {}", key, e);
                        None
                    }
                }
            })
    }

    /// Drops the short-lived provider list so the next discover hits the store.
    ///
    /// The backup copy is kept.
    pub fn refresh(&self) -> Result<usize> {
        let removed = self.cache.invalidate(DISCOVERY_CACHE_KEY)?;
        debug!("Invalidated cached provider list ({} tier(s))", removed);
        Ok(removed)
    }

    /// Upserts a provider in the backing store and invalidates the cached list.
    pub fn register(&self, new_provider: NewProvider) -> Result<ProviderRecord> {
        let record = self.source.register_provider(new_provider)?;
        info!("Registered provider {} ({})", record.code, record.display_name);
        if let Err(e) = self.refresh() {
            warn!("Failed to invalidate provider list after registration: {}", e);
        }
        Ok(record)
    }

    fn emit_cache(&self, correlation_id: &CorrelationId, hit: bool) {
        self.sink.emit(EngineEvent::Cache {
            correlation_id: correlation_id.clone(),
            key: DISCOVERY_CACHE_KEY.to_string(),
            hit,
            tier: CacheTier::Ephemeral,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MockDiagnosticsSink;
    use crate::errors::Error;
    use crate::providers::LocationLink;
    use crate::utils::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockSource {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl ProviderDiscoveryTrait for MockSource {
        fn discover_providers(&self) -> Result<Vec<ProviderRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::database_timeout("mock"));
            }
            Ok(vec![ProviderRecord {
                id: "p1".to_string(),
                code: "ada_obi".to_string(),
                display_name: "Ada Obi".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Obi".to_string(),
                email: None,
                title_prefix: None,
                external_id: None,
                locations: vec![
                    LocationLink {
                        clinic_code: "BAY".to_string(),
                        location_code: "BAY-1".to_string(),
                        is_primary: true,
                        is_active: true,
                    },
                    LocationLink {
                        clinic_code: "OAK".to_string(),
                        location_code: "OAK-1".to_string(),
                        is_primary: true,
                        is_active: true,
                    },
                ],
            }])
        }

        fn register_provider(&self, new_provider: NewProvider) -> Result<ProviderRecord> {
            Ok(ProviderRecord {
                id: "p2".to_string(),
                code: new_provider.code,
                display_name: new_provider.display_name,
                first_name: new_provider.first_name,
                last_name: new_provider.last_name,
                email: None,
                title_prefix: None,
                external_id: None,
                locations: vec![],
            })
        }
    }

    fn setup() -> (DiscoveryService, Arc<MockSource>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap(),
        ));
        let source = Arc::new(MockSource::default());
        let service = DiscoveryService::new(
            source.clone(),
            Arc::new(CacheStore::in_memory_with_clock(clock.clone())),
            Arc::new(MockDiagnosticsSink::new()),
            &CacheSettings::default(),
        );
        (service, source, clock)
    }

    #[test]
    fn test_discover_uses_cache_until_ttl() {
        let (service, source, clock) = setup();
        let cid = CorrelationId::new();

        service.discover(false, &cid).unwrap();
        service.discover(false, &cid).unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        clock.advance(chrono::Duration::hours(2));
        service.discover(false, &cid).unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        service.discover(true, &cid).unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_first_primary_wins_with_duplicate_primaries() {
        let (service, _, _) = setup();
        let providers = service.discover(false, &CorrelationId::new()).unwrap();
        assert_eq!(providers[0].primary_clinic_code().as_deref(), Some("BAY"));
    }

    #[test]
    fn test_backup_list_survives_outage() {
        let (service, source, clock) = setup();
        service.discover(false, &CorrelationId::new()).unwrap();

        clock.advance(chrono::Duration::days(2));
        source.failing.store(true, Ordering::SeqCst);
        assert!(service.discover(false, &CorrelationId::new()).is_err());

        let fallback = service
            .cached_providers_within(Duration::from_secs(7 * 24 * 3600))
            .unwrap();
        assert_eq!(fallback[0].code, "ada_obi");
        assert!(service
            .cached_providers_within(Duration::from_secs(3600))
            .is_none());
    }

    #[test]
    fn test_register_invalidates_list() {
        let (service, source, _) = setup();
        let cid = CorrelationId::new();
        service.discover(false, &cid).unwrap();

        let record = service
            .register(NewProvider::from_display_name("Ngozi Eze"))
            .unwrap();
        assert_eq!(record.code, "ngozi_eze");

        service.discover(false, &cid).unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
