//! End-to-end detection against a real SQLite backing store.

use std::sync::Arc;

use prodsync_core::cache::{CacheStore, CacheTier, CacheTierStore, MemoryTierStore};
use prodsync_core::detection::{DetectionRequest, DetectionService, DetectionSource};
use prodsync_core::diagnostics::NoOpDiagnosticsSink;
use prodsync_core::providers::{LocationLink, NewProvider, ProviderDiscoveryTrait};
use prodsync_core::settings::{EngineSettings, SettingsService, SettingsServiceTrait};
use prodsync_storage_sqlite::{
    create_pool, run_migrations, DbPool, ProviderRepository, SettingsRepository, SqliteCacheTier,
};
use tempfile::tempdir;

fn cache_over(pool: &Arc<DbPool>) -> Arc<CacheStore> {
    let ephemeral: Arc<dyn CacheTierStore> = Arc::new(MemoryTierStore::new(CacheTier::Ephemeral));
    let durable: Arc<dyn CacheTierStore> =
        Arc::new(SqliteCacheTier::new(Arc::clone(pool), CacheTier::Durable));
    let backup: Arc<dyn CacheTierStore> =
        Arc::new(SqliteCacheTier::new(Arc::clone(pool), CacheTier::Backup));
    Arc::new(
        CacheStore::new(
            vec![ephemeral, durable, backup],
            CacheTier::DEFAULT_ORDER.to_vec(),
            Arc::new(prodsync_core::utils::SystemClock),
        )
        .unwrap(),
    )
}

fn engine(pool: &Arc<DbPool>, settings: EngineSettings) -> DetectionService {
    DetectionService::builder()
        .settings(settings)
        .discovery_source(Arc::new(ProviderRepository::new(Arc::clone(pool))))
        .cache(cache_over(pool))
        .diagnostics_sink(Arc::new(NoOpDiagnosticsSink))
        .build()
        .unwrap()
}

#[test]
fn detection_survives_engine_restart() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("engine.db");
    let pool = create_pool(&db_path.to_string_lossy()).unwrap();
    run_migrations(&pool).unwrap();

    let repo = ProviderRepository::new(Arc::clone(&pool));
    repo.register_provider(NewProvider {
        locations: vec![LocationLink {
            clinic_code: "DNTL".to_string(),
            location_code: "DNTL-main".to_string(),
            is_primary: true,
            is_active: true,
        }],
        ..NewProvider::from_display_name("Kamdi Irondi")
    })
    .unwrap();

    let settings = SettingsService::new(Arc::new(SettingsRepository::new(Arc::clone(&pool))))
        .load_engine_settings()
        .unwrap();
    let request = DetectionRequest::new("sheet-1", "Dr. Kamdi Irondi - Production");

    let first = engine(&pool, settings.clone()).detect(&request).unwrap();
    assert_eq!(first.provider_code, "kamdi_irondi");
    assert_eq!(first.source, DetectionSource::Discovery);
    assert_eq!(first.primary_clinic_code.as_deref(), Some("DNTL"));

    // A fresh engine has an empty memory tier but finds the durable copy.
    let restarted = engine(&pool, settings);
    let second = restarted.detect(&request).unwrap();
    assert_eq!(second.provider_code, "kamdi_irondi");
    assert_eq!(second.source, DetectionSource::Cache);
    assert_eq!(restarted.health().cache.promotions, 1);
}

#[test]
fn registration_through_engine_is_discoverable() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("engine.db");
    let pool = create_pool(&db_path.to_string_lossy()).unwrap();
    run_migrations(&pool).unwrap();

    let service = engine(&pool, EngineSettings::default());
    let record = service
        .register_provider(NewProvider::from_display_name("Ada Obi"))
        .unwrap();
    assert_eq!(record.code, "ada_obi");

    let providers = service.refresh_providers().unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].id, record.id);
}
