use diesel::prelude::*;
use log::debug;
use std::sync::Arc;

use super::model::AppSettingDB;
use crate::db::{get_connection, DbPool};
use crate::errors::IntoCore;
use crate::schema::app_settings;
use prodsync_core::errors::Result;
use prodsync_core::settings::SettingsRepositoryTrait;

/// Key/value store for persisted engine setting overrides.
pub struct SettingsRepository {
    pool: Arc<DbPool>,
}

impl SettingsRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        SettingsRepository { pool }
    }
}

impl SettingsRepositoryTrait for SettingsRepository {
    fn get_setting(&self, key: &str) -> Result<String> {
        let mut conn = get_connection(&self.pool)?;
        app_settings::table
            .find(key.trim())
            .select(app_settings::setting_value)
            .first::<String>(&mut conn)
            .into_core()
    }

    fn get_all_settings(&self) -> Result<Vec<(String, String)>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = app_settings::table
            .select(AppSettingDB::as_select())
            .order(app_settings::setting_key.asc())
            .load::<AppSettingDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    fn update_setting(&self, key: &str, value: &str) -> Result<()> {
        let row = AppSettingDB::new(key, value);
        debug!("Persisting setting override {}", row.setting_key);
        let mut conn = get_connection(&self.pool)?;
        diesel::replace_into(app_settings::table)
            .values(&row)
            .execute(&mut conn)
            .into_core()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations};
    use prodsync_core::errors::{DatabaseError, Error};
    use prodsync_core::settings::{SettingsService, SettingsServiceTrait};
    use tempfile::tempdir;

    fn create_test_repository() -> (Arc<SettingsRepository>, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let pool = create_pool(&db_path.to_string_lossy()).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        (Arc::new(SettingsRepository::new(pool)), temp_dir)
    }

    #[test]
    fn test_missing_setting_is_not_found() {
        let (repo, _dir) = create_test_repository();
        let result = repo.get_setting("detection.min_confidence");
        assert!(matches!(
            result,
            Err(Error::Database(DatabaseError::NotFound(_)))
        ));
    }

    #[test]
    fn test_update_replaces_value() {
        let (repo, _dir) = create_test_repository();
        repo.update_setting("detection.min_confidence", "0.8").unwrap();
        repo.update_setting("detection.min_confidence", "0.85").unwrap();
        repo.update_setting("cache.detection_ttl_secs", "60").unwrap();

        assert_eq!(repo.get_setting("detection.min_confidence").unwrap(), "0.85");
        assert_eq!(
            repo.get_all_settings().unwrap(),
            vec![
                ("cache.detection_ttl_secs".to_string(), "60".to_string()),
                ("detection.min_confidence".to_string(), "0.85".to_string()),
            ]
        );
    }

    #[test]
    fn test_service_loads_persisted_overrides() {
        let (repo, _dir) = create_test_repository();
        let service = SettingsService::new(repo);

        service
            .set_setting_value("detection.allow_registration", "true")
            .unwrap();
        service
            .set_setting_value("recovery.max_retries.database", "5")
            .unwrap();
        assert!(service
            .set_setting_value("detection.min_confidence", "2.0")
            .is_err());

        let settings = service.load_engine_settings().unwrap();
        assert!(settings.detection.allow_registration);
        assert_eq!(settings.recovery.max_retries.database, 5);
        assert_eq!(settings.detection.min_confidence, 0.7);
    }
}
