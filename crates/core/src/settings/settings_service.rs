use std::sync::Arc;

use log::{debug, info};

use super::SettingsRepositoryTrait;
use crate::errors::{DatabaseError, Error, Result};
use crate::settings::EngineSettings;

pub trait SettingsServiceTrait: Send + Sync {
    /// Get a single setting value by key. Returns None if not found.
    fn get_setting_value(&self, key: &str) -> Result<Option<String>>;

    fn set_setting_value(&self, key: &str, value: &str) -> Result<()>;

    /// Defaults with every persisted override applied, validated.
    fn load_engine_settings(&self) -> Result<EngineSettings>;
}

pub struct SettingsService {
    settings_repository: Arc<dyn SettingsRepositoryTrait>,
}

impl SettingsService {
    pub fn new(settings_repository: Arc<dyn SettingsRepositoryTrait>) -> Self {
        SettingsService {
            settings_repository,
        }
    }
}

impl SettingsServiceTrait for SettingsService {
    fn get_setting_value(&self, key: &str) -> Result<Option<String>> {
        match self.settings_repository.get_setting(key) {
            Ok(value) => Ok(Some(value)),
            Err(Error::Database(DatabaseError::NotFound(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_setting_value(&self, key: &str, value: &str) -> Result<()> {
        let mut candidate = EngineSettings::default();
        if candidate.apply_override(key, value)? {
            candidate.validate()?;
        }
        self.settings_repository.update_setting(key, value)
    }

    fn load_engine_settings(&self) -> Result<EngineSettings> {
        let mut settings = EngineSettings::default();
        let mut applied = 0;
        for (key, value) in self.settings_repository.get_all_settings()? {
            if settings.apply_override(&key, &value)? {
                debug!("Engine setting override {} = {}", key, value);
                applied += 1;
            }
        }
        settings.validate()?;
        info!("Loaded engine settings with {} override(s)", applied);
        Ok(settings)
    }
}
