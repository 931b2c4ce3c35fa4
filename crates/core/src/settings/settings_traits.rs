//! Repository traits for settings.

use crate::errors::Result;

/// Key/value store for persisted setting overrides.
pub trait SettingsRepositoryTrait: Send + Sync {
    /// Get a single setting value by key. Missing keys are `DatabaseError::NotFound`.
    fn get_setting(&self, setting_key: &str) -> Result<String>;

    /// All stored settings as (key, value) pairs, ordered by key.
    fn get_all_settings(&self) -> Result<Vec<(String, String)>>;

    /// Inserts or replaces a single setting.
    fn update_setting(&self, setting_key: &str, setting_value: &str) -> Result<()>;
}
