//! Engine configuration.

use std::time::Duration;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::detection::StaticPatternConfig;
use crate::errors::{Error, Result};
use crate::recovery::ErrorCategory;

/// Full engine configuration. Every field has a default, so partial JSON is accepted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub detection: DetectionSettings,
    pub cache: CacheSettings,
    pub recovery: RecoverySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionSettings {
    /// Minimum discovery score accepted as a match.
    pub min_confidence: f64,
    pub include_nicknames: bool,
    /// Honorific used for title patterns when a provider has none.
    pub default_title: String,
    /// Confidence reported for static pattern matches.
    pub static_confidence: f64,
    pub allow_manual_fallback: bool,
    /// Lets an operator answer create a new provider.
    pub allow_registration: bool,
    /// Hand-maintained patterns, in match priority order.
    pub static_patterns: Vec<StaticPatternConfig>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            include_nicknames: true,
            default_title: DEFAULT_TITLE.to_string(),
            static_confidence: DEFAULT_STATIC_CONFIDENCE,
            allow_manual_fallback: true,
            allow_registration: false,
            static_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    pub detection_ttl_secs: u64,
    pub discovery_ttl_secs: u64,
    pub backup_ttl_secs: u64,
    /// How old a cached value may be and still serve a recovery fallback.
    pub fallback_window_secs: u64,
}

impl CacheSettings {
    pub fn detection_ttl(&self) -> Duration {
        Duration::from_secs(self.detection_ttl_secs)
    }

    pub fn discovery_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery_ttl_secs)
    }

    pub fn backup_ttl(&self) -> Duration {
        Duration::from_secs(self.backup_ttl_secs)
    }

    pub fn fallback_window(&self) -> Duration {
        Duration::from_secs(self.fallback_window_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            detection_ttl_secs: DEFAULT_DETECTION_TTL_SECS,
            discovery_ttl_secs: DEFAULT_DISCOVERY_TTL_SECS,
            backup_ttl_secs: DEFAULT_BACKUP_TTL_SECS,
            fallback_window_secs: DEFAULT_FALLBACK_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecoverySettings {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub max_retries: MaxRetriesSettings,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_retries: MaxRetriesSettings::default(),
        }
    }
}

/// Retry ceiling per error category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaxRetriesSettings {
    pub database: u32,
    pub network: u32,
    pub spreadsheet: u32,
    pub api_response: u32,
    pub authentication: u32,
    pub detection: u32,
    pub configuration: u32,
}

impl Default for MaxRetriesSettings {
    fn default() -> Self {
        Self {
            database: 3,
            network: 3,
            spreadsheet: 2,
            api_response: 2,
            authentication: 0,
            detection: 0,
            configuration: 0,
        }
    }
}

impl MaxRetriesSettings {
    pub fn for_category(&self, category: ErrorCategory) -> u32 {
        match category {
            ErrorCategory::DatabaseConnection => self.database,
            ErrorCategory::NetworkConnectivity => self.network,
            ErrorCategory::SpreadsheetAccess => self.spreadsheet,
            ErrorCategory::ApiResponse => self.api_response,
            ErrorCategory::Authentication => self.authentication,
            ErrorCategory::ProviderDetection => self.detection,
            ErrorCategory::Configuration => self.configuration,
        }
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut u32> {
        match name {
            "database" => Some(&mut self.database),
            "network" => Some(&mut self.network),
            "spreadsheet" => Some(&mut self.spreadsheet),
            "api_response" => Some(&mut self.api_response),
            "authentication" => Some(&mut self.authentication),
            "detection" => Some(&mut self.detection),
            "configuration" => Some(&mut self.configuration),
            _ => None,
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        Error::InvalidConfigValue(format!("'{}' is not a valid value for {}", value, key))
    })
}

impl EngineSettings {
    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: EngineSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let detection = &self.detection;
        if !(0.0..=1.0).contains(&detection.min_confidence) {
            return Err(Error::InvalidConfigValue(format!(
                "detection.min_confidence must be within [0, 1], got {}",
                detection.min_confidence
            )));
        }
        if !(detection.static_confidence > 0.0 && detection.static_confidence <= 1.0) {
            return Err(Error::InvalidConfigValue(format!(
                "detection.static_confidence must be within (0, 1], got {}",
                detection.static_confidence
            )));
        }
        for config in &detection.static_patterns {
            if config.provider_code.trim().is_empty() {
                return Err(Error::InvalidConfigValue(
                    "static pattern without a provider code".to_string(),
                ));
            }
            for pattern in &config.patterns {
                Regex::new(pattern).map_err(|e| {
                    Error::InvalidConfigValue(format!(
                        "static pattern '{}' for {}: {}",
                        pattern, config.provider_code, e
                    ))
                })?;
            }
        }

        let recovery = &self.recovery;
        if !recovery.multiplier.is_finite() || recovery.multiplier < 1.0 {
            return Err(Error::InvalidConfigValue(format!(
                "recovery.multiplier must be a finite number >= 1, got {}",
                recovery.multiplier
            )));
        }
        if recovery.max_delay_ms < recovery.initial_delay_ms {
            return Err(Error::InvalidConfigValue(format!(
                "recovery.max_delay_ms ({}) is below recovery.initial_delay_ms ({})",
                recovery.max_delay_ms, recovery.initial_delay_ms
            )));
        }
        Ok(())
    }

    /// Applies one dotted-key override such as `detection.min_confidence`.
    ///
    /// Returns false for keys this engine does not know about.
    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "detection.min_confidence" => self.detection.min_confidence = parse_value(key, value)?,
            "detection.include_nicknames" => {
                self.detection.include_nicknames = parse_value(key, value)?
            }
            "detection.default_title" => self.detection.default_title = value.trim().to_string(),
            "detection.static_confidence" => {
                self.detection.static_confidence = parse_value(key, value)?
            }
            "detection.allow_manual_fallback" => {
                self.detection.allow_manual_fallback = parse_value(key, value)?
            }
            "detection.allow_registration" => {
                self.detection.allow_registration = parse_value(key, value)?
            }
            "detection.static_patterns" => {
                self.detection.static_patterns = serde_json::from_str(value).map_err(|e| {
                    Error::InvalidConfigValue(format!("{} is not valid JSON: {}", key, e))
                })?
            }
            "cache.detection_ttl_secs" => self.cache.detection_ttl_secs = parse_value(key, value)?,
            "cache.discovery_ttl_secs" => self.cache.discovery_ttl_secs = parse_value(key, value)?,
            "cache.backup_ttl_secs" => self.cache.backup_ttl_secs = parse_value(key, value)?,
            "cache.fallback_window_secs" => {
                self.cache.fallback_window_secs = parse_value(key, value)?
            }
            "recovery.initial_delay_ms" => {
                self.recovery.initial_delay_ms = parse_value(key, value)?
            }
            "recovery.multiplier" => self.recovery.multiplier = parse_value(key, value)?,
            "recovery.max_delay_ms" => self.recovery.max_delay_ms = parse_value(key, value)?,
            _ => {
                let slot = key
                    .strip_prefix("recovery.max_retries.")
                    .and_then(|name| self.recovery.max_retries.slot_mut(name));
                match slot {
                    Some(slot) => *slot = parse_value(key, value)?,
                    None => {
                        debug!("Ignoring unknown engine setting '{}'", key);
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.detection.min_confidence, 0.7);
        assert_eq!(settings.detection.default_title, "Dr.");
        assert!(!settings.detection.allow_registration);
        assert_eq!(settings.cache.detection_ttl_secs, 21_600);
        assert_eq!(settings.recovery.max_retries.database, 3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_partial_json() {
        let settings = EngineSettings::from_json(
            r#"{"detection": {"minConfidence": 0.85}, "recovery": {"maxRetries": {"network": 5}}}"#,
        )
        .unwrap();
        assert_eq!(settings.detection.min_confidence, 0.85);
        assert!(settings.detection.include_nicknames);
        assert_eq!(settings.recovery.max_retries.network, 5);
        assert_eq!(settings.recovery.max_retries.database, 3);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let result = EngineSettings::from_json(r#"{"detection": {"minConfidence": 1.5}}"#);
        assert!(matches!(result, Err(Error::InvalidConfigValue(_))));

        let result = EngineSettings::from_json(r#"{"recovery": {"multiplier": 0.5}}"#);
        assert!(matches!(result, Err(Error::InvalidConfigValue(_))));
    }

    #[test]
    fn test_validate_rejects_bad_static_regex() {
        let result = EngineSettings::from_json(
            r#"{"detection": {"staticPatterns": [{"providerCode": "x", "displayName": "X", "patterns": ["(unclosed"]}]}}"#,
        );
        assert!(matches!(result, Err(Error::InvalidConfigValue(_))));
    }

    #[test]
    fn test_apply_override() {
        let mut settings = EngineSettings::default();
        assert!(settings
            .apply_override("detection.allow_registration", "true")
            .unwrap());
        assert!(settings
            .apply_override("recovery.max_retries.spreadsheet", "4")
            .unwrap());
        assert!(!settings.apply_override("theme", "dark").unwrap());

        assert!(settings.detection.allow_registration);
        assert_eq!(settings.recovery.max_retries.spreadsheet, 4);

        let err = settings
            .apply_override("cache.detection_ttl_secs", "soon")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue(_)));
    }
}
