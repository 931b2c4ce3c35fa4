//! Hand-maintained fallback patterns.

use log::debug;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::detection::{DetectedIdentity, DetectionSource};
use crate::errors::{Error, Result};

/// One static entry as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticPatternConfig {
    pub provider_code: String,
    pub display_name: String,
    #[serde(default)]
    pub clinic_code: Option<String>,
    /// Case-insensitive regular expressions matched against the spreadsheet name.
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone)]
struct StaticEntry {
    config: StaticPatternConfig,
    regexes: Vec<Regex>,
}

/// Compiled static table. Entry order is match priority.
#[derive(Debug, Clone)]
pub struct StaticPatternTable {
    entries: Vec<StaticEntry>,
    confidence: f64,
}

impl StaticPatternTable {
    pub fn new(configs: &[StaticPatternConfig], confidence: f64) -> Result<Self> {
        let entries = configs
            .iter()
            .map(|config| {
                let regexes = config
                    .patterns
                    .iter()
                    .map(|pattern| {
                        RegexBuilder::new(pattern)
                            .case_insensitive(true)
                            .build()
                            .map_err(|e| {
                                Error::InvalidConfigValue(format!(
                                    "static pattern '{}' for {}: {}",
                                    pattern, config.provider_code, e
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(StaticEntry {
                    config: config.clone(),
                    regexes,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            entries,
            confidence,
        })
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            confidence: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry with any pattern matching `spreadsheet_name`.
    pub fn find_match(&self, spreadsheet_name: &str) -> Option<DetectedIdentity> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.regexes.iter().any(|r| r.is_match(spreadsheet_name)))?;
        debug!(
            "Static pattern matched '{}' to {}",
            spreadsheet_name, entry.config.provider_code
        );
        Some(DetectedIdentity {
            provider_code: entry.config.provider_code.clone(),
            display_name: entry.config.display_name.clone(),
            primary_clinic_code: entry.config.clinic_code.clone(),
            confidence: self.confidence,
            source: DetectionSource::StaticPattern,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(code: &str, patterns: &[&str]) -> StaticPatternConfig {
        StaticPatternConfig {
            provider_code: code.to_string(),
            display_name: code.to_uppercase(),
            clinic_code: Some("BAY".to_string()),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_first_matching_entry_wins() {
        let table = StaticPatternTable::new(
            &[
                config("ortho_team", &[r"\bortho\b"]),
                config("general", &["production", "ortho"]),
            ],
            0.8,
        )
        .unwrap();

        let identity = table.find_match("ORTHO Production Q3").unwrap();
        assert_eq!(identity.provider_code, "ortho_team");
        assert_eq!(identity.source, DetectionSource::StaticPattern);
        assert_eq!(identity.confidence, 0.8);
        assert_eq!(identity.primary_clinic_code.as_deref(), Some("BAY"));

        assert_eq!(
            table.find_match("Hygiene production").unwrap().provider_code,
            "general"
        );
        assert!(table.find_match("Untitled spreadsheet").is_none());
    }

    #[test]
    fn test_invalid_regex_fails_construction() {
        let result = StaticPatternTable::new(&[config("x", &["(oops"])], 0.8);
        assert!(matches!(result, Err(Error::InvalidConfigValue(_))));
    }

    #[test]
    fn test_empty_table_matches_nothing() {
        assert!(StaticPatternTable::empty().find_match("anything").is_none());
    }
}
