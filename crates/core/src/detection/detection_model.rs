//! Detection request and result types.

use serde::{Deserialize, Serialize};

use crate::constants::DETECTION_CACHE_PREFIX;
use crate::providers::ProviderRecord;

/// Where a resolved identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionSource {
    Cache,
    Discovery,
    StaticPattern,
    Manual,
}

impl DetectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionSource::Cache => "CACHE",
            DetectionSource::Discovery => "DISCOVERY",
            DetectionSource::StaticPattern => "STATIC_PATTERN",
            DetectionSource::Manual => "MANUAL",
        }
    }
}

impl std::fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The provider a spreadsheet was resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedIdentity {
    pub provider_code: String,
    pub display_name: String,
    pub primary_clinic_code: Option<String>,
    pub confidence: f64,
    pub source: DetectionSource,
}

impl DetectedIdentity {
    pub fn from_provider(provider: &ProviderRecord, confidence: f64, source: DetectionSource) -> Self {
        Self {
            provider_code: provider.code.clone(),
            display_name: provider.display_name.clone(),
            primary_clinic_code: provider.primary_clinic_code(),
            confidence,
            source,
        }
    }

    /// Same identity, relabelled with a different source.
    pub fn with_source(mut self, source: DetectionSource) -> Self {
        self.source = source;
        self
    }
}

/// "Who owns this spreadsheet?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequest {
    /// Host identity of the spreadsheet. Used as the cache key.
    pub spreadsheet_id: String,
    /// Free-text name to classify.
    pub spreadsheet_name: String,
    /// Skip the identity cache and re-query the backing store.
    #[serde(default)]
    pub force_refresh: bool,
}

impl DetectionRequest {
    pub fn new(spreadsheet_id: impl Into<String>, spreadsheet_name: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            spreadsheet_name: spreadsheet_name.into(),
            force_refresh: false,
        }
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn cache_key(&self) -> String {
        detection_cache_key(&self.spreadsheet_id)
    }
}

pub fn detection_cache_key(spreadsheet_id: &str) -> String {
    format!("{}{}", DETECTION_CACHE_PREFIX, spreadsheet_id)
}
