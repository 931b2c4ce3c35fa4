//! Errors for the provider engine.
//!
//! Nothing here knows about SQLite. The storage crate turns its own failures
//! into [`DatabaseError`] before they cross into the engine.

use thiserror::Error;

use crate::recovery::ErrorCategory;

pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the engine.
///
/// Every failure raised by a collaborator or by the engine itself ends up here,
/// and every variant is understood by [`crate::recovery::classify`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Spreadsheet access denied: {0}")]
    SpreadsheetAccess(String),

    #[error("Unexpected API response: {0}")]
    ApiResponse(String),

    #[error("{0}")]
    Detection(#[from] DetectionError),

    #[error("Cache operation failed: {0}")]
    Cache(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required capability: {0}")]
    MissingCapability(&'static str),

    #[error("Waiting for operator input (ticket {0})")]
    InterventionPending(u64),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Backing store failure, reduced to strings so the engine stays storage-agnostic.
///
/// The variant picks the error code the classifier reports.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Could not reach the backing store: {0}")]
    ConnectionFailed(String),

    #[error("Could not open the backing store pool: {0}")]
    PoolCreationFailed(String),

    /// Pool checkout or lock wait ran out.
    #[error("Backing store timed out: {0}")]
    Timeout(String),

    #[error("Backing store query failed: {0}")]
    QueryFailed(String),

    #[error("Not found in backing store: {0}")]
    NotFound(String),

    /// Duplicate provider code or cache key.
    #[error("Duplicate key in backing store: {0}")]
    UniqueViolation(String),

    #[error("Backing store migration failed: {0}")]
    MigrationFailed(String),

    #[error("Backing store error: {0}")]
    Internal(String),
}

/// Failures that are allowed to reach the end caller unresolved.
///
/// Everything else is expected to self-heal through a fallback path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// Every automated and manual detection method came up empty.
    #[error("No provider matched spreadsheet '{name}'")]
    ProviderNotDetected {
        name: String,
        suggestions: Vec<String>,
    },

    /// A retried operation kept failing until its attempt ceiling.
    #[error("Gave up after {attempts} attempts ({category}): {message}")]
    MaxRetriesExceeded {
        category: ErrorCategory,
        attempts: u32,
        message: String,
    },
}

impl DetectionError {
    pub const PROVIDER_NOT_DETECTED: &'static str = "PROVIDER_NOT_DETECTED";
    pub const MAX_RETRIES_EXCEEDED: &'static str = "MAX_RETRIES_EXCEEDED";

    /// Stable code for callers that branch on the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderNotDetected { .. } => Self::PROVIDER_NOT_DETECTED,
            Self::MaxRetriesExceeded { .. } => Self::MAX_RETRIES_EXCEEDED,
        }
    }

    /// Human-readable message suitable for showing to an operator.
    pub fn user_message(&self) -> String {
        match self {
            Self::ProviderNotDetected { name, .. } => {
                format!(
                    "{} (spreadsheet '{}')",
                    ErrorCategory::ProviderDetection.user_message(),
                    name
                )
            }
            Self::MaxRetriesExceeded {
                category, attempts, ..
            } => format!(
                "{} after {} attempts",
                category.user_message(),
                attempts
            ),
        }
    }

    /// Suggested next actions. Never empty.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ProviderNotDetected { suggestions, .. } if !suggestions.is_empty() => {
                suggestions.clone()
            }
            Self::ProviderNotDetected { .. } => {
                vec![ErrorCategory::ProviderDetection.suggested_action().to_string()]
            }
            Self::MaxRetriesExceeded { category, .. } => {
                vec![category.suggested_action().to_string()]
            }
        }
    }
}

impl Error {
    /// Shorthand for a backing-store timeout.
    pub fn database_timeout(message: impl Into<String>) -> Self {
        Error::Database(DatabaseError::Timeout(message.into()))
    }

    /// Returns the detection failure carried by this error, if any.
    pub fn as_detection(&self) -> Option<&DetectionError> {
        match self {
            Error::Detection(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_error_codes() {
        let err = DetectionError::ProviderNotDetected {
            name: "Untitled spreadsheet".to_string(),
            suggestions: vec![],
        };
        assert_eq!(err.code(), "PROVIDER_NOT_DETECTED");

        let err = DetectionError::MaxRetriesExceeded {
            category: ErrorCategory::DatabaseConnection,
            attempts: 3,
            message: "timeout".to_string(),
        };
        assert_eq!(err.code(), "MAX_RETRIES_EXCEEDED");
    }

    #[test]
    fn test_suggestions_never_empty() {
        let err = DetectionError::ProviderNotDetected {
            name: "x".to_string(),
            suggestions: vec![],
        };
        assert!(!err.suggestions().is_empty());
    }

    #[test]
    fn test_user_message_is_category_specific() {
        let err = DetectionError::MaxRetriesExceeded {
            category: ErrorCategory::DatabaseConnection,
            attempts: 4,
            message: "pool timed out".to_string(),
        };
        let message = err.user_message();
        assert!(message.contains("could not reach backing store"));
        assert!(message.contains("4 attempts"));
    }

    #[test]
    fn test_error_display() {
        let err = Error::database_timeout("pool checkout");
        assert_eq!(
            err.to_string(),
            "Database operation failed: Database operation timed out: pool checkout"
        );

        let err: Error = DetectionError::ProviderNotDetected {
            name: "Untitled spreadsheet".to_string(),
            suggestions: vec![],
        }
        .into();
        assert_eq!(
            err.to_string(),
            "No provider matched spreadsheet 'Untitled spreadsheet'"
        );
    }
}
