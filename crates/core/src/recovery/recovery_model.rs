//! Recovery domain models: categories, severities, strategies and the
//! classified error handed from the classifier to the executor.

use serde::{Deserialize, Serialize};

use crate::diagnostics::CorrelationId;

/// Severity of a classified failure.
///
/// Ordered from lowest to highest: Info < Warning < Error < Critical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What kind of thing went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Backing store unreachable or erroring.
    DatabaseConnection,
    /// No confident match found.
    ProviderDetection,
    /// Transport failure unrelated to the store.
    NetworkConnectivity,
    /// Credential rejected.
    Authentication,
    /// Spreadsheet host denied read or write.
    SpreadsheetAccess,
    /// Malformed or unexpected response body.
    ApiResponse,
    /// Catch-all.
    Configuration,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::DatabaseConnection,
        ErrorCategory::ProviderDetection,
        ErrorCategory::NetworkConnectivity,
        ErrorCategory::Authentication,
        ErrorCategory::SpreadsheetAccess,
        ErrorCategory::ApiResponse,
        ErrorCategory::Configuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::DatabaseConnection => "DATABASE_CONNECTION",
            ErrorCategory::ProviderDetection => "PROVIDER_DETECTION",
            ErrorCategory::NetworkConnectivity => "NETWORK_CONNECTIVITY",
            ErrorCategory::Authentication => "AUTHENTICATION",
            ErrorCategory::SpreadsheetAccess => "SPREADSHEET_ACCESS",
            ErrorCategory::ApiResponse => "API_RESPONSE",
            ErrorCategory::Configuration => "CONFIGURATION",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorCategory::DatabaseConnection => Severity::Error,
            ErrorCategory::ProviderDetection => Severity::Warning,
            ErrorCategory::NetworkConnectivity => Severity::Warning,
            ErrorCategory::Authentication => Severity::Critical,
            ErrorCategory::SpreadsheetAccess => Severity::Error,
            ErrorCategory::ApiResponse => Severity::Warning,
            ErrorCategory::Configuration => Severity::Error,
        }
    }

    /// Remediation strategies for this category, highest priority first.
    pub fn recovery_plan(&self) -> &'static [RecoveryStrategy] {
        use RecoveryStrategy::*;
        match self {
            ErrorCategory::DatabaseConnection => &[Retry, CacheFallback, StaticFallback],
            ErrorCategory::ProviderDetection => &[StaticFallback, CacheFallback, UserIntervention],
            ErrorCategory::NetworkConnectivity => &[Retry, CacheFallback],
            ErrorCategory::Authentication => &[UserIntervention],
            ErrorCategory::SpreadsheetAccess => &[Retry, UserIntervention],
            ErrorCategory::ApiResponse => &[Retry, Skip],
            ErrorCategory::Configuration => &[StaticFallback, UserIntervention],
        }
    }

    /// Short operator-facing description of the failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::DatabaseConnection => "Provider lookup could not reach backing store",
            ErrorCategory::ProviderDetection => "No provider matched this name",
            ErrorCategory::NetworkConnectivity => "The network connection failed",
            ErrorCategory::Authentication => "Credentials were rejected",
            ErrorCategory::SpreadsheetAccess => "Access to the spreadsheet was denied",
            ErrorCategory::ApiResponse => "A service returned an unexpected response",
            ErrorCategory::Configuration => "The engine is misconfigured",
        }
    }

    pub fn suggested_action(&self) -> &'static str {
        match self {
            ErrorCategory::DatabaseConnection => {
                "Check that the database is reachable, then run the sync again."
            }
            ErrorCategory::ProviderDetection => {
                "Rename the spreadsheet to include the provider's first and last name."
            }
            ErrorCategory::NetworkConnectivity => "Check the network connection and try again.",
            ErrorCategory::Authentication => "Sign in again and re-run the sync.",
            ErrorCategory::SpreadsheetAccess => "Ask the spreadsheet owner to share it with you.",
            ErrorCategory::ApiResponse => "Try again later. Report it if the problem persists.",
            ErrorCategory::Configuration => "Review the engine settings.",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One remediation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    /// Re-run the failing operation with exponential backoff.
    Retry,
    /// Use the newest cached value inside the fallback window, ignoring TTL.
    CacheFallback,
    /// Use hand-maintained configuration instead of dynamic data.
    StaticFallback,
    /// Proceed without a result. Only for steps marked skippable.
    Skip,
    /// Queue for operator input and return pending.
    UserIntervention,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::Retry => "RETRY",
            RecoveryStrategy::CacheFallback => "CACHE_FALLBACK",
            RecoveryStrategy::StaticFallback => "STATIC_FALLBACK",
            RecoveryStrategy::Skip => "SKIP",
            RecoveryStrategy::UserIntervention => "USER_INTERVENTION",
        }
    }
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// External system a failing call was talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Collaborator {
    BackingStore,
    SpreadsheetHost,
    Network,
    Prompt,
    Cache,
}

/// Call-site context supplied alongside a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    pub operation: String,
    pub collaborator: Option<Collaborator>,
    pub correlation_id: CorrelationId,
    pub spreadsheet_id: Option<String>,
    /// Whether the caller can proceed with no result.
    pub skippable: bool,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            collaborator: None,
            correlation_id: CorrelationId::new(),
            spreadsheet_id: None,
            skippable: false,
        }
    }

    pub fn with_collaborator(mut self, collaborator: Collaborator) -> Self {
        self.collaborator = Some(collaborator);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_spreadsheet(mut self, spreadsheet_id: impl Into<String>) -> Self {
        self.spreadsheet_id = Some(spreadsheet_id.into());
        self
    }

    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }
}

/// A failure after classification. Consumed once by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub message: String,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub code: String,
    pub recovery_plan: Vec<RecoveryStrategy>,
    pub operation: String,
    pub correlation_id: CorrelationId,
}

impl ClassifiedError {
    pub fn user_message(&self) -> &'static str {
        self.category.user_message()
    }

    pub fn suggested_action(&self) -> &'static str {
        self.category.suggested_action()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_every_category_has_a_plan() {
        for category in ErrorCategory::ALL {
            assert!(!category.recovery_plan().is_empty(), "{}", category);
            assert!(!category.suggested_action().is_empty());
        }
    }

    #[test]
    fn test_database_plan_order() {
        assert_eq!(
            ErrorCategory::DatabaseConnection.recovery_plan(),
            &[
                RecoveryStrategy::Retry,
                RecoveryStrategy::CacheFallback,
                RecoveryStrategy::StaticFallback
            ]
        );
    }

    #[test]
    fn test_category_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCategory::NetworkConnectivity).unwrap();
        assert_eq!(json, "\"NETWORK_CONNECTIVITY\"");
    }
}
