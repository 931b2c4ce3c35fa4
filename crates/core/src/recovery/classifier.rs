//! Maps any engine failure to a category, severity, code and recovery plan.

use crate::errors::{DatabaseError, DetectionError, Error};
use crate::recovery::{ClassifiedError, Collaborator, ErrorCategory, ErrorContext};

pub const DB_TIMEOUT: &str = "DB_TIMEOUT";
pub const DB_CONNECTION: &str = "DB_CONNECTION";
pub const DB_QUERY: &str = "DB_QUERY";
pub const NETWORK_FAILURE: &str = "NETWORK_FAILURE";
pub const AUTH_REJECTED: &str = "AUTH_REJECTED";
pub const SPREADSHEET_ACCESS_DENIED: &str = "SPREADSHEET_ACCESS_DENIED";
pub const API_RESPONSE_INVALID: &str = "API_RESPONSE_INVALID";
pub const CONFIGURATION: &str = "CONFIGURATION";

const AUTH_KEYWORDS: &[&str] = &[
    "unauthorized",
    "unauthenticated",
    "authentication",
    "credential",
    "token expired",
    "invalid token",
    "401",
];
const DATABASE_KEYWORDS: &[&str] = &["database", "sqlite", "sql", "deadlock", "pool", "jdbc"];
const SPREADSHEET_KEYWORDS: &[&str] = &["spreadsheet", "sheet", "range", "access denied"];
const NETWORK_KEYWORDS: &[&str] = &[
    "network",
    "timed out",
    "timeout",
    "dns",
    "connection reset",
    "connection refused",
    "unreachable",
    "fetch",
];
const API_KEYWORDS: &[&str] = &[
    "unexpected response",
    "malformed",
    "invalid json",
    "parse",
    "status code",
];
const DETECTION_KEYWORDS: &[&str] = &["provider", "detect", "no match"];

/// Classifies `error` raised while performing `context.operation`.
///
/// Typed failures map directly. Untyped ones (`Cache`, `Unexpected`, ...) are
/// matched on keywords in the message and operation, with the collaborator
/// taking precedence over keywords for store and spreadsheet failures.
/// Anything left over is `Configuration`.
pub fn classify(error: &Error, context: &ErrorContext) -> ClassifiedError {
    let message = error.to_string();
    let (category, code) = match error {
        Error::Database(db) => (ErrorCategory::DatabaseConnection, database_code(db)),
        Error::Network(_) => (ErrorCategory::NetworkConnectivity, NETWORK_FAILURE),
        Error::Authentication(_) => (ErrorCategory::Authentication, AUTH_REJECTED),
        Error::SpreadsheetAccess(_) => (ErrorCategory::SpreadsheetAccess, SPREADSHEET_ACCESS_DENIED),
        Error::ApiResponse(_) | Error::Serialization(_) => {
            (ErrorCategory::ApiResponse, API_RESPONSE_INVALID)
        }
        Error::Detection(DetectionError::ProviderNotDetected { .. }) => (
            ErrorCategory::ProviderDetection,
            DetectionError::PROVIDER_NOT_DETECTED,
        ),
        Error::Detection(DetectionError::MaxRetriesExceeded { category, .. }) => {
            (*category, DetectionError::MAX_RETRIES_EXCEEDED)
        }
        Error::InvalidConfigValue(_) | Error::InvalidInput(_) | Error::MissingCapability(_) => {
            (ErrorCategory::Configuration, CONFIGURATION)
        }
        Error::Cache(_) | Error::InterventionPending(_) | Error::Unexpected(_) => {
            classify_by_keywords(&message, context)
        }
    };

    ClassifiedError {
        message,
        category,
        severity: category.default_severity(),
        code: code.to_string(),
        recovery_plan: category.recovery_plan().to_vec(),
        operation: context.operation.clone(),
        correlation_id: context.correlation_id.clone(),
    }
}

fn database_code(error: &DatabaseError) -> &'static str {
    match error {
        DatabaseError::Timeout(_) => DB_TIMEOUT,
        DatabaseError::ConnectionFailed(_) | DatabaseError::PoolCreationFailed(_) => DB_CONNECTION,
        _ => DB_QUERY,
    }
}

fn classify_by_keywords(message: &str, context: &ErrorContext) -> (ErrorCategory, &'static str) {
    let haystack = format!("{} {}", message, context.operation).to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| haystack.contains(k));

    if mentions(AUTH_KEYWORDS) {
        return (ErrorCategory::Authentication, AUTH_REJECTED);
    }
    if context.collaborator == Some(Collaborator::BackingStore) || mentions(DATABASE_KEYWORDS) {
        let code = if haystack.contains("timeout") || haystack.contains("timed out") {
            DB_TIMEOUT
        } else if haystack.contains("connect") {
            DB_CONNECTION
        } else {
            DB_QUERY
        };
        return (ErrorCategory::DatabaseConnection, code);
    }
    if context.collaborator == Some(Collaborator::SpreadsheetHost) || mentions(SPREADSHEET_KEYWORDS)
    {
        return (ErrorCategory::SpreadsheetAccess, SPREADSHEET_ACCESS_DENIED);
    }
    if context.collaborator == Some(Collaborator::Network) || mentions(NETWORK_KEYWORDS) {
        return (ErrorCategory::NetworkConnectivity, NETWORK_FAILURE);
    }
    if mentions(API_KEYWORDS) {
        return (ErrorCategory::ApiResponse, API_RESPONSE_INVALID);
    }
    if mentions(DETECTION_KEYWORDS) {
        return (
            ErrorCategory::ProviderDetection,
            DetectionError::PROVIDER_NOT_DETECTED,
        );
    }
    (ErrorCategory::Configuration, CONFIGURATION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::{RecoveryStrategy, Severity};

    fn ctx(operation: &str) -> ErrorContext {
        ErrorContext::new(operation)
    }

    #[test]
    fn test_database_timeout_classification() {
        let classified = classify(&Error::database_timeout("pool checkout"), &ctx("discover"));
        assert_eq!(classified.category, ErrorCategory::DatabaseConnection);
        assert_eq!(classified.code, DB_TIMEOUT);
        assert_eq!(classified.severity, Severity::Error);
        assert_eq!(classified.recovery_plan[0], RecoveryStrategy::Retry);
    }

    #[test]
    fn test_typed_variants() {
        let cases = vec![
            (Error::Network("reset".into()), ErrorCategory::NetworkConnectivity),
            (Error::Authentication("bad".into()), ErrorCategory::Authentication),
            (Error::SpreadsheetAccess("no".into()), ErrorCategory::SpreadsheetAccess),
            (Error::ApiResponse("html".into()), ErrorCategory::ApiResponse),
            (Error::InvalidConfigValue("x".into()), ErrorCategory::Configuration),
            (
                DetectionError::ProviderNotDetected {
                    name: "x".into(),
                    suggestions: vec![],
                }
                .into(),
                ErrorCategory::ProviderDetection,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(classify(&error, &ctx("op")).category, expected, "{}", error);
        }
    }

    #[test]
    fn test_keyword_classification_order() {
        let auth = Error::Unexpected("database said: invalid credential".into());
        assert_eq!(
            classify(&auth, &ctx("op")).category,
            ErrorCategory::Authentication
        );

        let db = Error::Unexpected("sqlite busy".into());
        assert_eq!(
            classify(&db, &ctx("op")).category,
            ErrorCategory::DatabaseConnection
        );

        let net = Error::Unexpected("request timed out".into());
        assert_eq!(
            classify(&net, &ctx("op")).category,
            ErrorCategory::NetworkConnectivity
        );

        let other = Error::Unexpected("something odd".into());
        let classified = classify(&other, &ctx("op"));
        assert_eq!(classified.category, ErrorCategory::Configuration);
        assert_eq!(classified.code, CONFIGURATION);
    }

    #[test]
    fn test_collaborator_context_wins_over_keywords() {
        let error = Error::Unexpected("request timed out".into());
        let context = ctx("discover_providers").with_collaborator(Collaborator::BackingStore);
        let classified = classify(&error, &context);
        assert_eq!(classified.category, ErrorCategory::DatabaseConnection);
        assert_eq!(classified.code, DB_TIMEOUT);
    }

    #[test]
    fn test_correlation_id_is_threaded() {
        let context = ctx("op");
        let classified = classify(&Error::Network("x".into()), &context);
        assert_eq!(classified.correlation_id, context.correlation_id);
        assert_eq!(classified.operation, "op");
    }
}
