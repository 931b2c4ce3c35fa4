//! Errors raised by the SQLite backing store.
//!
//! Diesel and r2d2 failures stay inside this crate. Callers only ever see
//! `prodsync_core::Error`, mapped so the recovery classifier can tell a busy
//! store from a broken query.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;
use prodsync_core::errors::{DatabaseError, Error};

/// SQLite reports lock contention with this message once `busy_timeout` expires.
const LOCKED_MESSAGE: &str = "database is locked";

/// Failure inside the SQLite layer, before conversion to a core error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    /// r2d2 only fails a checkout when no connection frees up in time.
    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    CoreError(String),
}

impl From<Error> for StorageError {
    fn from(err: Error) -> Self {
        StorageError::CoreError(err.to_string())
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::PoolError(e) => Error::Database(DatabaseError::Timeout(e.to_string())),
            StorageError::QueryFailed(DieselError::NotFound) => {
                Error::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            StorageError::QueryFailed(DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                info,
            )) => Error::Database(DatabaseError::UniqueViolation(info.message().to_string())),
            StorageError::QueryFailed(DieselError::DatabaseError(
                DatabaseErrorKind::ClosedConnection,
                info,
            )) => Error::Database(DatabaseError::ConnectionFailed(info.message().to_string())),
            StorageError::QueryFailed(DieselError::DatabaseError(_, info))
                if info.message().contains(LOCKED_MESSAGE) =>
            {
                Error::Database(DatabaseError::Timeout(info.message().to_string()))
            }
            StorageError::QueryFailed(e) => {
                Error::Database(DatabaseError::QueryFailed(e.to_string()))
            }
            StorageError::MigrationFailed(e) => Error::Database(DatabaseError::MigrationFailed(e)),
            StorageError::SerializationError(e) => Error::Serialization(e),
            StorageError::CoreError(e) => Error::Database(DatabaseError::Internal(e)),
        }
    }
}

/// `.into_core()` for Diesel and r2d2 results.
pub trait IntoCore<T> {
    fn into_core(self) -> prodsync_core::Result<T>;
}

impl<T> IntoCore<T> for std::result::Result<T, DieselError> {
    fn into_core(self) -> prodsync_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, r2d2::Error> {
    fn into_core(self) -> prodsync_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}
