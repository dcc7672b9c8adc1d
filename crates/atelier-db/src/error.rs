//! # Database Error Types
//!
//! Error types for the local durable store.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError (atelier-sync) ← Drain decides retry vs dead-letter         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Errors from the local durable store.
#[derive(Debug, Error)]
pub enum DbError {
    /// The store cannot be opened at all.
    ///
    /// ## When This Occurs
    /// - Database file can't be created (permissions, quota, disk full)
    /// - The pool is closed
    ///
    /// Fatal to the sync subsystem; surfaced from [`crate::Database::new`],
    /// never retried automatically.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Record not found in a partition.
    #[error("{partition}/{id} not found")]
    NotFound { partition: String, id: String },

    /// A document operation targeted a partition the store does not manage.
    #[error("unknown partition: '{0}'")]
    UnknownPartition(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A stored value failed to serialize or deserialize.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Pool exhausted (all connections in use).
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given partition and id.
    pub fn not_found(partition: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            partition: partition.into(),
            id: id.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → DbError::QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::StorageUnavailable
/// Other                       → DbError::Internal
/// ```
/// RowNotFound is not mapped here: repositories use `fetch_optional` and
/// construct [`DbError::NotFound`] with real context.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::StorageUnavailable("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
