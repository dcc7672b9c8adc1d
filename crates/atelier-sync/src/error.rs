//! # Sync Error Types
//!
//! Error types for the sync engine.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Drain       │  │      Storage            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Adapter        │  │  Storage                │ │
//! │  │  ConfigLoad/    │  │  UnknownModule  │  │  Serialization          │ │
//! │  │  SaveFailed     │  │  InvalidMutation│  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Retryable errors keep their entry queued (attempts + 1);              │
//! │  non-retryable errors dead-letter it immediately. Either way the       │
//! │  current batch aborts to preserve per-document ordering.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all sync engine failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Drain Errors
    // =========================================================================
    /// The remote store adapter rejected a mutation.
    ///
    /// Deliberately unclassified: any adapter rejection aborts the current
    /// batch and the entry stays queued for the next trigger.
    #[error("adapter failure for module '{module}': {message}")]
    Adapter { module: String, message: String },

    /// No adapter is registered for a mutation's module.
    ///
    /// Non-retryable: retrying cannot succeed while the registry is fixed.
    #[error("no adapter registered for module '{0}'")]
    UnknownModule(String),

    /// A mutation failed validation before being enqueued.
    #[error("invalid mutation: {0}")]
    InvalidMutation(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The durable store failed underneath the coordinator.
    #[error("storage error: {0}")]
    Storage(String),

    /// Failed to serialize a payload.
    #[error("serialization failed: {0}")]
    Serialization(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Coordinator is shutting down.
    #[error("sync coordinator is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<atelier_db::DbError> for SyncError {
    fn from(err: atelier_db::DbError) -> Self {
        SyncError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<atelier_core::ValidationError> for SyncError {
    fn from(err: atelier_core::ValidationError) -> Self {
        SyncError::InvalidMutation(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (drives the dead-letter policy)
// =============================================================================

impl SyncError {
    /// Returns true if the failed operation may succeed on a later attempt.
    ///
    /// ## Retryable
    /// - Adapter rejections (network, auth, transient remote errors; the
    ///   core deliberately does not distinguish)
    /// - Storage errors (pool pressure, transient I/O)
    /// - Shutdown races
    ///
    /// ## Non-Retryable
    /// - Configuration problems
    /// - Unknown modules (no adapter will ever accept the entry)
    /// - Validation failures
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Adapter { .. } | SyncError::Storage(_) | SyncError::ShuttingDown
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Adapter {
            module: "projects".into(),
            message: "connection reset".into()
        }
        .is_retryable());
        assert!(SyncError::Storage("pool exhausted".into()).is_retryable());

        assert!(!SyncError::UnknownModule("ghosts".into()).is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::InvalidMutation("empty module".into()).is_retryable());
    }

    #[test]
    fn test_error_display_includes_module() {
        let err = SyncError::Adapter {
            module: "inventory".into(),
            message: "409 conflict".into(),
        };
        assert!(err.to_string().contains("inventory"));
        assert!(err.to_string().contains("409"));
    }
}
