//! # Domain Error Types
//!
//! Errors produced by the pure domain layer. Storage and sync failures have
//! their own types in atelier-db and atelier-sync; everything here can occur
//! without touching I/O.

use thiserror::Error;

/// Errors from decoding or constructing domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stored action string is not one of create/update/delete.
    ///
    /// ## When This Occurs
    /// - Decoding a queue row written by a newer (or corrupted) schema
    #[error("unknown mutation action: '{0}'")]
    UnknownAction(String),
}

/// Module name validation failures.
///
/// Raised at enqueue time, before anything is persisted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Module name is empty.
    #[error("module name must not be empty")]
    EmptyModule,

    /// Module name exceeds [`crate::validation::MAX_MODULE_LEN`].
    #[error("module name too long: {0} chars")]
    ModuleTooLong(usize),

    /// Module name contains a character outside `[a-z0-9_]`.
    #[error("module name contains invalid character {0:?}")]
    InvalidModuleChar(char),
}
