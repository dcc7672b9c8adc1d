//! # Validation Rules
//!
//! Input validation for values that cross the public enqueue boundary.
//! Pure functions; callers decide what to do with a failure.

use crate::error::ValidationError;

/// Maximum accepted module name length.
pub const MAX_MODULE_LEN: usize = 64;

/// Validates a logical module (partition) name.
///
/// Module names key the adapter registry and the queue's `module` column,
/// so they follow the same shape everywhere: non-empty, at most
/// [`MAX_MODULE_LEN`] characters, lowercase `[a-z0-9_]`.
///
/// ## Example
/// ```rust
/// use atelier_core::validate_module;
///
/// assert!(validate_module("projects").is_ok());
/// assert!(validate_module("Projects").is_err());
/// ```
pub fn validate_module(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyModule);
    }

    if name.len() > MAX_MODULE_LEN {
        return Err(ValidationError::ModuleTooLong(name.len()));
    }

    for c in name.chars() {
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(ValidationError::InvalidModuleChar(c));
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_known_partitions() {
        for name in crate::CACHE_PARTITIONS {
            assert!(validate_module(name).is_ok());
        }
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(validate_module(""), Err(ValidationError::EmptyModule));
    }

    #[test]
    fn test_rejects_overlong() {
        let name = "a".repeat(MAX_MODULE_LEN + 1);
        assert_eq!(
            validate_module(&name),
            Err(ValidationError::ModuleTooLong(MAX_MODULE_LEN + 1))
        );
    }

    #[test]
    fn test_rejects_invalid_characters() {
        assert_eq!(
            validate_module("Projects"),
            Err(ValidationError::InvalidModuleChar('P'))
        );
        assert_eq!(
            validate_module("sync queue"),
            Err(ValidationError::InvalidModuleChar(' '))
        );
    }

    #[test]
    fn test_accepts_underscores_and_digits() {
        assert!(validate_module("sync_queue_v2").is_ok());
    }
}
