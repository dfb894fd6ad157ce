//! Error types for the behavior store.

use thiserror::Error;

/// Top-level error type for all store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A required request field was missing or empty.
    #[error("Missing '{0}' field")]
    Validation(&'static str),

    /// The named profile does not exist.
    #[error("Profile '{0}' not found")]
    ProfileNotFound(String),

    /// The profile exists but holds no behavior with this id.
    #[error("Behavior '{id}' not found in profile '{profile}'")]
    BehaviorNotFound {
        /// Profile that was searched.
        profile: String,
        /// Behavior id that was requested.
        id: String,
    },

    /// A profile with this name already exists (clone target).
    #[error("Target profile '{0}' already exists")]
    ProfileExists(String),

    /// Snapshot encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error means a referenced profile or behavior is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProfileNotFound(_) | Self::BehaviorNotFound { .. })
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Reject an empty required field.
///
/// The HTTP clients send `""` and omit the key interchangeably, so both count
/// as missing.
///
/// # Errors
/// Returns [`StoreError::Validation`] naming `field` when `value` is empty.
pub fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        Err(StoreError::Validation(field))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_rejects_empty() {
        let err = require("profile", "").expect_err("empty must fail");
        assert_eq!(err.to_string(), "Missing 'profile' field");
        assert_eq!(require("profile", "demo").expect("non-empty"), "demo");
    }

    #[test]
    fn not_found_classification() {
        assert!(StoreError::ProfileNotFound("a".into()).is_not_found());
        assert!(
            StoreError::BehaviorNotFound {
                profile: "a".into(),
                id: "b".into()
            }
            .is_not_found()
        );
        assert!(!StoreError::ProfileExists("a".into()).is_not_found());
    }
}
