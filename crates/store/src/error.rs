//! Error types for external store operations.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the external object store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("conflict applying {key}: {reason}")]
    Conflict { key: String, reason: String },

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("invalid object '{key}': {reason}")]
    Invalid { key: String, reason: String },

    #[error("watch registration failed: {reason}")]
    WatchFailed { reason: String },

    #[error("store operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// Create a not-found error.
    pub fn not_found(key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(key: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::Conflict {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a forbidden error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Create an invalid-object error.
    pub fn invalid(key: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a watch registration error.
    pub fn watch_failed(reason: impl Into<String>) -> Self {
        Self::WatchFailed {
            reason: reason.into(),
        }
    }

    /// Whether retrying later could succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether the error is a missing-object condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
