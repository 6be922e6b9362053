//! Error types for the data model and generation pipeline.

use thiserror::Error;

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by validation, generation, and mutation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("required field missing: {field}")]
    MissingField { field: String },

    #[error("invalid workload '{name}': {reason}")]
    InvalidWorkload { name: String, reason: String },

    #[error("invalid collection '{name}': {reason}")]
    InvalidCollection { name: String, reason: String },

    #[error("YAML parse error: {reason}")]
    YamlParseFailed { reason: String },

    #[error("descriptor encoding error: {reason}")]
    EncodeFailed { reason: String },
}

impl Error {
    /// Create a missing-field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an invalid-workload error.
    pub fn invalid_workload(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidWorkload {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-collection error.
    pub fn invalid_collection(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCollection {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a YAML parse error.
    pub fn yaml_parse_failed(reason: impl std::fmt::Display) -> Self {
        Self::YamlParseFailed {
            reason: reason.to_string(),
        }
    }

    /// Create a descriptor encoding error.
    pub fn encode_failed(reason: impl std::fmt::Display) -> Self {
        Self::EncodeFailed {
            reason: reason.to_string(),
        }
    }
}
