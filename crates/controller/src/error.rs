//! Controller error types and their reconcile dispositions.

use thiserror::Error;

use pocket_store::StoreError;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by a reconcile invocation.
#[derive(Debug, Error)]
pub enum Error {
    /// An explicitly referenced collection does not exist yet.
    #[error("collection '{namespace}/{name}' not found")]
    CollectionNotFound { name: String, namespace: String },

    /// No explicit reference and the scope does not hold exactly one
    /// collection. Cannot self-resolve without user action.
    #[error("expected exactly 1 collection, found {found}")]
    AmbiguousCollection { found: usize },

    /// Generation, mutation, or validation failure.
    #[error(transparent)]
    Api(#[from] pocket_api::Error),

    /// External store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Watch registration failure; the controller cannot safely run
    /// without dependency tracking.
    #[error("watch registration failed: {reason}")]
    WatchRegistration { reason: String },

    /// The invocation observed cancellation and aborted.
    #[error("reconcile cancelled for {workload}")]
    Cancelled { workload: String },
}

/// What the scheduler should do with a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Drop the trigger; nothing to do.
    Ignore,
    /// Retry after the scheduler's backoff interval.
    Requeue,
    /// Surface the error; retrying cannot help without intervention.
    Fatal,
}

impl Error {
    /// Create a collection-not-found error.
    pub fn collection_not_found(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::CollectionNotFound {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Create an ambiguous-collection error.
    pub fn ambiguous_collection(found: usize) -> Self {
        Self::AmbiguousCollection { found }
    }

    /// Create a watch registration error.
    pub fn watch_registration(reason: impl Into<String>) -> Self {
        Self::WatchRegistration {
            reason: reason.into(),
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(workload: impl std::fmt::Display) -> Self {
        Self::Cancelled {
            workload: workload.to_string(),
        }
    }

    /// Classify this error per the reconcile error table.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::CollectionNotFound { .. } => Disposition::Requeue,
            Self::AmbiguousCollection { .. } => Disposition::Fatal,
            Self::Api(_) => Disposition::Fatal,
            Self::Store(e) if e.is_not_found() => Disposition::Ignore,
            Self::Store(e) if e.is_transient() => Disposition::Requeue,
            Self::Store(_) => Disposition::Fatal,
            Self::WatchRegistration { .. } => Disposition::Fatal,
            Self::Cancelled { .. } => Disposition::Ignore,
        }
    }
}
