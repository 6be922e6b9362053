//! External object store contract.
//!
//! The reconciliation core treats the cluster as an external state store
//! offering get/list/watch/apply/delete. This crate defines that boundary
//! and ships an in-memory implementation with the same merge semantics for
//! tests and offline use.

pub mod error;
pub mod memory;

use async_trait::async_trait;

use pocket_api::{Descriptor, ObjectKey, TypeRef};

pub use error::{Result, StoreError};
pub use memory::MemoryStore;

/// Outcome of a create-or-update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The object did not exist and was created.
    Created,
    /// The object existed and was changed by the merge.
    Updated,
    /// The merge produced no change; nothing was written.
    Unchanged,
}

impl ApplyOutcome {
    /// Whether the call wrote anything to the store.
    pub fn mutated(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Kind of a watch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// A change notification delivered to watch handlers.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: EventKind,
    /// The object before the change; `None` for creations.
    pub previous: Option<Descriptor>,
    /// The object after the change (the last seen value for deletions).
    pub object: Descriptor,
}

impl WatchEvent {
    /// The store address of the changed object.
    pub fn key(&self) -> ObjectKey {
        self.object.key()
    }

    /// Whether the change altered object content (always true for
    /// creations and deletions).
    pub fn content_changed(&self) -> bool {
        match (&self.kind, &self.previous) {
            (EventKind::Updated, Some(previous)) => previous != &self.object,
            _ => true,
        }
    }
}

/// Filter deciding which events reach a watch handler.
pub type WatchPredicate = Box<dyn Fn(&WatchEvent) -> bool + Send + Sync>;

/// Callback invoked for events passing the predicate.
pub type WatchHandler = Box<dyn Fn(&WatchEvent) + Send + Sync>;

/// The external state store boundary.
///
/// `apply` has optimistic server-side merge semantics: fields not owned by
/// the calling field manager are preserved across updates.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a single object by key.
    async fn get(&self, key: &ObjectKey) -> Result<Descriptor>;

    /// List all objects of a resource type, ordered by namespace and name.
    async fn list(&self, type_ref: &TypeRef) -> Result<Vec<Descriptor>>;

    /// Register a change watch on a resource type.
    async fn watch(
        &self,
        type_ref: &TypeRef,
        predicate: WatchPredicate,
        handler: WatchHandler,
    ) -> Result<()>;

    /// Create or update an object, merging over the observed state.
    async fn apply(&self, manager: &str, desired: &Descriptor) -> Result<ApplyOutcome>;

    /// Delete an object by key.
    async fn delete(&self, key: &ObjectKey) -> Result<()>;
}
