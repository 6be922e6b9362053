//! Watch registry and registrar.
//!
//! One watch per collection resource type, process-wide, no matter how many
//! workloads reference collections of that type. The registry also tracks
//! which workloads are bound to which collection so a collection change
//! re-enqueues every dependent workload. Check-then-register runs under a
//! single lock so concurrent first-touch cannot double-register.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use pocket_api::{Collection, ObjectKey, TypeRef};
use pocket_store::{EventKind, ObjectStore, WatchHandler, WatchPredicate};

use crate::context::Request;
use crate::error::{Error, Result};
use crate::worker::TriggerSender;

/// Process-wide registry of watched resource types and collection
/// membership bindings.
#[derive(Default)]
pub struct WatchRegistry {
    types: Mutex<HashSet<TypeRef>>,
    bindings: StdMutex<HashMap<ObjectKey, HashSet<ObjectKey>>>,
}

impl WatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether a watch exists for the given resource type.
    pub async fn is_watched(&self, type_ref: &TypeRef) -> bool {
        self.types.lock().await.contains(type_ref)
    }

    /// Number of registered watches.
    pub async fn watched_count(&self) -> usize {
        self.types.lock().await.len()
    }

    /// Record that a workload depends on a collection.
    pub fn bind(&self, collection: ObjectKey, workload: ObjectKey) {
        self.lock_bindings()
            .entry(collection)
            .or_default()
            .insert(workload);
    }

    /// Forget a workload's collection bindings (after deletion).
    pub fn unbind(&self, workload: &ObjectKey) {
        let mut bindings = self.lock_bindings();
        for bound in bindings.values_mut() {
            bound.remove(workload);
        }
        bindings.retain(|_, bound| !bound.is_empty());
    }

    /// Workloads bound to a collection, if any.
    pub fn bound_workloads(&self, collection: &ObjectKey) -> Vec<ObjectKey> {
        self.lock_bindings()
            .get(collection)
            .map(|bound| bound.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn lock_bindings(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<ObjectKey, HashSet<ObjectKey>>> {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ensure a watch exists on the request's collection type, registering one
/// if needed. Idempotent; registration failure is fatal because the
/// controller cannot safely run without dependency tracking.
pub async fn ensure_watch(
    registry: &Arc<WatchRegistry>,
    store: &Arc<dyn ObjectStore>,
    queue: &TriggerSender,
    request: &Request,
) -> Result<()> {
    registry.bind(request.collection.key(), request.workload_key());

    let type_ref = request.collection.type_ref();
    let mut types = registry.types.lock().await;
    if types.contains(&type_ref) {
        return Ok(());
    }

    if request.cancel.is_cancelled() {
        return Err(Error::cancelled(request.workload_key()));
    }

    // Pass only genuine updates to bound collections; creates, deletes,
    // no-op updates, and unrelated objects stay filtered out.
    let predicate_registry = Arc::clone(registry);
    let predicate: WatchPredicate = Box::new(move |event| {
        event.kind == EventKind::Updated
            && event.content_changed()
            && !predicate_registry.bound_workloads(&event.key()).is_empty()
    });

    let handler_registry = Arc::clone(registry);
    let handler_queue = queue.clone();
    let handler: WatchHandler = Box::new(move |event| {
        for workload in handler_registry.bound_workloads(&event.key()) {
            debug!(collection = %event.key(), workload = %workload, "collection changed, re-enqueueing workload");
            handler_queue.enqueue(workload);
        }
    });

    store
        .watch(&type_ref, predicate, handler)
        .await
        .map_err(|e| Error::watch_registration(e.to_string()))?;

    types.insert(type_ref.clone());
    debug!(%type_ref, "watch registered");

    Ok(())
}
