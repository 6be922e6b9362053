//! In-memory object store.
//!
//! Backs tests and offline runs with the same observable semantics as the
//! real store boundary: optimistic merge on apply, `Unchanged` detection,
//! synchronous watch fan-out, and fault injection for conflict and
//! permission paths.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use pocket_api::{Descriptor, ObjectKey, TypeRef};

use crate::error::{Result, StoreError};
use crate::{ApplyOutcome, EventKind, ObjectStore, WatchEvent, WatchHandler, WatchPredicate};

struct Stored {
    object: Descriptor,
    version: u64,
}

struct WatchEntry {
    type_ref: TypeRef,
    predicate: WatchPredicate,
    handler: WatchHandler,
}

/// In-memory `ObjectStore` implementation.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<ObjectKey, Stored>>,
    watches: RwLock<Vec<WatchEntry>>,
    mutations: AtomicU64,
    fail_next_apply: Mutex<Option<StoreError>>,
    fail_next_watch: Mutex<Option<StoreError>>,
    denied_kinds: Mutex<HashSet<String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes (creates, updates, deletes) performed so far.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::Relaxed)
    }

    /// Inject a one-shot failure into the next apply call.
    pub fn fail_next_apply(&self, error: StoreError) {
        *lock(&self.fail_next_apply) = Some(error);
    }

    /// Inject a one-shot failure into the next watch registration.
    pub fn fail_next_watch(&self, error: StoreError) {
        *lock(&self.fail_next_watch) = Some(error);
    }

    /// Reject every apply of the given kind with a permission error.
    pub fn deny_kind(&self, kind: impl Into<String>) {
        lock(&self.denied_kinds).insert(kind.into());
    }

    /// Number of objects currently stored.
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    async fn notify(&self, event: &WatchEvent) {
        let type_ref = event.object.type_ref();
        let watches = self.watches.read().await;

        for entry in watches.iter() {
            if entry.type_ref != type_ref {
                continue;
            }
            if (entry.predicate)(event) {
                (entry.handler)(event);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Merge a desired object over the observed one.
///
/// Desired fields win; observed fields absent from the desired object are
/// preserved (they belong to other field managers). Finalizers are owned by
/// the applying manager and replaced wholesale.
fn merge_descriptor(observed: &Descriptor, desired: &Descriptor) -> Descriptor {
    let mut merged = desired.clone();

    merged.metadata.name = observed.metadata.name.clone();
    merged.metadata.namespace = observed.metadata.namespace.clone();

    let mut labels = observed.metadata.labels.clone();
    labels.extend(desired.metadata.labels.clone());
    merged.metadata.labels = labels;

    let mut annotations = observed.metadata.annotations.clone();
    annotations.extend(desired.metadata.annotations.clone());
    merged.metadata.annotations = annotations;

    if merged.metadata.deletion_timestamp.is_none() {
        merged.metadata.deletion_timestamp = observed.metadata.deletion_timestamp;
    }

    merged.content = merge_maps(&observed.content, &desired.content);
    merged
}

fn merge_maps(observed: &Map<String, Value>, desired: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = Map::new();

    for (key, observed_value) in observed {
        match desired.get(key) {
            Some(desired_value) => {
                merged.insert(key.clone(), merge_values(observed_value, desired_value));
            }
            None => {
                merged.insert(key.clone(), observed_value.clone());
            }
        }
    }

    for (key, desired_value) in desired {
        if !merged.contains_key(key) {
            merged.insert(key.clone(), desired_value.clone());
        }
    }

    merged
}

fn merge_values(observed: &Value, desired: &Value) -> Value {
    match (observed, desired) {
        (Value::Object(observed_map), Value::Object(desired_map)) => {
            Value::Object(merge_maps(observed_map, desired_map))
        }
        _ => desired.clone(),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Descriptor> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|stored| stored.object.clone())
            .ok_or_else(|| StoreError::not_found(key))
    }

    async fn list(&self, type_ref: &TypeRef) -> Result<Vec<Descriptor>> {
        let objects = self.objects.read().await;

        let mut listed: Vec<Descriptor> = objects
            .values()
            .filter(|stored| stored.object.type_ref() == *type_ref)
            .map(|stored| stored.object.clone())
            .collect();

        listed.sort_by(|a, b| {
            (a.metadata.namespace.as_str(), a.metadata.name.as_str())
                .cmp(&(b.metadata.namespace.as_str(), b.metadata.name.as_str()))
        });

        Ok(listed)
    }

    async fn watch(
        &self,
        type_ref: &TypeRef,
        predicate: WatchPredicate,
        handler: WatchHandler,
    ) -> Result<()> {
        if let Some(error) = lock(&self.fail_next_watch).take() {
            return Err(error);
        }

        self.watches.write().await.push(WatchEntry {
            type_ref: type_ref.clone(),
            predicate,
            handler,
        });
        Ok(())
    }

    async fn apply(&self, manager: &str, desired: &Descriptor) -> Result<ApplyOutcome> {
        if lock(&self.denied_kinds).contains(&desired.kind) {
            return Err(StoreError::forbidden(format!(
                "field manager '{manager}' may not write kind '{}'",
                desired.kind
            )));
        }

        if let Some(error) = lock(&self.fail_next_apply).take() {
            return Err(error);
        }

        if desired.metadata.name.is_empty() {
            return Err(StoreError::invalid(desired.key(), "metadata.name is empty"));
        }

        let key = desired.key();
        let event = {
            let mut objects = self.objects.write().await;

            match objects.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(Stored {
                        object: desired.clone(),
                        version: 1,
                    });
                    self.mutations.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, manager, "object created");

                    Some((
                        WatchEvent {
                            kind: EventKind::Created,
                            previous: None,
                            object: desired.clone(),
                        },
                        ApplyOutcome::Created,
                    ))
                }
                Entry::Occupied(mut slot) => {
                    let stored = slot.get_mut();
                    let merged = merge_descriptor(&stored.object, desired);
                    if merged == stored.object {
                        debug!(key = %key, manager, "apply produced no change");
                        None
                    } else {
                        let previous = stored.object.clone();
                        stored.object = merged.clone();
                        stored.version += 1;
                        self.mutations.fetch_add(1, Ordering::Relaxed);
                        debug!(key = %key, manager, version = stored.version, "object updated");

                        Some((
                            WatchEvent {
                                kind: EventKind::Updated,
                                previous: Some(previous),
                                object: merged,
                            },
                            ApplyOutcome::Updated,
                        ))
                    }
                }
            }
        };

        match event {
            Some((event, outcome)) => {
                self.notify(&event).await;
                Ok(outcome)
            }
            None => Ok(ApplyOutcome::Unchanged),
        }
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        let removed = {
            let mut objects = self.objects.write().await;
            objects.remove(key)
        };

        let Some(stored) = removed else {
            return Err(StoreError::not_found(key));
        };

        self.mutations.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "object deleted");

        self.notify(&WatchEvent {
            kind: EventKind::Deleted,
            previous: Some(stored.object.clone()),
            object: stored.object,
        })
        .await;

        Ok(())
    }
}
