//! Controller configuration.

use std::time::Duration;

/// Scope searched when resolving a workload's collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionScope {
    /// Consider every collection in the store.
    Cluster,
    /// Consider only collections in the workload's namespace.
    Namespace,
}

/// Configuration for the controller runtime.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Field manager identity used for store writes.
    pub field_manager: String,
    /// Number of reconcile workers.
    pub workers: usize,
    /// Per-worker trigger queue depth.
    pub queue_depth: usize,
    /// Delay before a requeued trigger re-enters the queue.
    pub requeue_backoff: Duration,
    /// Collection resolution scope.
    pub collection_scope: CollectionScope,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            field_manager: "pocketvalidator-reconciler".to_string(),
            workers: 4,
            queue_depth: 64,
            requeue_backoff: Duration::from_secs(5),
            collection_scope: CollectionScope::Cluster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.collection_scope, CollectionScope::Cluster);
        assert!(!config.field_manager.is_empty());
    }
}
