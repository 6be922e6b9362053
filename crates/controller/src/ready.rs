//! Readiness checking for applied child objects.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use pocket_api::{apply_mutations, generate};
use pocket_store::ObjectStore;

use crate::context::Request;
use crate::error::Result;

/// Decides whether the children of a workload have converged. Checked once
/// per reconcile pass; a not-ready answer requeues rather than blocking a
/// worker on an in-process timer.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    async fn is_ready(&self, request: &Request) -> Result<bool>;
}

/// Store-backed readiness check. Regenerates the workload's descriptor set
/// and verifies every surviving child exists and, when it reports status,
/// reports ready.
pub struct AppliedReadiness {
    store: Arc<dyn ObjectStore>,
}

impl AppliedReadiness {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReadinessCheck for AppliedReadiness {
    async fn is_ready(&self, request: &Request) -> Result<bool> {
        let descriptors = generate(&request.workload, &request.collection)?;
        let descriptors = apply_mutations(descriptors, &request.workload, &request.collection)?;

        for descriptor in &descriptors {
            let key = descriptor.key();
            let observed = match self.store.get(&key).await {
                Ok(observed) => observed,
                Err(e) if e.is_not_found() => {
                    debug!(child = %key, "child missing, not ready");
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            };

            if let Some(Value::Bool(false)) = observed
                .content
                .get("status")
                .and_then(|status| status.get("ready"))
            {
                debug!(child = %key, "child reports not ready");
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod doubles {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports not-ready a fixed number of times, then ready.
    pub struct ReadyAfter {
        remaining: AtomicUsize,
    }

    impl ReadyAfter {
        pub fn new(not_ready_polls: usize) -> Self {
            Self {
                remaining: AtomicUsize::new(not_ready_polls),
            }
        }
    }

    #[async_trait]
    impl ReadinessCheck for ReadyAfter {
        async fn is_ready(&self, _request: &Request) -> Result<bool> {
            let prev = self.remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            });
            Ok(matches!(prev, Ok(0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::context::{Cancellation, Request};
    use pocket_api::{PocketSet, PocketValidator};
    use pocket_store::MemoryStore;

    fn request() -> Request {
        let mut workload = PocketValidator::new("v1-validator1", "default");
        workload.spec.pocket_image = "ghcr.io/pokt-network/pocket-v1:main-dev".to_string();
        Request::new(
            workload,
            PocketSet::new("pocketset-sample", "default"),
            Cancellation::never(),
        )
    }

    async fn applied_store(request: &Request) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let config = ControllerConfig::default();
        let descriptors = generate(&request.workload, &request.collection).unwrap_or_default();
        assert!(!descriptors.is_empty());
        for descriptor in apply_mutations(descriptors, &request.workload, &request.collection).unwrap_or_default() {
            store.apply(&config.field_manager, &descriptor).await.ok();
        }
        store
    }

    #[tokio::test]
    async fn test_missing_child_is_not_ready() {
        let store = Arc::new(MemoryStore::new());
        let check = AppliedReadiness::new(store);
        let ready = check.is_ready(&request()).await;
        assert!(matches!(ready, Ok(false)));
    }

    #[tokio::test]
    async fn test_all_children_present_is_ready() {
        let request = request();
        let store = applied_store(&request).await;
        let check = AppliedReadiness::new(store);
        let ready = check.is_ready(&request).await;
        assert!(matches!(ready, Ok(true)));
    }

    #[tokio::test]
    async fn test_child_status_ready_false_blocks() {
        let request = request();
        let store = applied_store(&request).await;

        let mut descriptors = generate(&request.workload, &request.collection).unwrap_or_default();
        if let Some(first) = descriptors.first_mut() {
            first.content.insert(
                "status".into(),
                serde_json::json!({ "ready": false }),
            );
            let config = ControllerConfig::default();
            store.apply(&config.field_manager, first).await.ok();
        }

        let check = AppliedReadiness::new(store);
        let ready = check.is_ready(&request).await;
        assert!(matches!(ready, Ok(false)));
    }
}
