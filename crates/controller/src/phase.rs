//! Reconcile phase pipeline.
//!
//! A reconcile pass is a fixed sequence of phases. Each phase either lets
//! the pass continue or stops it with a requeue. Cancellation is observed
//! between phases, never mid-phase.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use pocket_api::{apply_mutations, generate, validate_workload, Descriptor};
use pocket_store::{ObjectStore, StoreError};

use crate::config::ControllerConfig;
use crate::context::Request;
use crate::error::{Error, Result};
use crate::ready::ReadinessCheck;
use crate::FINALIZER;

/// Outcome of a single phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseResult {
    /// Proceed to the next phase.
    Continue,
    /// Stop the pass; the scheduler retries after backoff.
    Requeue,
}

/// A single step of a reconcile pass.
#[async_trait]
pub trait Phase: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, request: &Request) -> Result<PhaseResult>;
}

/// Runs phases in order, stopping at the first requeue. Checks for
/// cancellation before each phase so a shutdown never starts new work
/// against the store.
pub struct PhaseExecutor {
    phases: Vec<Box<dyn Phase>>,
}

impl PhaseExecutor {
    pub fn new(phases: Vec<Box<dyn Phase>>) -> Self {
        Self { phases }
    }

    /// The standard forward pipeline: validate, apply children, poll
    /// readiness.
    pub fn standard(
        store: Arc<dyn ObjectStore>,
        readiness: Arc<dyn ReadinessCheck>,
        config: &ControllerConfig,
    ) -> Self {
        Self::new(vec![
            Box::new(PreflightPhase),
            Box::new(ApplyPhase::new(Arc::clone(&store), config)),
            Box::new(ReadinessPhase::new(readiness)),
        ])
    }

    /// The deletion pipeline: remove children, then release the finalizer.
    pub fn finalizing(store: Arc<dyn ObjectStore>, config: &ControllerConfig) -> Self {
        Self::new(vec![Box::new(FinalizePhase::new(store, config))])
    }

    pub async fn run(&self, request: &Request) -> Result<PhaseResult> {
        for phase in &self.phases {
            if request.cancel.is_cancelled() {
                return Err(Error::cancelled(request.workload_key()));
            }
            debug!(phase = phase.name(), "running phase");
            match phase.run(request).await? {
                PhaseResult::Continue => {}
                PhaseResult::Requeue => {
                    debug!(phase = phase.name(), "phase requested requeue");
                    return Ok(PhaseResult::Requeue);
                }
            }
        }
        Ok(PhaseResult::Continue)
    }
}

/// Validates the workload before any store writes happen.
pub struct PreflightPhase;

#[async_trait]
impl Phase for PreflightPhase {
    fn name(&self) -> &'static str {
        "preflight"
    }

    async fn run(&self, request: &Request) -> Result<PhaseResult> {
        validate_workload(&request.workload)?;
        Ok(PhaseResult::Continue)
    }
}

/// Generates the descriptor set, runs mutation hooks, and applies every
/// surviving descriptor through the store. A version conflict on any child
/// requeues the whole pass; partial application is safe because apply is
/// idempotent.
pub struct ApplyPhase {
    store: Arc<dyn ObjectStore>,
    field_manager: String,
}

impl ApplyPhase {
    pub fn new(store: Arc<dyn ObjectStore>, config: &ControllerConfig) -> Self {
        Self {
            store,
            field_manager: config.field_manager.clone(),
        }
    }
}

#[async_trait]
impl Phase for ApplyPhase {
    fn name(&self) -> &'static str {
        "apply"
    }

    async fn run(&self, request: &Request) -> Result<PhaseResult> {
        let descriptors = generate(&request.workload, &request.collection)?;
        let descriptors = apply_mutations(descriptors, &request.workload, &request.collection)?;

        for descriptor in &descriptors {
            match self.store.apply(&self.field_manager, descriptor).await {
                Ok(outcome) => {
                    if outcome.mutated() {
                        info!(child = %descriptor.key(), ?outcome, "applied child");
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(child = %descriptor.key(), error = %e, "apply conflict, requeueing");
                    return Ok(PhaseResult::Requeue);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(PhaseResult::Continue)
    }
}

/// Polls readiness once. Not-ready ends the pass with a requeue instead of
/// holding a worker on a timer.
pub struct ReadinessPhase {
    check: Arc<dyn ReadinessCheck>,
}

impl ReadinessPhase {
    pub fn new(check: Arc<dyn ReadinessCheck>) -> Self {
        Self { check }
    }
}

#[async_trait]
impl Phase for ReadinessPhase {
    fn name(&self) -> &'static str {
        "readiness"
    }

    async fn run(&self, request: &Request) -> Result<PhaseResult> {
        if self.check.is_ready(request).await? {
            Ok(PhaseResult::Continue)
        } else {
            Ok(PhaseResult::Requeue)
        }
    }
}

/// Deletes the workload's children, then removes the finalizer so the
/// store can drop the workload itself. The descriptor set is regenerated
/// deterministically, but the deletion targets are the union of the raw
/// and mutated sets: a child applied under an earlier spec may be excluded
/// by the mutation chain under the current one, and it still must not
/// survive the workload. Already-gone children are not an error.
pub struct FinalizePhase {
    store: Arc<dyn ObjectStore>,
    field_manager: String,
}

impl FinalizePhase {
    pub fn new(store: Arc<dyn ObjectStore>, config: &ControllerConfig) -> Self {
        Self {
            store,
            field_manager: config.field_manager.clone(),
        }
    }
}

#[async_trait]
impl Phase for FinalizePhase {
    fn name(&self) -> &'static str {
        "finalize"
    }

    async fn run(&self, request: &Request) -> Result<PhaseResult> {
        let generated = generate(&request.workload, &request.collection)?;
        let mutated =
            apply_mutations(generated.clone(), &request.workload, &request.collection)?;

        let mut seen = HashSet::new();
        let targets: Vec<Descriptor> = generated
            .into_iter()
            .chain(mutated)
            .filter(|d| seen.insert(d.key()))
            .collect();

        for descriptor in &targets {
            match self.store.delete(&descriptor.key()).await {
                Ok(()) => info!(child = %descriptor.key(), "deleted child"),
                Err(StoreError::NotFound { .. }) => {}
                Err(e) if e.is_transient() => {
                    warn!(child = %descriptor.key(), error = %e, "delete conflict, requeueing");
                    return Ok(PhaseResult::Requeue);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let released = release_finalizer(&request.workload)?;
        self.store.apply(&self.field_manager, &released).await?;
        info!(workload = %request.workload_key(), "finalizer released");

        Ok(PhaseResult::Continue)
    }
}

/// Build a descriptor for the workload with this controller's finalizer
/// removed from the list.
fn release_finalizer(workload: &pocket_api::PocketValidator) -> Result<Descriptor> {
    let mut descriptor = Descriptor::encode(workload)?;
    descriptor.metadata.finalizers.retain(|f| f != FINALIZER);
    Ok(descriptor)
}

/// Build a descriptor for the workload with this controller's finalizer
/// attached.
pub(crate) fn attach_finalizer(workload: &pocket_api::PocketValidator) -> Result<Descriptor> {
    let mut descriptor = Descriptor::encode(workload)?;
    if !descriptor.metadata.finalizers.iter().any(|f| f == FINALIZER) {
        descriptor.metadata.finalizers.push(FINALIZER.to_string());
    }
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Cancellation;
    use crate::ready::doubles::ReadyAfter;
    use pocket_api::{ObjectKey, PocketSet, PocketValidator, TypeRef};
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

    #[tokio::test]
    async fn test_standard_pipeline_applies_children() {
        let store = Arc::new(MemoryStore::new());
        let config = ControllerConfig::default();
        let executor = PhaseExecutor::standard(
            store.clone() as Arc<dyn ObjectStore>,
            Arc::new(ReadyAfter::new(0)),
            &config,
        );

        let result = executor.run(&request()).await;
        assert!(matches!(result, Ok(PhaseResult::Continue)));
        assert!(store.mutation_count() > 0);
    }

    #[tokio::test]
    async fn test_not_ready_requeues() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let config = ControllerConfig::default();
        let executor =
            PhaseExecutor::standard(store, Arc::new(ReadyAfter::new(1)), &config);

        let result = executor.run(&request()).await;
        assert!(matches!(result, Ok(PhaseResult::Requeue)));
    }

    #[tokio::test]
    async fn test_preflight_rejects_invalid_workload() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let config = ControllerConfig::default();
        let executor =
            PhaseExecutor::standard(store, Arc::new(ReadyAfter::new(0)), &config);

        let mut req = request();
        req.workload.spec.pocket_image = String::new();
        let result = executor.run(&req).await;
        assert!(matches!(result, Err(Error::Api(_))));
    }

    #[tokio::test]
    async fn test_apply_conflict_requeues() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_apply(StoreError::conflict("default/v1-validator1", "version skew"));
        let config = ControllerConfig::default();
        let executor = PhaseExecutor::standard(
            store as Arc<dyn ObjectStore>,
            Arc::new(ReadyAfter::new(0)),
            &config,
        );

        let result = executor.run(&request()).await;
        assert!(matches!(result, Ok(PhaseResult::Requeue)));
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_phases() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let config = ControllerConfig::default();
        let executor =
            PhaseExecutor::standard(store, Arc::new(ReadyAfter::new(0)), &config);

        let (handle, cancel) = crate::context::cancellation();
        handle.cancel();
        let mut req = request();
        req.cancel = cancel;

        let result = executor.run(&req).await;
        assert!(matches!(result, Err(Error::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_finalize_removes_children_and_finalizer() {
        let store = Arc::new(MemoryStore::new());
        let config = ControllerConfig::default();
        let req = request();

        // Seed the workload and its children.
        let attached = attach_finalizer(&req.workload).unwrap_or_else(|_| Descriptor::default());
        store.apply(&config.field_manager, &attached).await.ok();
        let forward = PhaseExecutor::standard(
            store.clone() as Arc<dyn ObjectStore>,
            Arc::new(ReadyAfter::new(0)),
            &config,
        );
        assert!(forward.run(&req).await.is_ok());

        let finalize =
            PhaseExecutor::finalizing(store.clone() as Arc<dyn ObjectStore>, &config);
        let result = finalize.run(&req).await;
        assert!(matches!(result, Ok(PhaseResult::Continue)));

        let children = generate(&req.workload, &req.collection).unwrap_or_default();
        for child in children {
            assert!(store.get(&child.key()).await.is_err());
        }
        let observed = store.get(&req.workload_key()).await.ok();
        let finalizers = observed.map(|d| d.metadata.finalizers).unwrap_or_default();
        assert!(!finalizers.contains(&FINALIZER.to_string()));
    }

    #[tokio::test]
    async fn test_finalize_deletes_children_excluded_by_current_spec() {
        let store = Arc::new(MemoryStore::new());
        let config = ControllerConfig::default();

        // Apply children while scraping is on, so the scrape ConfigMap
        // lands in the store.
        let mut req = request();
        req.workload.spec.prometheus_scrape = true;
        let forward = PhaseExecutor::standard(
            store.clone() as Arc<dyn ObjectStore>,
            Arc::new(ReadyAfter::new(0)),
            &config,
        );
        assert!(forward.run(&req).await.is_ok());

        let scrape_key = ObjectKey::new(
            TypeRef::core("ConfigMap", "v1"),
            "pocketset-sample",
            "pocketset-sample-v1-validator1-scrape",
        );
        assert!(store.get(&scrape_key).await.is_ok());

        // Toggle scraping off before deletion. The mutation chain now
        // excludes the scrape ConfigMap, but finalization must still
        // remove it.
        req.workload.spec.prometheus_scrape = false;
        let finalize =
            PhaseExecutor::finalizing(store.clone() as Arc<dyn ObjectStore>, &config);
        let result = finalize.run(&req).await;
        assert!(matches!(result, Ok(PhaseResult::Continue)));
        assert!(store.get(&scrape_key).await.is_err());
    }
}
