//! The reconcile entry point tying resolver, watch registrar, and phase
//! pipeline together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, Instrument};

use pocket_api::{ObjectKey, PocketSet, PocketValidator, Workload};
use pocket_store::ObjectStore;

use crate::config::ControllerConfig;
use crate::context::{Cancellation, Request};
use crate::error::{Disposition, Result};
use crate::phase::{attach_finalizer, PhaseExecutor, PhaseResult};
use crate::ready::ReadinessCheck;
use crate::resolver;
use crate::watch::{ensure_watch, WatchRegistry};
use crate::worker::TriggerSender;
use crate::FINALIZER;

/// Result of a reconcile pass as seen by the work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The workload converged or needs nothing further right now.
    Done,
    /// Retry after backoff.
    Requeue,
}

/// Per-workload reconciliation driver. One instance is shared by all
/// workers; reconcile passes for distinct workloads may run concurrently,
/// but the queue routes each workload to a fixed worker so passes for the
/// same workload never overlap.
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    registry: Arc<WatchRegistry>,
    forward: PhaseExecutor,
    finalize: PhaseExecutor,
    queue: TriggerSender,
    config: ControllerConfig,
    degraded: AtomicBool,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        readiness: Arc<dyn ReadinessCheck>,
        registry: Arc<WatchRegistry>,
        queue: TriggerSender,
        config: ControllerConfig,
    ) -> Self {
        let forward = PhaseExecutor::standard(Arc::clone(&store), readiness, &config);
        let finalize = PhaseExecutor::finalizing(Arc::clone(&store), &config);
        Self {
            store,
            registry,
            forward,
            finalize,
            queue,
            config,
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether a watch registration has failed. Without dependency
    /// tracking the controller misses collection and child changes, so
    /// the runtime must not report itself healthy.
    pub fn watch_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Run one reconcile pass and fold errors into a queue outcome using
    /// their disposition. Fatal errors are logged and dropped rather than
    /// retried; retrying cannot fix them.
    pub async fn process(&self, key: ObjectKey, cancel: Cancellation) -> Outcome {
        match self.reconcile(key.clone(), cancel).await {
            Ok(outcome) => outcome,
            Err(e) => match e.disposition() {
                Disposition::Ignore => {
                    debug!(workload = %key, error = %e, "ignoring reconcile error");
                    Outcome::Done
                }
                Disposition::Requeue => {
                    debug!(workload = %key, error = %e, "requeueing after error");
                    Outcome::Requeue
                }
                Disposition::Fatal => {
                    if matches!(e, crate::error::Error::WatchRegistration { .. }) {
                        self.degraded.store(true, Ordering::Relaxed);
                    }
                    error!(workload = %key, error = %e, "reconcile failed");
                    Outcome::Done
                }
            },
        }
    }

    /// One reconcile pass for the workload at `key`.
    pub async fn reconcile(&self, key: ObjectKey, cancel: Cancellation) -> Result<Outcome> {
        let observed = match self.store.get(&key).await {
            Ok(observed) => observed,
            Err(e) if e.is_not_found() => {
                // Deleted out from under us after the trigger fired.
                debug!(workload = %key, "workload gone, nothing to reconcile");
                return Ok(Outcome::Done);
            }
            Err(e) => return Err(e.into()),
        };
        let workload: PocketValidator = observed.decode()?;

        let collections = self
            .store
            .list(&PocketSet::collection_type())
            .await?
            .iter()
            .map(|d| d.decode::<PocketSet>())
            .collect::<pocket_api::Result<Vec<_>>>()?;
        let collection =
            resolver::resolve(&workload, collections, self.config.collection_scope)?;

        let request = Request::new(workload, collection, cancel);
        let span = request.span.clone();
        self.reconcile_resolved(request).instrument(span).await
    }

    async fn reconcile_resolved(&self, request: Request) -> Result<Outcome> {
        ensure_watch(&self.registry, &self.store, &self.queue, &request).await?;

        if request.workload.marked_for_deletion() {
            return self.handle_deletion(&request).await;
        }

        if !request
            .workload
            .finalizers()
            .iter()
            .any(|f| f == FINALIZER)
        {
            let attached = attach_finalizer(&request.workload)?;
            self.store
                .apply(&self.config.field_manager, &attached)
                .await?;
            debug!(workload = %request.workload_key(), "finalizer attached");
        }

        match self.forward.run(&request).await? {
            PhaseResult::Continue => {
                info!(workload = %request.workload_key(), "workload converged");
                Ok(Outcome::Done)
            }
            PhaseResult::Requeue => Ok(Outcome::Requeue),
        }
    }

    async fn handle_deletion(&self, request: &Request) -> Result<Outcome> {
        if !request
            .workload
            .finalizers()
            .iter()
            .any(|f| f == FINALIZER)
        {
            // Nothing of ours holds the object; the store may drop it.
            return Ok(Outcome::Done);
        }

        match self.finalize.run(request).await? {
            PhaseResult::Continue => {
                self.registry.unbind(&request.workload_key());
                info!(workload = %request.workload_key(), "workload finalized");
                Ok(Outcome::Done)
            }
            PhaseResult::Requeue => Ok(Outcome::Requeue),
        }
    }
}
