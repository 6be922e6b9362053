//! Worker pool and trigger queue.
//!
//! Triggers are routed to a fixed worker by hashing the workload key, so
//! two passes for the same workload never run concurrently while passes
//! for distinct workloads proceed in parallel. Requeues go through a
//! spawned backoff sleep rather than blocking a worker.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pocket_api::ObjectKey;

use crate::config::ControllerConfig;
use crate::context::{cancellation, CancelHandle, Cancellation};
use crate::reconciler::{Outcome, Reconciler};

/// Fan-in side of the trigger queue. Cloned freely by watch handlers and
/// the runtime itself.
#[derive(Clone)]
pub struct TriggerSender {
    senders: Arc<Vec<mpsc::Sender<ObjectKey>>>,
}

impl TriggerSender {
    /// Build the per-worker channels: one bounded queue per worker.
    pub fn channels(workers: usize, depth: usize) -> (Self, Vec<mpsc::Receiver<ObjectKey>>) {
        let workers = workers.max(1);
        let depth = depth.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut receivers = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (tx, rx) = mpsc::channel(depth);
            senders.push(tx);
            receivers.push(rx);
        }
        (
            Self {
                senders: Arc::new(senders),
            },
            receivers,
        )
    }

    /// Enqueue a reconcile trigger without blocking. Only watch handlers
    /// use this path: a full queue drops the trigger with a warning, and
    /// the next watch event for the same object re-triggers it. Requeues
    /// must go through [`TriggerSender::enqueue_wait`] instead so a
    /// backoff retry is never lost.
    pub fn enqueue(&self, key: ObjectKey) {
        let worker = self.route(&key);
        match self.senders[worker].try_send(key) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(key)) => {
                warn!(workload = %key, worker, "trigger queue full, dropping trigger");
            }
            Err(mpsc::error::TrySendError::Closed(key)) => {
                debug!(workload = %key, worker, "trigger queue closed");
            }
        }
    }

    /// Enqueue a trigger, waiting for queue capacity. Used by the backoff
    /// task so a requeue is delivered even when the worker's queue is full.
    pub async fn enqueue_wait(&self, key: ObjectKey) {
        let worker = self.route(&key);
        if let Err(mpsc::error::SendError(key)) = self.senders[worker].send(key).await {
            debug!(workload = %key, worker, "trigger queue closed");
        }
    }

    fn route(&self, key: &ObjectKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.senders.len()
    }
}

/// Owns the worker tasks and the shutdown signal.
pub struct ControllerRuntime {
    cancel: CancelHandle,
    handles: Vec<JoinHandle<()>>,
    queue: TriggerSender,
    reconciler: Arc<Reconciler>,
}

impl ControllerRuntime {
    /// Spawn the worker pool. `receivers` must come from the same
    /// [`TriggerSender::channels`] call as `queue`.
    pub fn start(
        reconciler: Arc<Reconciler>,
        queue: TriggerSender,
        receivers: Vec<mpsc::Receiver<ObjectKey>>,
        config: &ControllerConfig,
    ) -> Self {
        let (cancel, signal) = cancellation();
        let backoff = config.requeue_backoff;

        let handles = receivers
            .into_iter()
            .enumerate()
            .map(|(index, rx)| {
                let reconciler = Arc::clone(&reconciler);
                let queue = queue.clone();
                let signal = signal.clone();
                tokio::spawn(worker_loop(index, reconciler, queue, rx, signal, backoff))
            })
            .collect();

        info!(workers = config.workers, "controller runtime started");
        Self {
            cancel,
            handles,
            queue,
            reconciler,
        }
    }

    /// The trigger queue feeding this runtime.
    pub fn queue(&self) -> TriggerSender {
        self.queue.clone()
    }

    /// Whether the runtime can be reported ready. A failed watch
    /// registration leaves the controller blind to dependency changes,
    /// so it marks the runtime unhealthy.
    pub fn is_healthy(&self) -> bool {
        !self.reconciler.watch_degraded()
    }

    /// Fire cancellation and wait for every worker to drain.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if handle.await.is_err() {
                warn!("worker task aborted during shutdown");
            }
        }
        info!("controller runtime stopped");
    }
}

async fn worker_loop(
    index: usize,
    reconciler: Arc<Reconciler>,
    queue: TriggerSender,
    mut rx: mpsc::Receiver<ObjectKey>,
    signal: Cancellation,
    backoff: Duration,
) {
    debug!(worker = index, "worker started");
    loop {
        tokio::select! {
            () = signal.cancelled() => break,
            trigger = rx.recv() => {
                let Some(key) = trigger else { break };
                match reconciler.process(key.clone(), signal.clone()).await {
                    Outcome::Done => {}
                    Outcome::Requeue => {
                        let queue = queue.clone();
                        // Sleep off the worker so the queue keeps draining.
                        tokio::spawn(async move {
                            tokio::time::sleep(backoff).await;
                            queue.enqueue_wait(key).await;
                        });
                    }
                }
            }
        }
    }
    debug!(worker = index, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocket_api::PocketSet;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new(PocketSet::collection_type(), "default", name)
    }

    #[tokio::test]
    async fn test_same_key_routes_to_same_worker() {
        let (queue, _receivers) = TriggerSender::channels(4, 8);
        let first = queue.route(&key("v1-validator1"));
        let second = queue.route(&key("v1-validator1"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_enqueue_delivers_to_routed_worker() {
        let (queue, mut receivers) = TriggerSender::channels(2, 8);
        let k = key("v1-validator1");
        let worker = queue.route(&k);
        queue.enqueue(k.clone());

        let received = receivers[worker].try_recv().ok();
        assert_eq!(received, Some(k));
    }

    #[tokio::test]
    async fn test_full_queue_drops_trigger() {
        let (queue, mut receivers) = TriggerSender::channels(1, 1);
        queue.enqueue(key("a"));
        queue.enqueue(key("a"));

        assert!(receivers[0].try_recv().is_ok());
        assert!(receivers[0].try_recv().is_err());
    }

    #[tokio::test]
    async fn test_enqueue_wait_delivers_when_queue_is_full() {
        let (queue, mut receivers) = TriggerSender::channels(1, 1);
        queue.enqueue(key("a"));

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue_wait(key("b")).await })
        };

        assert_eq!(receivers[0].recv().await, Some(key("a")));
        assert_eq!(receivers[0].recv().await, Some(key("b")));
        assert!(waiter.await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_workers_clamps_to_one() {
        let (queue, receivers) = TriggerSender::channels(0, 0);
        assert_eq!(receivers.len(), 1);
        queue.enqueue(key("a"));
    }
}
