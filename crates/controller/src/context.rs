//! Per-invocation request context and cancellation plumbing.

use tokio::sync::watch;
use tracing::Span;

use pocket_api::{ObjectKey, PocketSet, PocketValidator, Workload};

/// Cancellation signal observed by in-flight reconcile invocations.
///
/// Cheap to clone; all clones observe the same signal. If every
/// [`CancelHandle`] is dropped without firing, the signal never triggers.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

/// Handle used by the controller runtime to fire cancellation.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Create a linked cancel handle and cancellation signal.
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl CancelHandle {
    /// Fire the cancellation signal.
    pub fn cancel(&self) {
        // Receivers may already be gone during shutdown.
        let _ = self.tx.send(true);
    }
}

impl Cancellation {
    /// A signal that never fires, for offline and test use.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without firing: never cancelled.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Ephemeral context for one reconcile invocation.
///
/// Owns the resolved workload and collection, the cancellation signal, and
/// a structured logging span. Discarded when the invocation ends; never
/// shared across invocations.
pub struct Request {
    pub workload: PocketValidator,
    pub collection: PocketSet,
    pub cancel: Cancellation,
    pub span: Span,
}

impl Request {
    /// Build a request context for a resolved workload and collection.
    pub fn new(workload: PocketValidator, collection: PocketSet, cancel: Cancellation) -> Self {
        let span = tracing::info_span!(
            "reconcile",
            kind = %workload.type_ref().kind,
            name = %workload.metadata.name,
            namespace = %workload.metadata.namespace,
        );

        Self {
            workload,
            collection,
            cancel,
            span,
        }
    }

    /// The store address of the workload under reconciliation.
    pub fn workload_key(&self) -> ObjectKey {
        self.workload.key()
    }
}
