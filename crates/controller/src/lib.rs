//! Reconciliation control loop for Pocket validator workloads.
//!
//! Keeps a declared workload (`PocketValidator`) consistent with the child
//! resources derived from it, scoped under its owning collection
//! (`PocketSet`). A reconcile invocation resolves the collection, registers
//! a change watch on the collection type exactly once, generates and
//! mutates the child descriptors, and drives them through an ordered phase
//! state machine against the external store. Invocations for distinct
//! workloads run concurrently on a queue-fed worker pool; the watch
//! registry is the only cross-invocation shared state.

pub mod config;
pub mod context;
pub mod error;
pub mod phase;
pub mod ready;
pub mod reconciler;
pub mod resolver;
pub mod watch;
pub mod worker;

/// Finalizer attached to workloads so owned child resources are cleaned up
/// before the workload itself is removed.
pub const FINALIZER: &str = "nodes.pokt.network/finalizer";

pub use config::{CollectionScope, ControllerConfig};
pub use context::{cancellation, CancelHandle, Cancellation, Request};
pub use error::{Disposition, Error, Result};
pub use phase::{Phase, PhaseExecutor, PhaseResult};
pub use ready::{AppliedReadiness, ReadinessCheck};
pub use reconciler::{Outcome, Reconciler};
pub use watch::WatchRegistry;
pub use worker::{ControllerRuntime, TriggerSender};
