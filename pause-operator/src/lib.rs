//! Kubernetes controller that pauses reconciliation of settled resources.
//!
//! Watches one resource kind. A resource whose `Ready` and `Synced`
//! conditions are both true gets the `crossplane.io/paused` annotation, so its
//! own controller stops reconciling it. The resource is unpaused again when
//! its desired state changes or, if configured, after a jittered poll
//! interval.
//!
//! - [`config`]: what to watch and the timing policy
//! - [`store`]: reading and conditionally replacing resources
//! - [`controller`]: the evaluation loop and kube-runtime glue
//! - [`observability`]: structured logging

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod error;
pub mod observability;
pub mod store;

pub use config::OperatorConfig;
pub use controller::{ControllerContext, Evaluation, PauseReconciler};
pub use error::{EvaluationPhase, OperatorError, OperatorResult};
pub use store::{KubeStore, MemoryStore, ResourceKey, ResourceStore, StoreError};
