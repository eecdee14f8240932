//! Pause decision engine for resources reconciled by an external controller.
//!
//! A managed resource that has settled (its `Ready` and `Synced` conditions
//! are both true) can be excluded from its controller's reconcile loop by
//! setting the controller's pause annotation. This crate decides when to do
//! that and when to undo it:
//!
//! - [`state`]: the [`PauseState`] record persisted on the resource itself
//! - [`drift`]: detects desired-state changes made while a resource is paused
//! - [`scheduler`]: jittered forced-unpause timestamps
//! - [`engine`]: the [`DecisionEngine`] state machine
//!
//! The crate has no Kubernetes dependency. Resources are handled as generic
//! JSON documents through [`ManagedResource`], so any resource kind works.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pause_core::{DecisionEngine, ManagedResource, Outcome, PausePolicy};
//! use pause_core::providers::MockRng;
//!
//! let resource = ManagedResource::from_value(serde_json::json!({
//!     "metadata": { "name": "subnet-a" },
//!     "spec": { "forProvider": { "cidrBlock": "10.0.0.0/24" } },
//!     "status": { "conditions": [
//!         { "type": "Ready", "status": "True" },
//!         { "type": "Synced", "status": "True" }
//!     ] }
//! }))
//! .unwrap();
//!
//! let engine = DecisionEngine::new(PausePolicy::default(), Arc::new(MockRng::seeded(7)));
//! let decision = engine.decide(&resource, None, chrono::Utc::now()).unwrap();
//! assert_eq!(decision.outcome, Outcome::Pause);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod drift;
pub mod engine;
pub mod error;
pub mod providers;
pub mod resource;
pub mod scheduler;
pub mod state;

pub use engine::{Decision, DecisionEngine, Mutation, Outcome, PausePolicy, Reason};
pub use error::{CoreError, CoreResult};
pub use resource::{Condition, ConditionStatus, ManagedResource};
pub use scheduler::UnpauseScheduler;
pub use state::{PAUSE_STATE_ANNOTATION, PAUSED_ANNOTATION, PauseState};
