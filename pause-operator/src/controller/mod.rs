//! Kubernetes controller glue for the pause reconciler.
//!
//! [`PauseReconciler`] evaluates one resource against a [`ResourceStore`].
//! This module adapts it to kube-runtime: [`reconcile`] turns a watched
//! object into an evaluation and [`error_policy`] decides when failed
//! evaluations are retried.
//!
//! ```ignore
//! use pause_operator::controller::{ControllerContext, error_policy, reconcile};
//!
//! Controller::new_with(api, watcher_config, api_resource)
//!     .run(reconcile, error_policy, context)
//!     .for_each(|_| futures::future::ready(()))
//!     .await;
//! ```

mod reconciler;

pub use reconciler::{DEFAULT_MAX_ATTEMPTS, Evaluation, PauseReconciler};

use crate::error::{OperatorError, OperatorResult};
use crate::store::{ResourceKey, ResourceStore};
use kube::ResourceExt;
use kube::api::DynamicObject;
use kube::runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;

/// Shared context for the controller.
pub struct ControllerContext<S> {
    /// Evaluates watched resources.
    pub reconciler: PauseReconciler<S>,
    /// Requeue delay after a retryable failure.
    pub error_requeue: Duration,
}

impl<S: ResourceStore> ControllerContext<S> {
    /// Create a new controller context.
    pub fn new(reconciler: PauseReconciler<S>, error_requeue: Duration) -> Self {
        Self {
            reconciler,
            error_requeue,
        }
    }
}

impl From<Evaluation> for Action {
    fn from(evaluation: Evaluation) -> Self {
        match evaluation.requeue_after {
            Some(delay) => Action::requeue(delay),
            None => Action::await_change(),
        }
    }
}

/// Evaluate a watched object.
///
/// The watch event only identifies the resource; the reconciler reads the
/// current copy itself.
pub async fn reconcile<S: ResourceStore>(
    object: Arc<DynamicObject>,
    ctx: Arc<ControllerContext<S>>,
) -> OperatorResult<Action> {
    let key = ResourceKey {
        namespace: object.namespace(),
        name: object.name_any(),
    };
    let evaluation = ctx.reconciler.evaluate(&key).await?;
    Ok(evaluation.into())
}

/// Handle errors during reconciliation.
///
/// Retryable failures come back after the configured delay. A malformed
/// annotation waits for the resource to change, since evaluating it again
/// would fail the same way.
pub fn error_policy<S: ResourceStore>(
    _object: Arc<DynamicObject>,
    error: &OperatorError,
    ctx: Arc<ControllerContext<S>>,
) -> Action {
    if error.is_retryable() {
        tracing::warn!(error = %error, phase = ?error.phase(), "Evaluation failed, requeueing");
        Action::requeue(ctx.error_requeue)
    } else {
        tracing::error!(error = %error, phase = ?error.phase(), "Evaluation failed");
        Action::await_change()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pause_core::providers::{MockClock, MockRng};
    use pause_core::{DecisionEngine, ManagedResource, PAUSED_ANNOTATION, PausePolicy};
    use serde_json::json;

    fn context(store: Arc<MemoryStore>) -> Arc<ControllerContext<Arc<MemoryStore>>> {
        let clock = Arc::new(MockClock::fixed("2024-03-01T12:00:00Z"));
        let engine = DecisionEngine::new(PausePolicy::default(), Arc::new(MockRng::fixed(0.5)));
        let reconciler = PauseReconciler::new(store, engine, clock);
        Arc::new(ControllerContext::new(reconciler, Duration::from_secs(30)))
    }

    fn watched(name: &str) -> Arc<DynamicObject> {
        let object = serde_json::from_value(json!({
            "apiVersion": "ec2.aws.crossplane.io/v1beta1",
            "kind": "Subnet",
            "metadata": { "name": name }
        }))
        .unwrap();
        Arc::new(object)
    }

    #[tokio::test]
    async fn reconcile_pauses_stable_resource() {
        let store = Arc::new(MemoryStore::new());
        let key = store.insert(
            ManagedResource::from_value(json!({
                "metadata": { "name": "subnet-a" },
                "spec": { "cidrBlock": "10.0.0.0/24" },
                "status": { "conditions": [
                    { "type": "Ready", "status": "True" },
                    { "type": "Synced", "status": "True" }
                ]}
            }))
            .unwrap(),
        );

        let action = reconcile(watched("subnet-a"), context(store.clone()))
            .await
            .unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(
            store.current(&key).unwrap().annotation(PAUSED_ANNOTATION),
            Some("true")
        );
    }

    #[tokio::test]
    async fn reconcile_missing_resource_awaits_change() {
        let store = Arc::new(MemoryStore::new());
        let action = reconcile(watched("gone"), context(store)).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[test]
    fn evaluation_requeue_maps_to_action() {
        let evaluation = Evaluation {
            outcome: pause_core::Outcome::Unchanged,
            reason: Some(pause_core::Reason::FrozenWindow),
            requeue_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(Action::from(evaluation), Action::requeue(Duration::from_secs(60)));
    }

    #[test]
    fn error_policy_requeues_retryable_errors() {
        let ctx = context(Arc::new(MemoryStore::new()));
        let conflict = OperatorError::Conflict {
            resource: ResourceKey::cluster_scoped("subnet-a"),
            attempts: 2,
        };
        assert_eq!(
            error_policy(watched("subnet-a"), &conflict, ctx.clone()),
            Action::requeue(Duration::from_secs(30))
        );

        let invalid = OperatorError::InvalidConfig("bad".into());
        assert_eq!(
            error_policy(watched("subnet-a"), &invalid, ctx),
            Action::await_change()
        );
    }
}
