//! Evaluation loop tests against the in-memory store.

use chrono::{DateTime, Utc};
use pause_core::providers::{Clock, MockClock, MockRng};
use pause_core::{
    DecisionEngine, ManagedResource, Outcome, PAUSE_STATE_ANNOTATION, PAUSED_ANNOTATION,
    PausePolicy, PauseState, Reason,
};
use pause_operator::controller::PauseReconciler;
use pause_operator::error::{EvaluationPhase, OperatorError};
use pause_operator::store::{MemoryStore, ResourceKey};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const START: &str = "2024-03-01T12:00:00Z";

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<MockClock>,
    reconciler: PauseReconciler<Arc<MemoryStore>>,
}

impl Harness {
    fn new(policy: PausePolicy) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(MockClock::fixed(START));
        let engine = DecisionEngine::new(policy, Arc::new(MockRng::fixed(0.5)));
        let reconciler = PauseReconciler::new(store.clone(), engine, clock.clone());
        Self {
            store,
            clock,
            reconciler,
        }
    }

    fn state(&self, key: &ResourceKey) -> Option<PauseState> {
        pause_core::state::decode(&self.store.current(key).unwrap()).unwrap()
    }

    fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn marker(&self, key: &ResourceKey) -> Option<String> {
        self.store
            .current(key)
            .unwrap()
            .annotation(PAUSED_ANNOTATION)
            .map(str::to_string)
    }
}

fn conditions(ready: &str, synced: &str) -> Value {
    json!([
        { "type": "Ready", "status": ready, "reason": "Available" },
        { "type": "Synced", "status": synced, "reason": "ReconcileSuccess" }
    ])
}

fn subnet(ready: &str, synced: &str) -> ManagedResource {
    ManagedResource::from_value(json!({
        "apiVersion": "ec2.aws.crossplane.io/v1beta1",
        "kind": "Subnet",
        "metadata": {
            "name": "subnet-a",
            "namespace": "crossplane-system",
            "labels": { "team": "network" }
        },
        "spec": { "forProvider": { "cidrBlock": "10.0.0.0/24", "region": "eu-west-1" } },
        "status": { "conditions": conditions(ready, synced) }
    }))
    .unwrap()
}

fn set_cidr(resource: &mut ManagedResource, cidr: &str) {
    let mut value = resource.clone().into_value();
    value["spec"]["forProvider"]["cidrBlock"] = json!(cidr);
    *resource = ManagedResource::from_value(value).unwrap();
}

fn mark_deleted(resource: &mut ManagedResource) {
    let mut value = resource.clone().into_value();
    value["metadata"]["deletionTimestamp"] = json!("2024-03-01T12:30:00Z");
    *resource = ManagedResource::from_value(value).unwrap();
}

#[tokio::test]
async fn pauses_ready_and_synced_resource() {
    let h = Harness::new(PausePolicy::default());
    let key = h.store.insert(subnet("True", "True"));

    let evaluation = h.reconciler.evaluate(&key).await.unwrap();

    assert_eq!(evaluation.outcome, Outcome::Pause);
    assert_eq!(evaluation.reason, Some(Reason::ReadyAndSynced));
    assert_eq!(evaluation.requeue_after, None);
    assert_eq!(h.marker(&key).as_deref(), Some("true"));

    let state = h.state(&key).unwrap();
    assert!(state.paused);
    assert!(state.snapshot.is_some());
    assert_eq!(state.last_pause_time, Some(h.clock_now()));
    assert_eq!(state.scheduled_unpause_time, None);
}

#[tokio::test]
async fn unpauses_on_desired_state_change() {
    let h = Harness::new(PausePolicy::default());
    let key = h.store.insert(subnet("True", "True"));
    h.reconciler.evaluate(&key).await.unwrap();

    h.clock.advance(Duration::from_secs(600));
    assert!(h.store.modify(&key, |r| set_cidr(r, "10.0.1.0/24")));

    let evaluation = h.reconciler.evaluate(&key).await.unwrap();

    assert_eq!(evaluation.outcome, Outcome::Unpause);
    assert_eq!(evaluation.reason, Some(Reason::Updated));
    assert_eq!(evaluation.requeue_after, Some(Duration::from_secs(300)));
    assert_eq!(h.marker(&key), None);

    let state = h.state(&key).unwrap();
    assert!(!state.paused);
    assert!(state.snapshot.is_none());
    assert_eq!(state.last_unpause_time, Some(h.clock_now()));
}

#[tokio::test]
async fn stays_paused_without_poll_interval() {
    let h = Harness::new(PausePolicy::default());
    let key = h.store.insert(subnet("True", "True"));
    h.reconciler.evaluate(&key).await.unwrap();
    let paused = h.store.current(&key).unwrap();

    h.clock.advance(Duration::from_secs(30 * 24 * 3600));
    let evaluation = h.reconciler.evaluate(&key).await.unwrap();

    assert_eq!(evaluation.outcome, Outcome::Unchanged);
    assert_eq!(evaluation.reason, Some(Reason::HeldPaused));
    assert_eq!(evaluation.requeue_after, None);
    assert_eq!(h.store.current(&key).unwrap(), paused);
}

#[tokio::test]
async fn deletion_unpauses_paused_resource() {
    let h = Harness::new(PausePolicy {
        unpause_poll_interval: Some(Duration::from_secs(3600)),
        ..PausePolicy::default()
    });
    let key = h.store.insert(subnet("True", "True"));
    h.reconciler.evaluate(&key).await.unwrap();

    assert!(h.store.modify(&key, mark_deleted));
    let evaluation = h.reconciler.evaluate(&key).await.unwrap();

    assert_eq!(evaluation.outcome, Outcome::Unpause);
    assert_eq!(evaluation.reason, Some(Reason::Deleted));
    assert_eq!(h.marker(&key), None);
    assert!(!h.state(&key).unwrap().paused);
}

#[tokio::test]
async fn poll_interval_forces_unpause_after_jittered_deadline() {
    let h = Harness::new(PausePolicy {
        unpause_poll_interval: Some(Duration::from_secs(3600)),
        ..PausePolicy::default()
    });
    let key = h.store.insert(subnet("True", "True"));

    let evaluation = h.reconciler.evaluate(&key).await.unwrap();
    // 0.5 of a 10% jitter on one hour.
    assert_eq!(evaluation.requeue_after, Some(Duration::from_secs(3600 + 180)));

    h.clock.advance(Duration::from_secs(3600));
    let evaluation = h.reconciler.evaluate(&key).await.unwrap();
    assert_eq!(evaluation.reason, Some(Reason::AwaitingPollInterval));
    assert_eq!(evaluation.requeue_after, Some(Duration::from_secs(180)));

    h.clock.advance(Duration::from_secs(180));
    let evaluation = h.reconciler.evaluate(&key).await.unwrap();
    assert_eq!(evaluation.outcome, Outcome::Unpause);
    assert_eq!(evaluation.reason, Some(Reason::PollIntervalElapsed));
}

#[tokio::test]
async fn frozen_window_delays_repause() {
    let h = Harness::new(PausePolicy::default());
    let key = h.store.insert(subnet("True", "True"));
    h.reconciler.evaluate(&key).await.unwrap();
    assert!(h.store.modify(&key, |r| set_cidr(r, "10.0.2.0/24")));
    h.reconciler.evaluate(&key).await.unwrap();

    h.clock.advance(Duration::from_secs(240));
    let evaluation = h.reconciler.evaluate(&key).await.unwrap();
    assert_eq!(evaluation.outcome, Outcome::Unchanged);
    assert_eq!(evaluation.reason, Some(Reason::FrozenWindow));
    assert_eq!(evaluation.requeue_after, Some(Duration::from_secs(60)));

    h.clock.advance(Duration::from_secs(60));
    let evaluation = h.reconciler.evaluate(&key).await.unwrap();
    assert_eq!(evaluation.outcome, Outcome::Pause);
}

#[tokio::test]
async fn not_ready_resource_is_left_alone() {
    let h = Harness::new(PausePolicy::default());
    let key = h.store.insert(subnet("False", "True"));
    let evaluation = h.reconciler.evaluate(&key).await.unwrap();
    assert_eq!(evaluation.reason, Some(Reason::NotReady));

    let key = h.store.insert(subnet("True", "Unknown"));
    let evaluation = h.reconciler.evaluate(&key).await.unwrap();
    assert_eq!(evaluation.reason, Some(Reason::NotSynced));
    assert_eq!(h.store.replace_count(), 0);
}

#[tokio::test]
async fn externally_paused_resource_is_not_adopted() {
    let h = Harness::new(PausePolicy::default());
    let mut resource = subnet("True", "True");
    resource.set_annotation(PAUSED_ANNOTATION, "true");
    let key = h.store.insert(resource);

    let evaluation = h.reconciler.evaluate(&key).await.unwrap();

    assert_eq!(evaluation.outcome, Outcome::Unchanged);
    assert_eq!(evaluation.reason, Some(Reason::PausedExternally));
    assert_eq!(h.state(&key), None);
    assert_eq!(h.store.replace_count(), 0);
}

#[tokio::test]
async fn repeated_evaluation_is_idempotent() {
    let h = Harness::new(PausePolicy::default());
    let key = h.store.insert(subnet("True", "True"));

    h.reconciler.evaluate(&key).await.unwrap();
    let after_first = h.store.current(&key).unwrap();
    let evaluation = h.reconciler.evaluate(&key).await.unwrap();

    assert_eq!(evaluation.outcome, Outcome::Unchanged);
    assert_eq!(h.store.current(&key).unwrap(), after_first);
    assert_eq!(h.store.replace_count(), 1);
}

#[tokio::test]
async fn missing_resource_is_not_an_error() {
    let h = Harness::new(PausePolicy::default());
    let key = ResourceKey::namespaced("crossplane-system", "gone");

    let evaluation = h.reconciler.evaluate(&key).await.unwrap();

    assert_eq!(evaluation.outcome, Outcome::Unchanged);
    assert_eq!(evaluation.reason, None);
    assert_eq!(evaluation.requeue_after, None);
}

#[tokio::test]
async fn conflict_is_retried_from_fresh_read() {
    let h = Harness::new(PausePolicy::default());
    let key = h.store.insert(subnet("True", "True"));
    h.store.race_next_replaces(1);

    let evaluation = h.reconciler.evaluate(&key).await.unwrap();

    assert_eq!(evaluation.outcome, Outcome::Pause);
    assert_eq!(h.store.get_count(), 2);
    assert_eq!(h.store.replace_count(), 2);
    assert_eq!(h.marker(&key).as_deref(), Some("true"));
}

#[tokio::test]
async fn conflict_gives_up_after_max_attempts() {
    let h = Harness::new(PausePolicy::default());
    let key = h.store.insert(subnet("True", "True"));
    h.store.race_next_replaces(5);

    let err = h.reconciler.evaluate(&key).await.unwrap_err();

    assert!(matches!(err, OperatorError::Conflict { attempts: 2, .. }));
    assert!(err.is_retryable());
    assert_eq!(h.store.replace_count(), 2);
    assert_eq!(h.marker(&key), None);
}

#[tokio::test]
async fn single_attempt_reconciler_does_not_retry() {
    let store = Arc::new(MemoryStore::new());
    let engine = DecisionEngine::new(PausePolicy::default(), Arc::new(MockRng::seeded(1)));
    let reconciler = PauseReconciler::new(store.clone(), engine, Arc::new(MockClock::fixed(START)))
        .with_max_attempts(1);
    let key = store.insert(subnet("True", "True"));
    store.race_next_replaces(1);

    let err = reconciler.evaluate(&key).await.unwrap_err();

    assert!(matches!(err, OperatorError::Conflict { attempts: 1, .. }));
    assert_eq!(store.replace_count(), 1);
}

#[tokio::test]
async fn malformed_state_is_reported_without_writing() {
    let h = Harness::new(PausePolicy::default());
    let mut resource = subnet("True", "True");
    resource.set_annotation(PAUSE_STATE_ANNOTATION, "{not json");
    let key = h.store.insert(resource);

    let err = h.reconciler.evaluate(&key).await.unwrap_err();

    assert!(matches!(err, OperatorError::MalformedState { .. }));
    assert_eq!(err.phase(), Some(EvaluationPhase::Decode));
    assert!(!err.is_retryable());
    assert_eq!(h.store.replace_count(), 0);
}

#[tokio::test]
async fn store_failures_are_transient() {
    let h = Harness::new(PausePolicy::default());
    let key = h.store.insert(subnet("True", "True"));

    h.store.fail_next_gets(1);
    let err = h.reconciler.evaluate(&key).await.unwrap_err();
    assert_eq!(err.phase(), Some(EvaluationPhase::Fetch));
    assert!(err.is_retryable());

    h.store.fail_next_replaces(1);
    let err = h.reconciler.evaluate(&key).await.unwrap_err();
    assert_eq!(err.phase(), Some(EvaluationPhase::Mutate));
    assert!(matches!(err, OperatorError::Transient { .. }));
    assert_eq!(h.marker(&key), None);

    let evaluation = h.reconciler.evaluate(&key).await.unwrap();
    assert_eq!(evaluation.outcome, Outcome::Pause);
}
