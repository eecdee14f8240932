//! Evaluation loop for a single resource.

use crate::error::{EvaluationPhase, OperatorError, OperatorResult};
use crate::store::{ResourceKey, ResourceStore, StoreError};
use pause_core::providers::Clock;
use pause_core::{CoreError, DecisionEngine, Outcome, Reason, state};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Default number of attempts per evaluation: the first plus one retry on
/// conflict.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Result of evaluating one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// What happened to the resource.
    pub outcome: Outcome,
    /// Why, `None` if the resource no longer exists.
    pub reason: Option<Reason>,
    /// Evaluate again after this long, if set.
    pub requeue_after: Option<Duration>,
}

impl Evaluation {
    fn gone() -> Self {
        Self {
            outcome: Outcome::Unchanged,
            reason: None,
            requeue_after: None,
        }
    }
}

/// Runs fetch, decode, decide and mutate for a resource.
///
/// Holds no per-resource state. The caller must not evaluate the same
/// resource concurrently; distinct resources may be evaluated in parallel.
pub struct PauseReconciler<S> {
    store: S,
    engine: DecisionEngine,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl<S: ResourceStore> PauseReconciler<S> {
    /// Create a reconciler.
    pub fn new(store: S, engine: DecisionEngine, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            engine,
            clock,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set how many times an evaluation is attempted when updates conflict.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Evaluate a resource and apply any transition.
    ///
    /// A resource that no longer exists is a success with no requeue. On an
    /// update conflict the whole evaluation restarts from a fresh read, up to
    /// the configured number of attempts.
    pub async fn evaluate(&self, key: &ResourceKey) -> OperatorResult<Evaluation> {
        let span = tracing::info_span!("evaluate", resource = %key);
        async {
            let start = Instant::now();
            tracing::debug!("Start evaluation");

            let mut attempt = 1;
            let result = loop {
                match self.evaluate_once(key).await {
                    Err(Attempt::Conflict) if attempt < self.max_attempts => {
                        tracing::debug!(attempt, "Update conflict, retrying from a fresh read");
                        attempt += 1;
                    }
                    Err(Attempt::Conflict) => {
                        break Err(OperatorError::Conflict {
                            resource: key.clone(),
                            attempts: attempt,
                        });
                    }
                    Err(Attempt::Failed(err)) => break Err(err),
                    Ok(evaluation) => break Ok(evaluation),
                }
            };

            tracing::debug!(elapsed = ?start.elapsed(), "Finish evaluation");
            result
        }
        .instrument(span)
        .await
    }

    async fn evaluate_once(&self, key: &ResourceKey) -> Result<Evaluation, Attempt> {
        let resource = match self.store.get(key).await {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                tracing::debug!("Resource no longer exists");
                return Ok(Evaluation::gone());
            }
            Err(source) => {
                return Err(Attempt::Failed(OperatorError::Transient {
                    resource: key.clone(),
                    phase: EvaluationPhase::Fetch,
                    source,
                }));
            }
        };

        let pause_state = state::decode(&resource).map_err(|source| {
            Attempt::Failed(OperatorError::MalformedState {
                resource: key.clone(),
                source,
            })
        })?;

        let decision = self
            .engine
            .decide(&resource, pause_state.as_ref(), self.clock.now())
            .map_err(|source| decision_error(key, EvaluationPhase::Decide, source))?;

        let evaluation = Evaluation {
            outcome: decision.outcome,
            reason: Some(decision.reason),
            requeue_after: decision.requeue_after,
        };

        let Some(mutation) = decision.mutation() else {
            tracing::debug!(
                reason = %decision.reason,
                requeue_after = ?decision.requeue_after,
                "No transition"
            );
            return Ok(evaluation);
        };

        let mut updated = resource;
        mutation
            .apply_to(&mut updated)
            .map_err(|source| decision_error(key, EvaluationPhase::Mutate, source))?;

        match self.store.replace(key, &updated).await {
            Ok(_) => {}
            Err(StoreError::Conflict) => return Err(Attempt::Conflict),
            Err(StoreError::NotFound) => {
                tracing::debug!("Resource deleted before update");
                return Ok(Evaluation::gone());
            }
            Err(source) => {
                return Err(Attempt::Failed(OperatorError::Transient {
                    resource: key.clone(),
                    phase: EvaluationPhase::Mutate,
                    source,
                }));
            }
        }

        match decision.outcome {
            Outcome::Pause => tracing::info!(reason = %decision.reason, "Paused resource"),
            Outcome::Unpause => tracing::info!(reason = %decision.reason, "Unpaused resource"),
            Outcome::Unchanged => {}
        }
        Ok(evaluation)
    }
}

/// Failure of a single attempt.
enum Attempt {
    Conflict,
    Failed(OperatorError),
}

fn decision_error(key: &ResourceKey, phase: EvaluationPhase, source: CoreError) -> Attempt {
    Attempt::Failed(OperatorError::Decision {
        resource: key.clone(),
        phase,
        source,
    })
}
