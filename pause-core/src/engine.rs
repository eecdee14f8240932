//! The pause/unpause state machine.
//!
//! [`DecisionEngine::decide`] is a pure function of the resource, its decoded
//! [`PauseState`] and the current time. It returns a [`Decision`] naming the
//! outcome, the reason, an optional re-check delay and, for transitions, the
//! [`Mutation`] the caller must write back in a single update.
//!
//! Rules, first match wins:
//!
//! 1. Marker set but no state: paused by someone else, leave it alone.
//! 2. Deleting: unpause if paused, never pause.
//! 3. Paused: unpause on drift, or once the poll interval elapsed.
//! 4. Unpaused: wait out the frozen window, then pause once both `Ready`
//!    and `Synced` are true.

use crate::drift;
use crate::error::{CoreError, CoreResult};
use crate::providers::RngProvider;
use crate::resource::{CONDITION_READY, CONDITION_SYNCED, ManagedResource};
use crate::scheduler::{UnpauseScheduler, add_duration, remaining};
use crate::state::{self, PAUSE_STATE_ANNOTATION, PAUSED_ANNOTATION, PAUSED_VALUE, PauseState};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default minimum time a resource stays unpaused before it may be paused again.
///
/// The external controller needs time to pick up a change after an unpause;
/// pausing again immediately could hide the change from it.
pub const DEFAULT_FROZEN_DURATION: Duration = Duration::from_secs(5 * 60);

/// Timing policy for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PausePolicy {
    /// Minimum unpaused dwell time before pausing again.
    pub frozen_duration: Duration,
    /// Maximum paused dwell time before a forced unpause. `None` disables it.
    pub unpause_poll_interval: Option<Duration>,
}

impl Default for PausePolicy {
    fn default() -> Self {
        Self {
            frozen_duration: DEFAULT_FROZEN_DURATION,
            unpause_poll_interval: None,
        }
    }
}

/// What the engine decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No write needed.
    Unchanged,
    /// Add the pause marker.
    Pause,
    /// Remove the pause marker.
    Unpause,
}

/// Why the engine decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The marker was set by something other than this engine.
    PausedExternally,
    /// The resource is being deleted.
    Deleted,
    /// The desired state changed while paused.
    Updated,
    /// The forced-unpause deadline passed.
    PollIntervalElapsed,
    /// Paused until the forced-unpause deadline.
    AwaitingPollInterval,
    /// Paused with no deadline.
    HeldPaused,
    /// Recently unpaused.
    FrozenWindow,
    /// `Ready` is missing or not true.
    NotReady,
    /// `Synced` is missing or not true.
    NotSynced,
    /// Both `Ready` and `Synced` are true.
    ReadyAndSynced,
    /// The state already matches the requested transition.
    AlreadyInState,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PausedExternally => "paused externally",
            Self::Deleted => "resource deleted",
            Self::Updated => "resource updated",
            Self::PollIntervalElapsed => "poll interval elapsed",
            Self::AwaitingPollInterval => "waiting for poll interval",
            Self::HeldPaused => "held paused",
            Self::FrozenWindow => "frozen window",
            Self::NotReady => "not ready",
            Self::NotSynced => "not synced",
            Self::ReadyAndSynced => "ready and synced",
            Self::AlreadyInState => "already in state",
        };
        f.write_str(text)
    }
}

/// Annotation changes for a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Set the marker and store `state`.
    Pause(PauseState),
    /// Remove the marker and store `state`.
    Unpause(PauseState),
}

impl Mutation {
    /// The state written by this mutation.
    pub fn state(&self) -> &PauseState {
        match self {
            Self::Pause(state) | Self::Unpause(state) => state,
        }
    }

    /// Apply the marker and state annotation to `resource`.
    ///
    /// Both annotations are changed together; the caller writes the result
    /// in one conditional update.
    pub fn apply_to(&self, resource: &mut ManagedResource) -> CoreResult<()> {
        let encoded = state::encode(self.state())?;
        match self {
            Self::Pause(_) => resource.set_annotation(PAUSED_ANNOTATION, PAUSED_VALUE),
            Self::Unpause(_) => {
                resource.remove_annotation(PAUSED_ANNOTATION);
            }
        }
        resource.set_annotation(PAUSE_STATE_ANNOTATION, encoded);
        Ok(())
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// What to do.
    pub outcome: Outcome,
    /// Why.
    pub reason: Reason,
    /// Evaluate again after this long, if set.
    pub requeue_after: Option<Duration>,
    mutation: Option<Mutation>,
}

impl Decision {
    fn unchanged(reason: Reason, requeue_after: Option<Duration>) -> Self {
        Self {
            outcome: Outcome::Unchanged,
            reason,
            requeue_after,
            mutation: None,
        }
    }

    /// The write required by this decision, if any.
    pub fn mutation(&self) -> Option<&Mutation> {
        self.mutation.as_ref()
    }

    /// Whether the decision requires a write.
    pub fn is_transition(&self) -> bool {
        self.mutation.is_some()
    }
}

/// The pause/unpause state machine.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    policy: PausePolicy,
    scheduler: UnpauseScheduler,
}

impl DecisionEngine {
    /// Create an engine with the given policy, drawing jitter from `rng`.
    pub fn new(policy: PausePolicy, rng: Arc<dyn RngProvider>) -> Self {
        Self {
            policy,
            scheduler: UnpauseScheduler::new(rng),
        }
    }

    /// The configured policy.
    pub fn policy(&self) -> &PausePolicy {
        &self.policy
    }

    /// Decode the pause state from `resource` and decide.
    pub fn evaluate(&self, resource: &ManagedResource, now: DateTime<Utc>) -> CoreResult<Decision> {
        let state = state::decode(resource)?;
        self.decide(resource, state.as_ref(), now)
    }

    /// Decide what to do with `resource` given its decoded `state`.
    pub fn decide(
        &self,
        resource: &ManagedResource,
        state: Option<&PauseState>,
        now: DateTime<Utc>,
    ) -> CoreResult<Decision> {
        let marker_set = resource
            .annotation(PAUSED_ANNOTATION)
            .is_some_and(state::is_paused_value);

        let state = match state {
            Some(state) => Cow::Borrowed(state),
            None if marker_set => {
                return Ok(Decision::unchanged(Reason::PausedExternally, None));
            }
            None => Cow::Owned(PauseState::default()),
        };

        if resource.is_deleting() {
            return Ok(if state.paused {
                self.ensure_unpaused(&state, now, Reason::Deleted)
            } else {
                Decision::unchanged(Reason::Deleted, None)
            });
        }

        if state.paused {
            self.decide_paused(resource, &state, now)
        } else {
            self.decide_unpaused(resource, &state, now)
        }
    }

    fn decide_paused(
        &self,
        resource: &ManagedResource,
        state: &PauseState,
        now: DateTime<Utc>,
    ) -> CoreResult<Decision> {
        let snapshot = state
            .snapshot
            .as_ref()
            .ok_or_else(|| CoreError::InvalidState("paused state has no snapshot".into()))?;

        if drift::is_updated(snapshot, resource) {
            return Ok(self.ensure_unpaused(state, now, Reason::Updated));
        }

        let Some(interval) = self.policy.unpause_poll_interval else {
            return Ok(Decision::unchanged(Reason::HeldPaused, None));
        };

        let due = match (state.scheduled_unpause_time, state.last_pause_time) {
            (Some(scheduled), _) => scheduled,
            (None, Some(paused_at)) => add_duration(paused_at, interval),
            (None, None) => {
                return Err(CoreError::InvalidState(
                    "paused state has no lastPauseTime".into(),
                ));
            }
        };

        if now >= due {
            Ok(self.ensure_unpaused(state, now, Reason::PollIntervalElapsed))
        } else {
            Ok(Decision::unchanged(
                Reason::AwaitingPollInterval,
                Some(remaining(now, due)),
            ))
        }
    }

    fn decide_unpaused(
        &self,
        resource: &ManagedResource,
        state: &PauseState,
        now: DateTime<Utc>,
    ) -> CoreResult<Decision> {
        if let Some(unpaused_at) = state.last_unpause_time {
            let thaw = add_duration(unpaused_at, self.policy.frozen_duration);
            if now < thaw {
                return Ok(Decision::unchanged(
                    Reason::FrozenWindow,
                    Some(remaining(now, thaw)),
                ));
            }
        }

        if !resource
            .condition(CONDITION_READY)?
            .is_some_and(|c| c.is_true())
        {
            return Ok(Decision::unchanged(Reason::NotReady, None));
        }
        if !resource
            .condition(CONDITION_SYNCED)?
            .is_some_and(|c| c.is_true())
        {
            return Ok(Decision::unchanged(Reason::NotSynced, None));
        }

        Ok(self.ensure_paused(resource, state, now, Reason::ReadyAndSynced))
    }

    /// Transition to paused unless `state` already is.
    pub fn ensure_paused(
        &self,
        resource: &ManagedResource,
        state: &PauseState,
        now: DateTime<Utc>,
        reason: Reason,
    ) -> Decision {
        if state.paused {
            return Decision::unchanged(Reason::AlreadyInState, None);
        }

        let scheduled_unpause_time = self
            .policy
            .unpause_poll_interval
            .map(|interval| self.scheduler.schedule(now, interval));

        let next = PauseState {
            paused: true,
            snapshot: Some(resource.without_markers()),
            last_pause_time: Some(now),
            last_unpause_time: state.last_unpause_time,
            scheduled_unpause_time,
        };

        Decision {
            outcome: Outcome::Pause,
            reason,
            requeue_after: scheduled_unpause_time.map(|at| remaining(now, at)),
            mutation: Some(Mutation::Pause(next)),
        }
    }

    /// Transition to unpaused unless `state` already is.
    pub fn ensure_unpaused(&self, state: &PauseState, now: DateTime<Utc>, reason: Reason) -> Decision {
        if !state.paused {
            return Decision::unchanged(Reason::AlreadyInState, None);
        }

        let next = PauseState {
            paused: false,
            snapshot: None,
            last_pause_time: state.last_pause_time,
            last_unpause_time: Some(now),
            scheduled_unpause_time: None,
        };

        Decision {
            outcome: Outcome::Unpause,
            reason,
            requeue_after: Some(self.policy.frozen_duration),
            mutation: Some(Mutation::Unpause(next)),
        }
    }
}
