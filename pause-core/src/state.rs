//! Pause state persisted on the resource itself.
//!
//! The state lives in the [`PAUSE_STATE_ANNOTATION`] annotation as JSON, next
//! to the external controller's [`PAUSED_ANNOTATION`] flag. Both are always
//! written in the same update, so no external store is needed.

use crate::error::{CoreError, CoreResult};
use crate::resource::ManagedResource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annotation the external controller reads to skip reconciling a resource.
pub const PAUSED_ANNOTATION: &str = "crossplane.io/paused";

/// Annotation holding the encoded [`PauseState`].
pub const PAUSE_STATE_ANNOTATION: &str = "pause.reconcile.io/state";

/// The only value of [`PAUSED_ANNOTATION`] this engine writes.
pub const PAUSED_VALUE: &str = "true";

/// Whether an annotation value means "paused".
pub fn is_paused_value(value: &str) -> bool {
    value == PAUSED_VALUE
}

/// Decision record stored in [`PAUSE_STATE_ANNOTATION`].
///
/// `snapshot` and `last_pause_time` are present exactly when `paused` is
/// true; [`decode`] rejects records that break this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseState {
    /// Whether this engine currently holds the resource paused.
    #[serde(alias = "pause")]
    pub paused: bool,

    /// Copy of the resource taken when it was paused, markers removed.
    #[serde(default, alias = "object", skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ManagedResource>,

    /// When the resource was last paused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pause_time: Option<DateTime<Utc>>,

    /// When the resource was last unpaused.
    #[serde(default, alias = "lastUnPauseTime", skip_serializing_if = "Option::is_none")]
    pub last_unpause_time: Option<DateTime<Utc>>,

    /// Precomputed forced-unpause time, set only with a poll interval.
    #[serde(default, alias = "shouldUnpauseTime", skip_serializing_if = "Option::is_none")]
    pub scheduled_unpause_time: Option<DateTime<Utc>>,
}

impl PauseState {
    /// Check the paused/snapshot invariants.
    pub fn validate(&self) -> CoreResult<()> {
        if self.paused {
            if self.snapshot.is_none() {
                return Err(CoreError::InvalidState(
                    "paused state has no snapshot".into(),
                ));
            }
            if self.last_pause_time.is_none() {
                return Err(CoreError::InvalidState(
                    "paused state has no lastPauseTime".into(),
                ));
            }
        } else if self.snapshot.is_some() {
            return Err(CoreError::InvalidState(
                "unpaused state still carries a snapshot".into(),
            ));
        }
        Ok(())
    }
}

/// Read the pause state from a resource.
///
/// Returns `Ok(None)` when the annotation is absent. A present but invalid
/// value is an error and must not be treated as absent: doing so would let
/// the engine pause again on top of state it cannot read.
pub fn decode(resource: &ManagedResource) -> CoreResult<Option<PauseState>> {
    resource
        .annotation(PAUSE_STATE_ANNOTATION)
        .map(decode_str)
        .transpose()
}

/// Parse and validate an encoded pause state.
pub fn decode_str(raw: &str) -> CoreResult<PauseState> {
    let state: PauseState = serde_json::from_str(raw).map_err(CoreError::MalformedState)?;
    state.validate()?;
    Ok(state)
}

/// Encode a pause state for storage in the annotation.
pub fn encode(state: &PauseState) -> CoreResult<String> {
    serde_json::to_string(state).map_err(CoreError::Serialization)
}
