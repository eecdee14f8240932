//! Forced-unpause scheduling.
//!
//! Resources paused in the same burst would all reach their poll interval at
//! once and hit the external control plane together. Each pause therefore
//! draws a jitter in `[0, JITTER_FACTOR × interval)` and persists the
//! resulting time, so later evaluations see the same deadline.

use crate::providers::RngProvider;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound of the jitter as a fraction of the poll interval.
pub const JITTER_FACTOR: f64 = 0.1;

/// Computes jittered forced-unpause times.
#[derive(Clone)]
pub struct UnpauseScheduler {
    rng: Arc<dyn RngProvider>,
}

impl UnpauseScheduler {
    /// Create a scheduler drawing jitter from `rng`.
    pub fn new(rng: Arc<dyn RngProvider>) -> Self {
        Self { rng }
    }

    /// Draw a jitter in `[0, JITTER_FACTOR × interval)`.
    pub fn jitter(&self, interval: Duration) -> Duration {
        let max_nanos = (interval.as_nanos() as f64 * JITTER_FACTOR) as u128;
        if max_nanos == 0 {
            return Duration::ZERO;
        }
        let drawn = (max_nanos as f64 * self.rng.next_f64()) as u128;
        let nanos = drawn.min(max_nanos - 1);
        Duration::new(
            (nanos / 1_000_000_000) as u64,
            (nanos % 1_000_000_000) as u32,
        )
    }

    /// Forced-unpause time for a resource paused at `paused_at`.
    pub fn schedule(&self, paused_at: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
        let at = add_duration(paused_at, interval);
        add_duration(at, self.jitter(interval))
    }
}

impl std::fmt::Debug for UnpauseScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnpauseScheduler")
            .field("mock_rng", &self.rng.is_mock())
            .finish()
    }
}

/// `at + duration`, saturating at the latest representable time.
pub fn add_duration(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Time left until `deadline`, zero if it already passed.
pub fn remaining(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}
