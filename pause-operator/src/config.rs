//! Operator configuration.

use crate::controller::DEFAULT_MAX_ATTEMPTS;
use crate::error::{OperatorError, OperatorResult};
use kube::api::{ApiResource, GroupVersionKind};
use pause_core::PausePolicy;
use pause_core::engine::DEFAULT_FROZEN_DURATION;
use std::time::Duration;

/// Default number of resources evaluated in parallel.
pub const DEFAULT_MAX_CONCURRENT_RECONCILES: u16 = 10;

/// Default requeue delay after a failed evaluation.
pub const DEFAULT_ERROR_REQUEUE: Duration = Duration::from_secs(30);

/// Upper bound on attempts per evaluation.
pub const MAX_ATTEMPTS_LIMIT: u32 = 3;

/// Configuration for one pause controller.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorConfig {
    /// API group of the watched kind; empty for the core group.
    pub group: String,
    /// API version of the watched kind.
    pub version: String,
    /// Kind to watch.
    pub kind: String,
    /// Plural resource name, guessed from the kind when unset.
    pub plural: Option<String>,
    /// Restrict watching to one namespace.
    pub namespace: Option<String>,
    /// Only watch resources matching this label selector.
    pub label_selector: Option<String>,
    /// Minimum unpaused dwell time before pausing again.
    pub frozen_duration: Duration,
    /// Forced-unpause interval, disabled when unset.
    pub unpause_poll_interval: Option<Duration>,
    /// Resources evaluated in parallel.
    pub max_concurrent_reconciles: u16,
    /// Attempts per evaluation when updates conflict.
    pub max_attempts: u32,
    /// Requeue delay after a retryable failure.
    pub error_requeue: Duration,
}

impl OperatorConfig {
    /// Configuration for the given kind with default timings.
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            plural: None,
            namespace: None,
            label_selector: None,
            frozen_duration: DEFAULT_FROZEN_DURATION,
            unpause_poll_interval: None,
            max_concurrent_reconciles: DEFAULT_MAX_CONCURRENT_RECONCILES,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            error_requeue: DEFAULT_ERROR_REQUEUE,
        }
    }

    /// Set the plural resource name.
    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }

    /// Restrict to a namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Restrict to resources matching a label selector.
    pub fn with_label_selector(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    /// Set the frozen duration.
    pub fn with_frozen_duration(mut self, duration: Duration) -> Self {
        self.frozen_duration = duration;
        self
    }

    /// Enable forced unpause after `interval`.
    pub fn with_unpause_poll_interval(mut self, interval: Duration) -> Self {
        self.unpause_poll_interval = Some(interval);
        self
    }

    /// Set the worker pool size.
    pub fn with_max_concurrent_reconciles(mut self, workers: u16) -> Self {
        self.max_concurrent_reconciles = workers;
        self
    }

    /// Set the attempts per evaluation.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the requeue delay after failures.
    pub fn with_error_requeue(mut self, delay: Duration) -> Self {
        self.error_requeue = delay;
        self
    }

    /// Check the configuration before starting.
    pub fn validate(&self) -> OperatorResult<()> {
        if self.kind.trim().is_empty() {
            return Err(OperatorError::InvalidConfig("kind is required".into()));
        }
        if self.version.trim().is_empty() {
            return Err(OperatorError::InvalidConfig("version is required".into()));
        }
        if self.plural.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(OperatorError::InvalidConfig("plural must not be empty".into()));
        }
        if self.unpause_poll_interval.is_some_and(|i| i.is_zero()) {
            return Err(OperatorError::InvalidConfig(
                "unpause poll interval must be positive".into(),
            ));
        }
        if self.max_concurrent_reconciles == 0 {
            return Err(OperatorError::InvalidConfig(
                "max concurrent reconciles must be at least 1".into(),
            ));
        }
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.max_attempts) {
            return Err(OperatorError::InvalidConfig(format!(
                "max attempts must be between 1 and {}",
                MAX_ATTEMPTS_LIMIT
            )));
        }
        Ok(())
    }

    /// Timing policy for the decision engine.
    pub fn policy(&self) -> PausePolicy {
        PausePolicy {
            frozen_duration: self.frozen_duration,
            unpause_poll_interval: self.unpause_poll_interval,
        }
    }

    /// Kubernetes API resource for the watched kind.
    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(&self.group, &self.version, &self.kind);
        match &self.plural {
            Some(plural) => ApiResource::from_gvk_with_plural(&gvk, plural),
            None => ApiResource::from_gvk(&gvk),
        }
    }
}

/// Parse a duration such as `90s`, `5m`, `2h`, `1h30m` or `250ms`.
///
/// A bare number is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".into());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in '{}'", input))?;
        if digits == 0 {
            return Err(format!("expected a number in '{}'", input));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|e| format!("invalid number in '{}': {}", input, e))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            "d" => Duration::from_secs(value.saturating_mul(86_400)),
            unit => return Err(format!("unknown unit '{}' in '{}'", unit, input)),
        };
        total = total.saturating_add(part);
        rest = &rest[unit_len..];
    }
    Ok(total)
}
