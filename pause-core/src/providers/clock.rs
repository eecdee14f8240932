//! Clock provider.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;

    /// Check if this is a mock clock.
    fn is_mock(&self) -> bool;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn is_mock(&self) -> bool {
        false
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    /// Create a mock clock at the given time.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Create a mock clock fixed at the specified RFC 3339 time.
    ///
    /// # Example
    ///
    /// ```
    /// use pause_core::providers::{Clock, MockClock};
    ///
    /// let clock = MockClock::fixed("2024-01-15T10:30:00Z");
    /// assert_eq!(clock.now().to_rfc3339(), "2024-01-15T10:30:00+00:00");
    /// ```
    pub fn fixed(rfc3339: &str) -> Self {
        let now = DateTime::parse_from_rfc3339(rfc3339)
            .expect("Invalid RFC 3339 datetime")
            .with_timezone(&Utc);
        Self::at(now)
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let delta = chrono::TimeDelta::from_std(duration).expect("Duration out of range");
        *self.now.lock() += delta;
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn is_mock(&self) -> bool {
        true
    }
}
