//! Random number generator provider.
//!
//! Allows tests to pin jitter to a seeded sequence or a fixed value.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Provider trait for random number generation.
pub trait RngProvider: Send + Sync {
    /// Generate a random f64 in the range [0, 1).
    fn next_f64(&self) -> f64;

    /// Check if this is a mock provider.
    fn is_mock(&self) -> bool;
}

/// RNG seeded from operating system entropy.
pub struct RealRng {
    rng: Mutex<StdRng>,
}

impl RealRng {
    /// Create a new real RNG.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl Default for RealRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RngProvider for RealRng {
    fn next_f64(&self) -> f64 {
        self.rng.lock().r#gen()
    }

    fn is_mock(&self) -> bool {
        false
    }
}

/// Mock RNG for deterministic behavior.
///
/// # Example
///
/// ```
/// use pause_core::providers::{MockRng, RngProvider};
///
/// let rng = MockRng::seeded(42);
/// let first = rng.next_f64();
///
/// // Same seed produces same sequence
/// assert_eq!(MockRng::seeded(42).next_f64(), first);
///
/// // A fixed RNG always returns its value
/// assert_eq!(MockRng::fixed(0.5).next_f64(), 0.5);
/// ```
pub struct MockRng {
    rng: Mutex<StdRng>,
    seed: u64,
    fixed: Option<f64>,
}

impl MockRng {
    /// Create a new mock RNG with the given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            seed,
            fixed: None,
        }
    }

    /// Create a mock RNG that always returns `value`, clamped into [0, 1).
    pub fn fixed(value: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            seed: 0,
            fixed: Some(value.clamp(0.0, 1.0 - f64::EPSILON)),
        }
    }

    /// Get the seed used to create this RNG.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Reset the RNG to its initial state.
    pub fn reset(&self) {
        *self.rng.lock() = StdRng::seed_from_u64(self.seed);
    }
}

impl RngProvider for MockRng {
    fn next_f64(&self) -> f64 {
        match self.fixed {
            Some(value) => value,
            None => self.rng.lock().r#gen(),
        }
    }

    fn is_mock(&self) -> bool {
        true
    }
}
