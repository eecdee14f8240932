//! Providers for time and randomness.
//!
//! The engine never reads the system clock or an RNG directly. Production
//! code uses [`SystemClock`] and [`RealRng`]; tests inject [`MockClock`] and
//! [`MockRng`] for deterministic decisions and jitter.

mod clock;
mod rng;

pub use clock::{Clock, MockClock, SystemClock};
pub use rng::{MockRng, RealRng, RngProvider};
