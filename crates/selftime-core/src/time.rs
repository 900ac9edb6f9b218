//! Monotonic time primitives
//!
//! A `Ticks` value is a point on a monotonic time line, measured in
//! nanoseconds since the origin of the clock that produced it. Ticks from
//! different clocks are not comparable.

use std::ops::{Add, Sub};
use std::time::Duration;

/// Monotonic timestamp in nanoseconds since clock origin
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Ticks = Ticks(0);
    pub const MAX: Ticks = Ticks(u64::MAX);

    #[inline]
    pub fn from_nanos(nanos: u64) -> Self {
        Ticks(nanos)
    }

    #[inline]
    pub fn from_micros(micros: u64) -> Self {
        Ticks(micros.saturating_mul(1_000))
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        Ticks(millis.saturating_mul(1_000_000))
    }

    #[inline]
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_micros(self) -> u64 {
        self.0 / 1_000
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        Ticks(self.0.saturating_add(duration_nanos(duration)))
    }

    /// Duration from `earlier` to `self`, zero if `earlier` is later
    #[inline]
    pub fn saturating_duration_since(self, earlier: Ticks) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

#[inline]
fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl Add<Duration> for Ticks {
    type Output = Ticks;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<Ticks> for Ticks {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Ticks) -> Self::Output {
        self.saturating_duration_since(rhs)
    }
}

impl std::fmt::Debug for Ticks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({:.3}ms)", self.0 as f64 / 1_000_000.0)
    }
}
