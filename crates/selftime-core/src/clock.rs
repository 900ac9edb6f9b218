//! Clock sources
//!
//! Scopes never read the OS clock directly; they go through a [`Clock`] so
//! hosts and tests can substitute the time line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{check, CoreError, CoreResult, Ticks};

/// Monotonic time source
pub trait Clock: Send + Sync {
    /// Current monotonic timestamp
    fn now(&self) -> Ticks;
}

/// OS monotonic clock, measured from its creation instant
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Ticks {
        let elapsed = self.origin.elapsed();
        Ticks(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
    }
}

/// Manually driven clock
///
/// Clones share one time line, so a test can hand a clone to a context and
/// keep another to advance time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a manual clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manual clock at a given time
    pub fn starting_at(t: Ticks) -> Self {
        ManualClock {
            nanos: Arc::new(AtomicU64::new(t.0)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, dt: Duration) -> Ticks {
        let step = u64::try_from(dt.as_nanos()).unwrap_or(u64::MAX);
        let previous = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_add(step))
            })
            .unwrap_or_else(|n| n);
        Ticks(previous.saturating_add(step))
    }

    /// Set the clock, rejecting moves backwards
    pub fn try_set(&self, t: Ticks) -> CoreResult<()> {
        self.nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (t.0 >= n).then_some(t.0)
            })
            .map(|_| ())
            .map_err(|current| CoreError::ClockRegression {
                current: Ticks(current),
                requested: t,
            })
    }

    /// Set the clock
    ///
    /// Monotonicity is a caller contract.
    pub fn set(&self, t: Ticks) {
        let result = self.try_set(t);
        check::contract(result.is_ok(), "manual clock moved backwards");
        if result.is_err() {
            self.nanos.store(t.0, Ordering::SeqCst);
        }
    }

    /// Convenience for scripted time lines
    pub fn set_millis(&self, millis: u64) {
        self.set(Ticks::from_millis(millis));
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Ticks {
        Ticks(self.nanos.load(Ordering::SeqCst))
    }
}
