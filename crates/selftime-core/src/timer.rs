//! Pausable elapsed timer
//!
//! An `ElapsedTimer` accumulates running time across pause/resume cycles.
//! Every operation takes the current instant explicitly so that one clock
//! read can be shared by several timers (pausing a parent and starting a
//! child happen at the same instant).

use std::time::Duration;

use crate::{check, Ticks};

/// Timer state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerState {
    Stopped,
    Running { since: Ticks },
    Paused,
}

/// Monotonic duration accumulator
#[derive(Clone, Debug)]
pub struct ElapsedTimer {
    /// Time accumulated before the current running stretch
    accumulated: Duration,
    state: TimerState,
}

impl ElapsedTimer {
    /// Create a stopped timer
    pub const fn new() -> Self {
        ElapsedTimer {
            accumulated: Duration::ZERO,
            state: TimerState::Stopped,
        }
    }

    /// Create a timer already running since `now`
    pub fn started_at(now: Ticks) -> Self {
        let mut timer = Self::new();
        timer.start(now);
        timer
    }

    /// Start measuring from `now`
    pub fn start(&mut self, now: Ticks) {
        check::contract(!self.is_started(), "timer started twice");
        self.accumulated = Duration::ZERO;
        self.state = TimerState::Running { since: now };
    }

    /// Stop the timer, discarding the measurement
    pub fn stop(&mut self) {
        check::contract(self.is_started(), "stopping a timer that never started");
        self.accumulated = Duration::ZERO;
        self.state = TimerState::Stopped;
    }

    /// Freeze accumulation at `now`
    pub fn pause(&mut self, now: Ticks) {
        match self.state {
            TimerState::Running { since } => {
                self.accumulated += now - since;
                self.state = TimerState::Paused;
            }
            _ => check::contract(false, "pausing a timer that is not running"),
        }
    }

    /// Continue accumulation from `now`
    pub fn resume(&mut self, now: Ticks) {
        check::contract(self.is_paused(), "resuming a timer that is not paused");
        if self.is_paused() {
            self.state = TimerState::Running { since: now };
        }
    }

    /// Running time accumulated up to `now`
    ///
    /// A paused timer reports the value frozen at pause time.
    pub fn elapsed(&self, now: Ticks) -> Duration {
        check::contract(self.is_started(), "querying a timer that never started");
        match self.state {
            TimerState::Running { since } => self.accumulated + (now - since),
            TimerState::Paused | TimerState::Stopped => self.accumulated,
        }
    }

    /// Return the elapsed time and start over from `now`
    pub fn restart(&mut self, now: Ticks) -> Duration {
        let elapsed = self.elapsed(now);
        self.accumulated = Duration::ZERO;
        self.state = TimerState::Running { since: now };
        elapsed
    }

    /// Whether at least `budget` has elapsed by `now`
    pub fn has_expired(&self, now: Ticks, budget: Duration) -> bool {
        self.elapsed(now) >= budget
    }

    /// Whether the timer has been started and not stopped
    #[inline]
    pub fn is_started(&self) -> bool {
        self.state != TimerState::Stopped
    }

    /// Whether the timer is started but frozen
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.state == TimerState::Paused
    }
}

impl Default for ElapsedTimer {
    fn default() -> Self {
        Self::new()
    }
}
