//! Per-histogram stack of active nested scopes
//!
//! The stack owns the timers of all active nested scopes. A scope holds a
//! [`StackEntry`] (its own depth plus the index of the timed frame it
//! paused) instead of a reference to its parent, so no scope ever points at a
//! frame that has already left.
//!
//! INVARIANT: at most the top frame's timer is running; every timed frame
//! below a running top is paused.

use std::time::Duration;

use selftime_core::{check, ElapsedTimer, Ticks};

/// One slot of the scope stack
#[derive(Clone, Debug)]
pub enum Frame {
    /// An active nested measurement
    Timed(ElapsedTimer),
    /// Placeholder installed while measurement is paused
    Suspended,
}

/// Handle returned by [`ScopeStack::enter`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackEntry {
    /// Position of the entered frame
    pub depth: usize,
    /// Timed frame that was on top when this entry was pushed
    pub previous: Option<usize>,
}

/// What is advancing on a histogram
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackState {
    /// No active scope
    Idle,
    /// Top scope's timer is advancing
    Running,
    /// A pause placeholder is on top, nothing advances
    Suspended,
}

/// LIFO chain of active nested scopes
#[derive(Clone, Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame, returning its entry
    ///
    /// `previous` is only set when the old top is a timed frame; entering
    /// above a pause placeholder pauses nothing.
    pub fn enter(&mut self, frame: Frame) -> StackEntry {
        let previous = self.top_timed();
        self.frames.push(frame);
        StackEntry {
            depth: self.frames.len() - 1,
            previous,
        }
    }

    /// Pop the entry's frame, restoring the previous top
    ///
    /// The entry must be on top.
    pub fn leave(&mut self, entry: StackEntry) -> Option<Frame> {
        check::contract(
            entry.depth + 1 == self.frames.len(),
            "scope left out of LIFO order",
        );
        self.frames.truncate(entry.depth + 1);
        if self.frames.len() == entry.depth + 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Pause the timed frame at `index`
    pub fn pause_at(&mut self, index: usize, now: Ticks) {
        if let Some(timer) = self.timer_mut(index) {
            timer.pause(now);
        }
    }

    /// Resume the timed frame at `index`
    pub fn resume_at(&mut self, index: usize, now: Ticks) {
        if let Some(timer) = self.timer_mut(index) {
            timer.resume(now);
        }
    }

    /// Self-time of the timed frame at `index` so far
    pub fn elapsed_at(&self, index: usize, now: Ticks) -> Option<Duration> {
        match self.frames.get(index) {
            Some(Frame::Timed(timer)) => Some(timer.elapsed(now)),
            _ => None,
        }
    }

    pub fn state(&self) -> StackState {
        match self.frames.last() {
            None => StackState::Idle,
            Some(Frame::Timed(_)) => StackState::Running,
            Some(Frame::Suspended) => StackState::Suspended,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn top_timed(&self) -> Option<usize> {
        match self.frames.last() {
            Some(Frame::Timed(_)) => Some(self.frames.len() - 1),
            _ => None,
        }
    }

    fn timer_mut(&mut self, index: usize) -> Option<&mut ElapsedTimer> {
        match self.frames.get_mut(index) {
            Some(Frame::Timed(timer)) => Some(timer),
            _ => {
                check::contract(false, "no timed frame at stack index");
                None
            }
        }
    }
}
