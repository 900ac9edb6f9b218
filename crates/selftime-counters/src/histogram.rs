//! Timed histograms
//!
//! A histogram here is the thin front of an external sample store: it knows
//! its name, whether it is enabled and how to turn a duration into an integer
//! sample. Bucketing is left to the host's [`SampleSink`]; recorded samples are
//! also kept locally for inspection.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use selftime_core::{check, Clock, ElapsedTimer};

use crate::{ContextId, ScopeStack};

/// Identifier of a histogram within its context
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HistogramId(pub u32);

/// Histogram flavor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HistogramKind {
    Timed,
    Nested,
}

/// Unit of recorded samples
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TimedHistogramResolution {
    #[default]
    Millisecond,
    Microsecond,
}

impl TimedHistogramResolution {
    /// Convert a duration to an integer sample, saturating
    #[inline]
    pub fn to_sample(self, duration: Duration) -> i64 {
        let value = match self {
            TimedHistogramResolution::Millisecond => duration.as_millis(),
            TimedHistogramResolution::Microsecond => duration.as_micros(),
        };
        i64::try_from(value).unwrap_or(i64::MAX)
    }
}

/// Host-side storage for completed samples
pub trait SampleSink: Send + Sync {
    fn add_sample(&self, histogram: &str, sample: i64);
}

/// Sample sink collecting values per histogram name
///
/// Clones share the same storage.
#[derive(Clone, Debug, Default)]
pub struct CollectingSampleSink {
    samples: Arc<Mutex<HashMap<String, Vec<i64>>>>,
}

impl CollectingSampleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self, histogram: &str) -> Vec<i64> {
        self.samples
            .lock()
            .get(histogram)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total(&self, histogram: &str) -> i64 {
        self.samples
            .lock()
            .get(histogram)
            .map(|v| v.iter().sum())
            .unwrap_or(0)
    }
}

impl SampleSink for CollectingSampleSink {
    fn add_sample(&self, histogram: &str, sample: i64) {
        self.samples
            .lock()
            .entry(histogram.to_owned())
            .or_default()
            .push(sample);
    }
}

/// Named, togglable recorder of operation durations
pub struct TimedHistogram {
    id: HistogramId,
    /// Context that registered this histogram
    context: ContextId,
    name: String,
    resolution: TimedHistogramResolution,
    enabled: Cell<bool>,
    /// Re-entrancy guard, only toggled when contract checks are armed
    running: Cell<bool>,
    samples: RefCell<Vec<i64>>,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn SampleSink>>,
}

impl TimedHistogram {
    pub(crate) fn new(
        id: HistogramId,
        context: ContextId,
        name: impl Into<String>,
        resolution: TimedHistogramResolution,
        enabled: bool,
        clock: Arc<dyn Clock>,
        sink: Option<Arc<dyn SampleSink>>,
    ) -> Self {
        TimedHistogram {
            id,
            context,
            name: name.into(),
            resolution,
            enabled: Cell::new(enabled),
            running: Cell::new(false),
            samples: RefCell::new(Vec::new()),
            clock,
            sink,
        }
    }

    #[inline]
    pub fn id(&self) -> HistogramId {
        self.id
    }

    /// Id is only unique within this context
    #[inline]
    pub fn context_id(&self) -> ContextId {
        self.context
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn resolution(&self) -> TimedHistogramResolution {
        self.resolution
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Turn recording on or off
    ///
    /// Must not be called while a scope on this histogram is active.
    pub fn set_enabled(&self, enabled: bool) {
        check::contract(
            !self.running.get(),
            "histogram toggled while a scope is running",
        );
        if self.enabled.replace(enabled) != enabled {
            tracing::debug!(histogram = %self.name, enabled, "histogram toggled");
        }
    }

    /// Clock shared with the owning context
    #[inline]
    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    /// Record a raw sample in resolution units
    pub fn add_sample(&self, sample: i64) {
        if !self.enabled() {
            return;
        }
        self.samples.borrow_mut().push(sample);
        if let Some(sink) = &self.sink {
            sink.add_sample(&self.name, sample);
        }
    }

    /// Record a completed duration
    #[inline]
    pub fn add_timed_sample(&self, elapsed: Duration) {
        self.add_sample(self.resolution.to_sample(elapsed));
    }

    /// Stop a measurement that will never complete, recording the maximum
    pub fn record_abandon(&self, timer: &mut ElapsedTimer) {
        if !self.enabled() {
            return;
        }
        check::contract(timer.is_started(), "abandoning a timer that never started");
        if timer.is_started() {
            timer.stop();
        }
        self.add_sample(i64::MAX);
    }

    /// Flip the debug running flag
    ///
    /// Returns false when the histogram was already in the requested state,
    /// meaning two plain scopes overlap on the same histogram.
    pub fn toggle_running_state(&self, expect_to_run: bool) -> bool {
        self.running.replace(expect_to_run) != expect_to_run
    }

    /// Recorded samples in recording order
    pub fn samples(&self) -> Vec<i64> {
        self.samples.borrow().clone()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.borrow().len()
    }

    /// Drain recorded samples
    pub fn take_samples(&self) -> Vec<i64> {
        std::mem::take(&mut *self.samples.borrow_mut())
    }
}

impl std::fmt::Debug for TimedHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedHistogram")
            .field("id", &self.id)
            .field("context", &self.context)
            .field("name", &self.name)
            .field("resolution", &self.resolution)
            .field("enabled", &self.enabled.get())
            .field("samples", &self.samples.borrow().len())
            .finish()
    }
}

/// Timed histogram measuring self-time of nested operations
///
/// Owns the stack of active nested scopes for this histogram.
pub struct NestedTimedHistogram {
    histogram: TimedHistogram,
    pub(crate) stack: RefCell<ScopeStack>,
}

impl NestedTimedHistogram {
    pub(crate) fn new(histogram: TimedHistogram) -> Self {
        NestedTimedHistogram {
            histogram,
            stack: RefCell::new(ScopeStack::new()),
        }
    }

    /// The underlying timed histogram
    #[inline]
    pub fn timed(&self) -> &TimedHistogram {
        &self.histogram
    }

    #[inline]
    pub fn id(&self) -> HistogramId {
        self.histogram.id()
    }

    #[inline]
    pub fn context_id(&self) -> ContextId {
        self.histogram.context_id()
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.histogram.name()
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.histogram.enabled()
    }

    /// Turn recording on or off; the scope stack must be idle
    pub fn set_enabled(&self, enabled: bool) {
        check::contract(
            self.is_idle(),
            "nested histogram toggled while scopes are active",
        );
        self.histogram.set_enabled(enabled);
    }

    #[inline]
    pub fn clock(&self) -> &dyn Clock {
        self.histogram.clock()
    }

    /// Number of active scopes, pause placeholders included
    pub fn stack_depth(&self) -> usize {
        self.stack.borrow().depth()
    }

    pub fn is_idle(&self) -> bool {
        self.stack.borrow().is_empty()
    }

    pub fn is_suspended(&self) -> bool {
        self.stack.borrow().state() == crate::StackState::Suspended
    }

    pub fn samples(&self) -> Vec<i64> {
        self.histogram.samples()
    }

    pub fn sample_count(&self) -> usize {
        self.histogram.sample_count()
    }

    pub fn take_samples(&self) -> Vec<i64> {
        self.histogram.take_samples()
    }
}

impl AsRef<TimedHistogram> for NestedTimedHistogram {
    fn as_ref(&self) -> &TimedHistogram {
        &self.histogram
    }
}

impl std::fmt::Debug for NestedTimedHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestedTimedHistogram")
            .field("histogram", &self.histogram)
            .field("stack_depth", &self.stack.borrow().depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selftime_core::{ManualClock, Ticks};

    fn histogram(resolution: TimedHistogramResolution, enabled: bool) -> TimedHistogram {
        TimedHistogram::new(
            HistogramId(0),
            ContextId(1),
            "Compile",
            resolution,
            enabled,
            Arc::new(ManualClock::new()),
            None,
        )
    }

    #[test]
    fn test_resolution_conversion() {
        let d = Duration::from_micros(2_750);
        assert_eq!(TimedHistogramResolution::Millisecond.to_sample(d), 2);
        assert_eq!(TimedHistogramResolution::Microsecond.to_sample(d), 2_750);
    }

    #[test]
    fn test_disabled_histogram_drops_samples() {
        let h = histogram(TimedHistogramResolution::Millisecond, false);
        h.add_timed_sample(Duration::from_millis(4));
        assert_eq!(h.sample_count(), 0);

        h.set_enabled(true);
        h.add_timed_sample(Duration::from_millis(4));
        assert_eq!(h.samples(), vec![4]);
    }

    #[test]
    fn test_samples_forwarded_to_sink() {
        let sink = CollectingSampleSink::new();
        let h = TimedHistogram::new(
            HistogramId(3),
            ContextId(1),
            "Execute",
            TimedHistogramResolution::Microsecond,
            true,
            Arc::new(ManualClock::new()),
            Some(Arc::new(sink.clone())),
        );

        h.add_timed_sample(Duration::from_micros(10));
        h.add_timed_sample(Duration::from_micros(15));

        assert_eq!(sink.samples("Execute"), vec![10, 15]);
        assert_eq!(sink.total("Execute"), 25);
        assert_eq!(h.take_samples(), vec![10, 15]);
        assert_eq!(h.sample_count(), 0);
    }

    #[test]
    fn test_record_abandon() {
        let h = histogram(TimedHistogramResolution::Millisecond, true);
        let mut timer = ElapsedTimer::started_at(Ticks::ZERO);

        h.record_abandon(&mut timer);

        assert!(!timer.is_started());
        assert_eq!(h.samples(), vec![i64::MAX]);
    }

    #[test]
    fn test_toggle_running_state() {
        let h = histogram(TimedHistogramResolution::Millisecond, true);
        assert!(h.toggle_running_state(true));
        assert!(!h.toggle_running_state(true));
        assert!(h.toggle_running_state(false));
        assert!(!h.toggle_running_state(false));
    }
}
