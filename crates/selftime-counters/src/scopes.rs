//! Non-nesting measurement scopes
//!
//! Plain, optional and lazy scopes measure wall time between construction and
//! drop and record it on a [`TimedHistogram`]. They share one timing helper,
//! [`ScopeTimer`], which gates all work on the histogram's enabled flag so a
//! disabled histogram costs a single load.

use selftime_core::{check, ElapsedTimer};

use crate::{Context, LogEventStatus, TimedHistogram};

/// Timing policy shared by the scope variants
#[derive(Debug)]
pub(crate) struct ScopeTimer<'a> {
    histogram: Option<&'a TimedHistogram>,
    timer: ElapsedTimer,
    /// Histogram was enabled when the measurement was armed
    armed: bool,
}

impl<'a> ScopeTimer<'a> {
    pub(crate) fn new(histogram: Option<&'a TimedHistogram>) -> Self {
        ScopeTimer {
            histogram,
            timer: ElapsedTimer::new(),
            armed: false,
        }
    }

    #[inline]
    pub(crate) fn start(&mut self) {
        if let Some(histogram) = self.histogram {
            if histogram.enabled() {
                self.start_internal(histogram);
            }
        }
    }

    fn start_internal(&mut self, histogram: &'a TimedHistogram) {
        check::contract_with(
            || histogram.toggle_running_state(true),
            "re-entrant scope on a timed histogram",
        );
        self.armed = true;
        self.timer.start(histogram.clock().now());
    }

    #[inline]
    pub(crate) fn stop(&mut self) {
        let Some(histogram) = self.histogram else {
            return;
        };
        check::contract(
            histogram.enabled() == self.armed,
            "histogram enabled flag changed while a scope was active",
        );
        if self.armed && histogram.enabled() {
            self.stop_internal(histogram);
        }
    }

    fn stop_internal(&mut self, histogram: &'a TimedHistogram) {
        check::contract_with(
            || histogram.toggle_running_state(false),
            "timed histogram stopped while not running",
        );
        histogram.add_timed_sample(self.timer.elapsed(histogram.clock().now()));
        self.timer.stop();
        self.armed = false;
    }

    /// Logging goes to the context that owns the histogram
    fn check_owner(histogram: &TimedHistogram, context: &Context) {
        check::contract(
            histogram.context_id() == context.id(),
            "histogram belongs to another context",
        );
    }

    #[inline]
    pub(crate) fn log(&self, context: &Context, status: LogEventStatus) {
        if let Some(histogram) = self.histogram {
            context.log_event(histogram.name(), status);
        }
    }
}

/// Scoped measurement on a timed histogram
///
/// Records the scope's wall time on drop. When a context is given, start and
/// end events are logged whether or not the histogram is enabled.
#[must_use = "the measurement ends when the scope is dropped"]
pub struct TimedHistogramScope<'a> {
    base: ScopeTimer<'a>,
    context: Option<&'a Context>,
}

impl<'a> TimedHistogramScope<'a> {
    pub fn new(histogram: &'a TimedHistogram, context: Option<&'a Context>) -> Self {
        let mut base = ScopeTimer::new(Some(histogram));
        if let Some(context) = context {
            ScopeTimer::check_owner(histogram, context);
        }
        base.start();
        if let Some(context) = context {
            base.log(context, LogEventStatus::Start);
        }
        TimedHistogramScope { base, context }
    }
}

impl Drop for TimedHistogramScope<'_> {
    fn drop(&mut self) {
        self.base.stop();
        if let Some(context) = self.context {
            self.base.log(context, LogEventStatus::End);
        }
    }
}

/// Whether an optional scope measures anything
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionalTimedHistogramScopeMode {
    TakeTime,
    DontTakeTime,
}

/// Timed scope switched on or off by the caller
///
/// With `DontTakeTime` the scope does nothing at all, logging included.
#[must_use = "the measurement ends when the scope is dropped"]
pub struct OptionalTimedHistogramScope<'a> {
    base: ScopeTimer<'a>,
    context: &'a Context,
    mode: OptionalTimedHistogramScopeMode,
}

impl<'a> OptionalTimedHistogramScope<'a> {
    pub fn new(
        histogram: &'a TimedHistogram,
        context: &'a Context,
        mode: OptionalTimedHistogramScopeMode,
    ) -> Self {
        let mut base = ScopeTimer::new(Some(histogram));
        if mode == OptionalTimedHistogramScopeMode::TakeTime {
            ScopeTimer::check_owner(histogram, context);
            base.start();
            base.log(context, LogEventStatus::Start);
        }
        OptionalTimedHistogramScope {
            base,
            context,
            mode,
        }
    }
}

impl Drop for OptionalTimedHistogramScope<'_> {
    fn drop(&mut self) {
        if self.mode != OptionalTimedHistogramScopeMode::TakeTime {
            return;
        }
        self.base.stop();
        self.base.log(self.context, LogEventStatus::End);
    }
}

/// Timed scope whose histogram is chosen after it starts
///
/// The timer runs from construction. [`set_histogram`](Self::set_histogram)
/// must be called exactly once before the scope is dropped; dropping an
/// unassigned scope is a contract violation and the measurement is lost.
#[must_use = "the measurement ends when the scope is dropped"]
pub struct LazyTimedHistogramScope<'a> {
    base: ScopeTimer<'a>,
}

impl<'a> LazyTimedHistogramScope<'a> {
    /// Start timing on the context's clock
    pub fn new(context: &'a Context) -> Self {
        let mut base = ScopeTimer::new(None);
        base.timer.start(context.clock().now());
        LazyTimedHistogramScope { base }
    }

    /// Choose the destination histogram
    pub fn set_histogram(&mut self, histogram: &'a TimedHistogram) {
        check::contract(
            self.base.histogram.is_none(),
            "lazy scope histogram assigned twice",
        );
        check::contract_with(
            || !histogram.enabled() || histogram.toggle_running_state(true),
            "re-entrant scope on a timed histogram",
        );
        self.base.histogram = Some(histogram);
        self.base.armed = histogram.enabled();
    }

    pub fn has_histogram(&self) -> bool {
        self.base.histogram.is_some()
    }
}

impl Drop for LazyTimedHistogramScope<'_> {
    fn drop(&mut self) {
        if self.base.histogram.is_none() {
            if !std::thread::panicking() {
                check::contract(false, "lazy scope dropped without a histogram");
            }
            return;
        }
        self.base.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RecordingEventLogger, TimedHistogramResolution};
    use selftime_core::ManualClock;
    use std::sync::Arc;

    fn setup() -> (Context, ManualClock, RecordingEventLogger) {
        let clock = ManualClock::new();
        let logger = RecordingEventLogger::new();
        let mut context = Context::builder()
            .clock(Arc::new(clock.clone()))
            .event_logger(logger.clone())
            .build();
        context
            .register_timed("Parse", TimedHistogramResolution::Millisecond)
            .unwrap();
        (context, clock, logger)
    }

    #[test]
    fn test_timed_scope_records_wall_time() {
        let (context, clock, logger) = setup();
        let parse = context.timed("Parse").unwrap();

        {
            let _scope = TimedHistogramScope::new(parse, Some(&context));
            clock.set_millis(12);
        }

        assert_eq!(parse.samples(), vec![12]);
        assert_eq!(logger.count(LogEventStatus::Start), 1);
        assert_eq!(logger.count(LogEventStatus::End), 1);
    }

    #[test]
    fn test_timed_scope_without_context_does_not_log() {
        let (context, clock, logger) = setup();
        let parse = context.timed("Parse").unwrap();

        {
            let _scope = TimedHistogramScope::new(parse, None);
            clock.set_millis(3);
        }

        assert_eq!(parse.samples(), vec![3]);
        assert!(logger.is_empty());
    }

    #[test]
    fn test_disabled_histogram_still_logs() {
        let (context, clock, logger) = setup();
        let parse = context.timed("Parse").unwrap();
        parse.set_enabled(false);

        {
            let _scope = TimedHistogramScope::new(parse, Some(&context));
            clock.set_millis(9);
        }

        assert_eq!(parse.sample_count(), 0);
        assert_eq!(logger.len(), 2);
    }

    #[test]
    fn test_scope_records_on_early_return() {
        let (context, clock, _) = setup();
        let parse = context.timed("Parse").unwrap();

        let work = |fail: bool| -> Result<(), &'static str> {
            let _scope = TimedHistogramScope::new(parse, None);
            clock.advance(std::time::Duration::from_millis(4));
            if fail {
                return Err("bail");
            }
            Ok(())
        };

        assert!(work(true).is_err());
        assert!(work(false).is_ok());
        assert_eq!(parse.samples(), vec![4, 4]);
    }

    #[test]
    fn test_optional_scope_modes() {
        let (context, clock, logger) = setup();
        let parse = context.timed("Parse").unwrap();

        {
            let _skip = OptionalTimedHistogramScope::new(
                parse,
                &context,
                OptionalTimedHistogramScopeMode::DontTakeTime,
            );
            clock.set_millis(5);
        }
        assert_eq!(parse.sample_count(), 0);
        assert!(logger.is_empty());

        {
            let _take = OptionalTimedHistogramScope::new(
                parse,
                &context,
                OptionalTimedHistogramScopeMode::TakeTime,
            );
            clock.set_millis(8);
        }
        assert_eq!(parse.samples(), vec![3]);
        assert_eq!(logger.len(), 2);
    }

    #[test]
    fn test_lazy_scope_times_from_construction() {
        let (context, clock, _) = setup();
        let parse = context.timed("Parse").unwrap();

        {
            let mut scope = LazyTimedHistogramScope::new(&context);
            clock.set_millis(6);
            assert!(!scope.has_histogram());
            scope.set_histogram(parse);
            clock.set_millis(10);
        }

        assert_eq!(parse.samples(), vec![10]);
    }

    #[test]
    fn test_lazy_scope_disabled_histogram_records_nothing() {
        let (context, clock, _) = setup();
        let parse = context.timed("Parse").unwrap();
        parse.set_enabled(false);

        {
            let mut scope = LazyTimedHistogramScope::new(&context);
            scope.set_histogram(parse);
            clock.set_millis(10);
        }

        assert_eq!(parse.sample_count(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "without a histogram")]
    fn test_lazy_scope_requires_histogram() {
        let (context, _, _) = setup();
        let _scope = LazyTimedHistogramScope::new(&context);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "re-entrant")]
    fn test_overlapping_plain_scopes_are_contract_violation() {
        let (context, _, _) = setup();
        let parse = context.timed("Parse").unwrap();

        let _outer = TimedHistogramScope::new(parse, None);
        let _inner = TimedHistogramScope::new(parse, None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "toggled while a scope is running")]
    fn test_toggle_mid_scope_is_contract_violation() {
        let (context, _, _) = setup();
        let parse = context.timed("Parse").unwrap();

        let _scope = TimedHistogramScope::new(parse, None);
        parse.set_enabled(false);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "lazy scope histogram assigned twice")]
    fn test_lazy_scope_assigned_twice_is_contract_violation() {
        let (context, _, _) = setup();
        let parse = context.timed("Parse").unwrap();

        let mut scope = LazyTimedHistogramScope::new(&context);
        scope.set_histogram(parse);
        scope.set_histogram(parse);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "belongs to another context")]
    fn test_timed_scope_logging_to_foreign_context_is_contract_violation() {
        let (context, _, _) = setup();
        let (other, _, _) = setup();
        let parse = other.timed("Parse").unwrap();

        let _scope = TimedHistogramScope::new(parse, Some(&context));
    }
}
