//! Nested self-time scopes
//!
//! A nested scope pushes itself onto its histogram's [`ScopeStack`], pausing
//! the scope below it, and pops itself on drop, resuming that scope. The
//! recorded sample is therefore the scope's exclusive time: wall time minus
//! every interval during which a child scope (or a pause) sat above it.
//!
//! Enter and leave read the clock once and use that instant for both the
//! parent and the child, so no time falls between them.

use selftime_core::{check, ElapsedTimer};

use crate::{Context, Frame, LogEventStatus, NestedTimedHistogram, StackEntry};

/// Whether a nested scope contributes to the long-task aggregate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LongTaskRecordMode {
    #[default]
    Skip,
    Record,
}

/// Self-time measurement on a nested histogram
#[must_use = "the measurement ends when the scope is dropped"]
pub struct NestedTimedHistogramScope<'a> {
    context: &'a Context,
    histogram: &'a NestedTimedHistogram,
    /// Set while this scope sits on the stack
    entry: Option<StackEntry>,
    long_task_record_mode: LongTaskRecordMode,
}

impl<'a> NestedTimedHistogramScope<'a> {
    pub fn new(context: &'a Context, histogram: &'a NestedTimedHistogram) -> Self {
        Self::with_long_task_mode(context, histogram, LongTaskRecordMode::Skip)
    }

    pub fn with_long_task_mode(
        context: &'a Context,
        histogram: &'a NestedTimedHistogram,
        long_task_record_mode: LongTaskRecordMode,
    ) -> Self {
        check::contract(
            histogram.context_id() == context.id(),
            "nested histogram belongs to another context",
        );
        let mut scope = NestedTimedHistogramScope {
            context,
            histogram,
            entry: None,
            long_task_record_mode,
        };
        scope.start();
        scope
    }

    pub fn long_task_record_mode(&self) -> LongTaskRecordMode {
        self.long_task_record_mode
    }

    /// Whether this scope is measuring
    pub fn is_active(&self) -> bool {
        self.entry.is_some()
    }

    #[inline]
    fn start(&mut self) {
        if self.histogram.enabled() {
            self.start_internal();
        }
        self.context.log_event(self.histogram.name(), LogEventStatus::Start);
    }

    #[inline(never)]
    fn start_internal(&mut self) {
        let mut stack = self.histogram.stack.borrow_mut();
        let now = self.histogram.clock().now();
        let entry = stack.enter(Frame::Timed(ElapsedTimer::started_at(now)));
        if let Some(previous) = entry.previous {
            stack.pause_at(previous, now);
        }
        self.entry = Some(entry);
    }

    #[inline]
    fn stop(&mut self) {
        check::contract(
            self.histogram.enabled() == self.entry.is_some(),
            "histogram enabled flag changed while a nested scope was active",
        );
        if let Some(entry) = self.entry.take() {
            self.stop_internal(entry);
        }
        self.context.log_event(self.histogram.name(), LogEventStatus::End);
    }

    #[inline(never)]
    fn stop_internal(&mut self, entry: StackEntry) {
        let now = self.histogram.clock().now();
        let elapsed = {
            let mut stack = self.histogram.stack.borrow_mut();
            let elapsed = match stack.leave(entry) {
                Some(Frame::Timed(timer)) => timer.elapsed(now),
                _ => {
                    check::contract(false, "nested scope frame missing on leave");
                    return;
                }
            };
            if let Some(previous) = entry.previous {
                stack.resume_at(previous, now);
            }
            elapsed
        };

        self.histogram.timed().add_timed_sample(elapsed);
        if self.long_task_record_mode == LongTaskRecordMode::Record {
            self.context.record_long_task_time(self.histogram, elapsed);
        }
    }
}

impl Drop for NestedTimedHistogramScope<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Nested scope that always feeds the long-task aggregate
///
/// Only time measured on the context's execute histogram is counted.
#[must_use = "the measurement ends when the scope is dropped"]
pub struct LongTaskNestedTimedHistogramScope<'a>(NestedTimedHistogramScope<'a>);

impl<'a> LongTaskNestedTimedHistogramScope<'a> {
    pub fn new(context: &'a Context, histogram: &'a NestedTimedHistogram) -> Self {
        LongTaskNestedTimedHistogramScope(NestedTimedHistogramScope::with_long_task_mode(
            context,
            histogram,
            LongTaskRecordMode::Record,
        ))
    }

    pub fn is_active(&self) -> bool {
        self.0.is_active()
    }
}

/// Suspends a nested histogram across unmeasured work, such as a call out to
/// a host callback
///
/// While the pause is in place no scope below it accrues time, and scopes
/// entered during the pause do not pause anything below it.
#[must_use = "the pause ends when the scope is dropped"]
pub struct PauseNestedTimedHistogramScope<'a> {
    histogram: &'a NestedTimedHistogram,
    entry: Option<StackEntry>,
}

impl<'a> PauseNestedTimedHistogramScope<'a> {
    pub fn new(histogram: &'a NestedTimedHistogram) -> Self {
        let mut scope = PauseNestedTimedHistogramScope {
            histogram,
            entry: None,
        };
        if histogram.enabled() {
            scope.pause();
        }
        scope
    }

    /// Whether a running scope was paused
    pub fn paused_scope(&self) -> bool {
        self.entry.is_some_and(|e| e.previous.is_some())
    }

    #[inline(never)]
    fn pause(&mut self) {
        let mut stack = self.histogram.stack.borrow_mut();
        let entry = stack.enter(Frame::Suspended);
        if let Some(previous) = entry.previous {
            stack.pause_at(previous, self.histogram.clock().now());
        }
        self.entry = Some(entry);
    }

    #[inline(never)]
    fn resume(&mut self, entry: StackEntry) {
        let mut stack = self.histogram.stack.borrow_mut();
        stack.leave(entry);
        // Nothing was running when the pause began.
        if let Some(previous) = entry.previous {
            stack.resume_at(previous, self.histogram.clock().now());
        }
    }
}

impl Drop for PauseNestedTimedHistogramScope<'_> {
    fn drop(&mut self) {
        check::contract(
            self.histogram.enabled() == self.entry.is_some(),
            "histogram enabled flag changed while paused",
        );
        if let Some(entry) = self.entry.take() {
            self.resume(entry);
        }
    }
}
