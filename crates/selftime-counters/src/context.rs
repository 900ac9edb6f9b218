//! Execution context: histogram registry, long-task aggregate, event logging
//!
//! One `Context` exists per execution context (per thread of a host
//! runtime). It is deliberately `!Sync`: histograms and their scope stacks use
//! `Cell`/`RefCell` and must only be driven from one call stack.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use selftime_core::{Clock, MonotonicClock};

use crate::{
    ContextId, CountersError, CountersResult, EventLogger, HistogramId, HistogramKind,
    LogEventStatus, NestedTimedHistogram, NestedTimedHistogramScope,
    PauseNestedTimedHistogramScope, SampleSink, TimedHistogram, TimedHistogramResolution,
    TimedHistogramScope,
};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Context configuration
#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// Name of the primary-execution histogram feeding the long-task aggregate
    pub execute_histogram_name: String,
    /// Resolution of the execute histogram
    pub default_resolution: TimedHistogramResolution,
    /// Initial enabled flag of registered histograms
    pub histograms_enabled: bool,
    /// Whether start/end events reach the event logger
    pub log_events: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            execute_histogram_name: "Execute".to_string(),
            default_resolution: TimedHistogramResolution::Microsecond,
            histograms_enabled: true,
            log_events: true,
        }
    }
}

impl ContextConfig {
    /// Configuration with all instrumentation off
    pub fn disabled() -> Self {
        ContextConfig {
            histograms_enabled: false,
            log_events: false,
            ..ContextConfig::default()
        }
    }
}

/// Aggregate time attributed to the primary-execution histogram
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LongTaskStats {
    pub execute: Duration,
}

impl LongTaskStats {
    pub fn execute_us(&self) -> u128 {
        self.execute.as_micros()
    }
}

#[derive(Clone, Copy, Debug)]
enum Slot {
    Timed(usize),
    Nested(usize),
}

impl Slot {
    fn kind(self) -> HistogramKind {
        match self {
            Slot::Timed(_) => HistogramKind::Timed,
            Slot::Nested(_) => HistogramKind::Nested,
        }
    }
}

/// Builder for [`Context`]
pub struct ContextBuilder {
    config: ContextConfig,
    clock: Option<Arc<dyn Clock>>,
    logger: Option<Box<dyn EventLogger>>,
    sink: Option<Arc<dyn SampleSink>>,
}

impl ContextBuilder {
    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_logger(mut self, logger: impl EventLogger + 'static) -> Self {
        self.logger = Some(Box::new(logger));
        self
    }

    pub fn sample_sink(mut self, sink: Arc<dyn SampleSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Context {
        let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));

        let mut context = Context {
            id,
            config: self.config,
            clock,
            logger: self.logger,
            sink: self.sink,
            timed: Vec::new(),
            nested: Vec::new(),
            by_name: HashMap::new(),
            execute: 0,
            long_task: Cell::new(LongTaskStats::default()),
        };

        let name = context.config.execute_histogram_name.clone();
        let resolution = context.config.default_resolution;
        // Registry is empty, so the name cannot collide.
        context.execute = context.insert_nested(name, resolution);

        tracing::debug!(
            context = %id,
            execute = %context.config.execute_histogram_name,
            "context created"
        );
        context
    }
}

/// Per-execution-context measurement state
pub struct Context {
    id: ContextId,
    config: ContextConfig,
    clock: Arc<dyn Clock>,
    logger: Option<Box<dyn EventLogger>>,
    sink: Option<Arc<dyn SampleSink>>,
    timed: Vec<TimedHistogram>,
    nested: Vec<NestedTimedHistogram>,
    by_name: HashMap<String, Slot>,
    /// Index of the execute histogram in `nested`
    execute: usize,
    long_task: Cell<LongTaskStats>,
}

impl Context {
    /// Create a context on the OS monotonic clock with default configuration
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a context with custom configuration
    pub fn with_config(config: ContextConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder {
            config: ContextConfig::default(),
            clock: None,
            logger: None,
            sink: None,
        }
    }

    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    #[inline]
    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    // ---- registry ----

    /// Register a plain timed histogram
    pub fn register_timed(
        &mut self,
        name: impl Into<String>,
        resolution: TimedHistogramResolution,
    ) -> CountersResult<&TimedHistogram> {
        let name = name.into();
        self.ensure_unique(&name)?;
        let index = self.timed.len();
        let histogram = TimedHistogram::new(
            self.next_id(),
            self.id,
            name.clone(),
            resolution,
            self.config.histograms_enabled,
            Arc::clone(&self.clock),
            self.sink.clone(),
        );
        tracing::debug!(context = %self.id, histogram = %name, ?resolution, "registered timed histogram");
        self.timed.push(histogram);
        self.by_name.insert(name, Slot::Timed(index));
        Ok(&self.timed[index])
    }

    /// Register a nested timed histogram
    pub fn register_nested(
        &mut self,
        name: impl Into<String>,
        resolution: TimedHistogramResolution,
    ) -> CountersResult<&NestedTimedHistogram> {
        let name = name.into();
        self.ensure_unique(&name)?;
        let index = self.insert_nested(name, resolution);
        Ok(&self.nested[index])
    }

    /// Look up a timed histogram by name
    ///
    /// Nested histograms resolve to their underlying timed histogram.
    pub fn timed(&self, name: &str) -> CountersResult<&TimedHistogram> {
        match self.slot(name)? {
            Slot::Timed(i) => Ok(&self.timed[i]),
            Slot::Nested(i) => Ok(self.nested[i].timed()),
        }
    }

    /// Look up a nested histogram by name
    pub fn nested(&self, name: &str) -> CountersResult<&NestedTimedHistogram> {
        match self.slot(name)? {
            Slot::Nested(i) => Ok(&self.nested[i]),
            slot @ Slot::Timed(_) => Err(CountersError::KindMismatch {
                name: name.to_owned(),
                expected: HistogramKind::Nested,
                actual: slot.kind(),
            }),
        }
    }

    /// The designated primary-execution histogram
    #[inline]
    pub fn execute(&self) -> &NestedTimedHistogram {
        &self.nested[self.execute]
    }

    /// Registered names, sorted
    pub fn histogram_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Enable or disable every histogram
    ///
    /// No scope may be active.
    pub fn set_all_enabled(&self, enabled: bool) {
        for histogram in &self.timed {
            histogram.set_enabled(enabled);
        }
        for histogram in &self.nested {
            histogram.set_enabled(enabled);
        }
    }

    // ---- scopes by name ----

    /// Plain scope on a named histogram, logging through this context
    pub fn timed_scope(&self, name: &str) -> CountersResult<TimedHistogramScope<'_>> {
        Ok(TimedHistogramScope::new(self.timed(name)?, Some(self)))
    }

    /// Nested scope on a named histogram
    pub fn nested_scope(&self, name: &str) -> CountersResult<NestedTimedHistogramScope<'_>> {
        Ok(NestedTimedHistogramScope::new(self, self.nested(name)?))
    }

    /// Pause a named nested histogram
    pub fn pause_scope(&self, name: &str) -> CountersResult<PauseNestedTimedHistogramScope<'_>> {
        Ok(PauseNestedTimedHistogramScope::new(self.nested(name)?))
    }

    // ---- long tasks ----

    /// Snapshot of the long-task aggregate
    pub fn long_task_stats(&self) -> LongTaskStats {
        self.long_task.get()
    }

    pub fn reset_long_task_stats(&self) {
        self.long_task.set(LongTaskStats::default());
    }

    /// Attribute `elapsed` to the long-task aggregate if `histogram` is this
    /// context's execute histogram
    ///
    /// Histogram ids repeat across contexts, so identity is by address.
    pub(crate) fn record_long_task_time(
        &self,
        histogram: &NestedTimedHistogram,
        elapsed: Duration,
    ) {
        if !std::ptr::eq(histogram, self.execute()) {
            return;
        }
        let mut stats = self.long_task.get();
        stats.execute += elapsed;
        self.long_task.set(stats);
    }

    // ---- events ----

    /// Forward a start/end event to the attached logger
    #[inline]
    pub fn log_event(&self, name: &str, status: LogEventStatus) {
        if !self.config.log_events {
            return;
        }
        if let Some(logger) = &self.logger {
            logger.on_event(self.id, name, status);
        }
    }

    // ---- internals ----

    fn next_id(&self) -> HistogramId {
        HistogramId((self.timed.len() + self.nested.len()) as u32)
    }

    fn ensure_unique(&self, name: &str) -> CountersResult<()> {
        if self.by_name.contains_key(name) {
            return Err(CountersError::DuplicateHistogram(name.to_owned()));
        }
        Ok(())
    }

    fn slot(&self, name: &str) -> CountersResult<Slot> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CountersError::UnknownHistogram(name.to_owned()))
    }

    fn insert_nested(&mut self, name: String, resolution: TimedHistogramResolution) -> usize {
        let index = self.nested.len();
        let histogram = TimedHistogram::new(
            self.next_id(),
            self.id,
            name.clone(),
            resolution,
            self.config.histograms_enabled,
            Arc::clone(&self.clock),
            self.sink.clone(),
        );
        tracing::debug!(context = %self.id, histogram = %name, ?resolution, "registered nested histogram");
        self.nested.push(NestedTimedHistogram::new(histogram));
        self.by_name.insert(name, Slot::Nested(index));
        index
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        for histogram in &self.nested {
            if !histogram.is_idle() {
                tracing::warn!(
                    context = %self.id,
                    histogram = histogram.name(),
                    depth = histogram.stack_depth(),
                    "context torn down with active nested scopes"
                );
            }
        }
        tracing::debug!(context = %self.id, "context dropped");
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("histograms", &self.by_name.len())
            .field("long_task", &self.long_task.get())
            .finish()
    }
}
