//! Scope simulator - drives scripted nestings against a real context
//!
//! A script is a tree of work, nested scopes and pauses. The simulator plays
//! it on a `ManualClock` through long-task scopes on the execute histogram,
//! and separately computes the exclusive time each scope should report by
//! walking the same script with a plain accumulator model.

use std::sync::Arc;
use std::time::Duration;

use selftime_core::{Clock, ManualClock};
use selftime_counters::{
    Context, ContextConfig, LongTaskNestedTimedHistogramScope, PauseNestedTimedHistogramScope,
    TimedHistogramResolution,
};
use thiserror::Error;

/// Flat simulation step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Enter a nested scope
    Enter,
    /// Leave the innermost nested scope
    Leave,
    /// Begin an unmeasured interval
    Pause,
    /// End the innermost unmeasured interval
    Resume,
    /// Let time pass
    Advance(Duration),
}

/// Tree form of a script
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptNode {
    /// Time passing in the enclosing scope, in milliseconds
    Work(u64),
    /// A nested scope around its children
    Scope(Vec<ScriptNode>),
    /// A pause around its children
    Pause(Vec<ScriptNode>),
}

impl ScriptNode {
    /// Flatten into steps, appending to `out`
    pub fn flatten_into(&self, out: &mut Vec<Step>) {
        match self {
            ScriptNode::Work(ms) => out.push(Step::Advance(Duration::from_millis(*ms))),
            ScriptNode::Scope(children) => {
                out.push(Step::Enter);
                children.iter().for_each(|c| c.flatten_into(out));
                out.push(Step::Leave);
            }
            ScriptNode::Pause(children) => {
                out.push(Step::Pause);
                children.iter().for_each(|c| c.flatten_into(out));
                out.push(Step::Resume);
            }
        }
    }

    pub fn flatten(&self) -> Vec<Step> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }
}

/// Malformed script
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Step {index}: {step:?} does not match the innermost open frame")]
    Unbalanced { index: usize, step: Step },

    #[error("Script ends with {0} open frames")]
    Unclosed(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ModelFrame {
    Scope(Duration),
    Pause,
}

/// Exclusive time each scope should record, in leave order
///
/// Time is credited to the innermost open scope only, and to nobody while a
/// pause is innermost.
pub fn expected_self_times(steps: &[Step]) -> Result<Vec<Duration>, ScriptError> {
    let mut frames: Vec<ModelFrame> = Vec::new();
    let mut completed = Vec::new();

    for (index, &step) in steps.iter().enumerate() {
        match step {
            Step::Enter => frames.push(ModelFrame::Scope(Duration::ZERO)),
            Step::Pause => frames.push(ModelFrame::Pause),
            Step::Leave => match frames.pop() {
                Some(ModelFrame::Scope(total)) => completed.push(total),
                _ => return Err(ScriptError::Unbalanced { index, step }),
            },
            Step::Resume => match frames.pop() {
                Some(ModelFrame::Pause) => {}
                _ => return Err(ScriptError::Unbalanced { index, step }),
            },
            Step::Advance(dt) => {
                if let Some(ModelFrame::Scope(total)) = frames.last_mut() {
                    *total += dt;
                }
            }
        }
    }

    if !frames.is_empty() {
        return Err(ScriptError::Unclosed(frames.len()));
    }
    Ok(completed)
}

/// Outcome of one simulation run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationReport {
    /// Samples recorded by the histogram, in microseconds
    pub recorded: Vec<i64>,
    /// Samples predicted by the reference model, in microseconds
    pub expected: Vec<i64>,
    /// Long-task aggregate after the run
    pub long_task: Duration,
    /// Total simulated wall time
    pub wall_time: Duration,
}

impl SimulationReport {
    pub fn matches(&self) -> bool {
        self.recorded == self.expected
            && self.long_task.as_micros() == self.expected.iter().map(|&v| v as u128).sum::<u128>()
    }
}

// Held only for their Drop.
#[allow(dead_code)]
enum Guard<'a> {
    Scope(LongTaskNestedTimedHistogramScope<'a>),
    Pause(PauseNestedTimedHistogramScope<'a>),
}

/// Plays scripts against a context on a manual clock
pub struct ScopeSimulator {
    context: Context,
    clock: ManualClock,
}

impl ScopeSimulator {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        let clock = ManualClock::new();
        let context = Context::builder()
            .config(ContextConfig {
                default_resolution: TimedHistogramResolution::Microsecond,
                ..config
            })
            .clock(Arc::new(clock.clone()))
            .build();
        ScopeSimulator { context, clock }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Run a script tree
    pub fn run_script(&self, script: &ScriptNode) -> Result<SimulationReport, ScriptError> {
        self.run(&script.flatten())
    }

    /// Run flat steps
    ///
    /// The script is validated against the reference model before any scope
    /// is created, so a malformed script never reaches the scope stack.
    pub fn run(&self, steps: &[Step]) -> Result<SimulationReport, ScriptError> {
        let expected = expected_self_times(steps)?;
        let histogram = self.context.execute();
        histogram.take_samples();
        self.context.reset_long_task_stats();
        let started = self.clock.now();

        let mut guards: Vec<Guard<'_>> = Vec::new();
        for &step in steps {
            match step {
                Step::Enter => guards.push(Guard::Scope(LongTaskNestedTimedHistogramScope::new(
                    &self.context,
                    histogram,
                ))),
                Step::Pause => guards.push(Guard::Pause(PauseNestedTimedHistogramScope::new(
                    histogram,
                ))),
                Step::Leave | Step::Resume => {
                    guards.pop();
                }
                Step::Advance(dt) => {
                    self.clock.advance(dt);
                }
            }
        }

        let report = SimulationReport {
            recorded: histogram.take_samples(),
            expected: expected.iter().map(|d| d.as_micros() as i64).collect(),
            long_task: self.context.long_task_stats().execute,
            wall_time: self.clock.now() - started,
        };
        tracing::debug!(
            steps = steps.len(),
            scopes = report.expected.len(),
            matches = report.matches(),
            "simulation finished"
        );
        Ok(report)
    }
}

impl Default for ScopeSimulator {
    fn default() -> Self {
        Self::new()
    }
}
