//! Scenario and property tests for nested self-time measurement

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use selftime_core::ManualClock;
use selftime_counters::{
    Context, ContextConfig, LogEventStatus, LongTaskNestedTimedHistogramScope,
    NestedTimedHistogramScope, PauseNestedTimedHistogramScope, RecordingEventLogger,
    TimedHistogramResolution,
};

use crate::{ScopeSimulator, ScriptNode};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn context_with_logger() -> (Context, ManualClock, RecordingEventLogger) {
    init_tracing();
    let clock = ManualClock::new();
    let logger = RecordingEventLogger::new();
    let mut context = Context::builder()
        .config(ContextConfig {
            default_resolution: TimedHistogramResolution::Millisecond,
            ..ContextConfig::default()
        })
        .clock(Arc::new(clock.clone()))
        .event_logger(logger.clone())
        .build();
    context
        .register_nested("H", TimedHistogramResolution::Millisecond)
        .unwrap();
    (context, clock, logger)
}

#[test]
fn test_scenario_a_nested_exclusivity() {
    let (context, clock, _) = context_with_logger();
    let h = context.nested("H").unwrap();

    let a = NestedTimedHistogramScope::new(&context, h);
    clock.set_millis(10);
    let b = NestedTimedHistogramScope::new(&context, h);
    clock.set_millis(30);
    drop(b);
    assert_eq!(h.samples(), vec![20]);

    clock.set_millis(50);
    drop(a);
    assert_eq!(h.samples(), vec![20, 30]);
}

#[test]
fn test_scenario_b_pause_resume() {
    let (context, clock, _) = context_with_logger();
    let h = context.nested("H").unwrap();

    let a = NestedTimedHistogramScope::new(&context, h);
    clock.set_millis(5);
    let pause = PauseNestedTimedHistogramScope::new(h);
    clock.set_millis(25);
    drop(pause);
    clock.set_millis(40);
    drop(a);

    assert_eq!(h.samples(), vec![20]);
}

#[test]
fn test_scenario_c_disabled_histogram() {
    let (context, clock, logger) = context_with_logger();
    let h = context.nested("H").unwrap();
    h.set_enabled(false);

    {
        let _scope = NestedTimedHistogramScope::new(&context, h);
        assert!(h.is_idle());
        clock.set_millis(10);
    }

    assert_eq!(h.sample_count(), 0);
    assert!(h.is_idle());
    let statuses: Vec<_> = logger.events().into_iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![LogEventStatus::Start, LogEventStatus::End]);
}

#[test]
fn test_scenario_d_triple_nesting() {
    let (context, clock, _) = context_with_logger();
    let h = context.nested("H").unwrap();

    let a = NestedTimedHistogramScope::new(&context, h);
    clock.set_millis(10);
    let b = NestedTimedHistogramScope::new(&context, h);
    clock.set_millis(20);
    let c = NestedTimedHistogramScope::new(&context, h);
    clock.set_millis(50);
    drop(c);
    clock.set_millis(80);
    drop(b);
    clock.set_millis(100);
    drop(a);

    assert_eq!(h.samples(), vec![30, 40, 30]);
}

#[test]
fn test_scenario_e_pause_on_empty_stack() {
    let (context, clock, logger) = context_with_logger();
    let h = context.nested("H").unwrap();

    {
        let pause = PauseNestedTimedHistogramScope::new(h);
        assert!(!pause.paused_scope());
        clock.set_millis(10);
    }

    assert!(h.is_idle());
    assert_eq!(h.sample_count(), 0);
    assert!(logger.is_empty());
}

#[test]
fn test_long_task_only_from_execute_record_scopes() {
    let (context, clock, _) = context_with_logger();
    let h = context.nested("H").unwrap();

    {
        let _skip = NestedTimedHistogramScope::new(&context, context.execute());
        clock.set_millis(10);
    }
    {
        let _other = LongTaskNestedTimedHistogramScope::new(&context, h);
        clock.set_millis(20);
    }
    assert_eq!(context.long_task_stats().execute, Duration::ZERO);

    {
        let _record = LongTaskNestedTimedHistogramScope::new(&context, context.execute());
        clock.set_millis(35);
    }
    assert_eq!(context.long_task_stats().execute, Duration::from_millis(15));
}

#[test]
fn test_context_scope_helpers() {
    let (context, clock, logger) = context_with_logger();

    {
        let _outer = context.nested_scope("H").unwrap();
        clock.set_millis(4);
        let _pause = context.pause_scope("H").unwrap();
        clock.set_millis(9);
    }
    assert_eq!(context.nested("H").unwrap().samples(), vec![4]);
    assert_eq!(logger.len(), 2);

    assert!(context.nested_scope("missing").is_err());
    assert!(context.timed_scope("H").is_ok());
}

fn script_strategy() -> impl Strategy<Value = ScriptNode> {
    let leaf = (0u64..50).prop_map(ScriptNode::Work);
    leaf.prop_recursive(5, 48, 6, |inner| {
        prop_oneof![
            3 => prop::collection::vec(inner.clone(), 0..6).prop_map(ScriptNode::Scope),
            1 => prop::collection::vec(inner, 0..4).prop_map(ScriptNode::Pause),
        ]
    })
}

proptest! {
    #[test]
    fn prop_recorded_samples_are_exclusive_time(body in prop::collection::vec(script_strategy(), 0..5)) {
        let simulator = ScopeSimulator::new();
        let report = simulator.run_script(&ScriptNode::Scope(body)).unwrap();

        prop_assert_eq!(&report.recorded, &report.expected);
        prop_assert!(report.matches());
        prop_assert!(simulator.context().execute().is_idle());

        // Samples never exceed wall time in total
        let total: i64 = report.recorded.iter().sum();
        prop_assert!(total as u128 <= report.wall_time.as_micros());
    }

    #[test]
    fn prop_disabled_histogram_records_nothing(body in prop::collection::vec(script_strategy(), 0..5)) {
        let simulator = ScopeSimulator::with_config(ContextConfig::disabled());
        let report = simulator.run_script(&ScriptNode::Scope(body)).unwrap();

        prop_assert!(report.recorded.is_empty());
        prop_assert_eq!(report.long_task, Duration::ZERO);
        prop_assert!(simulator.context().execute().is_idle());
    }
}
