//! Selftime Test - Scenario harness for nested timing scopes
//!
//! Provides:
//! - Scripted simulation of scope nesting on a manual clock
//! - An independent reference model of exclusive time
//! - Scenario and property tests of the measurement scopes

#[cfg(test)]
mod scenarios;
pub mod simulator;

pub use simulator::*;
