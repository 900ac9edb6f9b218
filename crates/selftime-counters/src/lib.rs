//! Selftime Counters - Timed histograms and self-time measurement scopes
//!
//! This crate implements exclusive duration measurement for nested operations
//! inside a single execution context:
//! - Timed histograms and their per-histogram scope stacks
//! - Plain, optional and lazy scopes for non-nesting measurements
//! - Nested scopes that pause their parent while they run
//! - Pause scopes that suspend a histogram across unmeasured external work
//! - The per-context registry, long-task aggregate and event logging
//!
//! Scopes are guards: construction starts the measurement, `Drop` finishes
//! it, so bookkeeping runs on every exit path.

pub mod context;
pub mod error;
pub mod histogram;
pub mod log;
pub mod nested;
pub mod scopes;
pub mod stack;

pub use context::*;
pub use error::*;
pub use histogram::*;
pub use log::*;
pub use nested::*;
pub use scopes::*;
pub use stack::*;
