//! Selftime Core - Time primitives for exclusive duration measurement
//!
//! This crate defines the leaf collaborators used by the measurement scopes:
//! - Monotonic timestamps (Ticks)
//! - Clock sources (MonotonicClock, ManualClock)
//! - Pausable elapsed timers (ElapsedTimer)
//! - Build-time configurable contract checks
//! - Error types

pub mod check;
pub mod clock;
pub mod error;
pub mod time;
pub mod timer;

pub use clock::*;
pub use error::*;
pub use time::*;
pub use timer::*;
