//! Error types for selftime core

use thiserror::Error;

use crate::Ticks;

/// Core selftime errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Clock regression: {requested:?} is before {current:?}")]
    ClockRegression { current: Ticks, requested: Ticks },
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
