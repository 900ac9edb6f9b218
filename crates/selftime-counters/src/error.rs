//! Error types for histogram registration and lookup

use thiserror::Error;

use crate::HistogramKind;

/// Counters errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CountersError {
    #[error("Histogram already registered: {0}")]
    DuplicateHistogram(String),

    #[error("Unknown histogram: {0}")]
    UnknownHistogram(String),

    #[error("Histogram {name} is {actual:?}, expected {expected:?}")]
    KindMismatch {
        name: String,
        expected: HistogramKind,
        actual: HistogramKind,
    },
}

/// Result type for counters operations
pub type CountersResult<T> = Result<T, CountersError>;
