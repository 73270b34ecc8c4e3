//! Construction-time validation errors for domain models.

use thiserror::Error;

use crate::video::VideoStatus;

/// Errors raised when a domain value violates its invariants.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("bounding box origin must be non-negative, got ({x}, {y})")]
    NegativeOrigin { x: f64, y: f64 },

    #[error("bounding box dimensions must be positive, got {width}x{height}")]
    EmptyBox { width: f64, height: f64 },

    #[error("confidence must be within [0.0, 1.0], got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("confidence threshold must be within [0.0, 1.0], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("model version must not be empty")]
    MissingModelVersion,

    #[error("statistics report {reported} damages but the result holds {actual}")]
    StatisticsMismatch { reported: u64, actual: usize },

    #[error("illegal status transition: {from} -> {to}")]
    InvalidTransition { from: VideoStatus, to: VideoStatus },
}
