//! Error taxonomy for the coaching pipeline
//!
//! `OutOfRange`, `NoValidLap`, `InvalidGeometry` and `InvalidLap` are fatal
//! to session setup. `Sequence` and `InvalidSample` are raised per live
//! sample and are recoverable: the caller drops the sample and keeps going. An unaligned
//! sample is not an error at all, see [`crate::align::Confidence`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoachError {
    #[error("distance {distance:.3} m is outside [{min:.3}, {max:.3}] m")]
    OutOfRange { distance: f64, min: f64, max: f64 },

    #[error("no valid lap to build a ghost from")]
    NoValidLap,

    #[error("lap distance regressed from {previous:.3} m to {current:.3} m")]
    Sequence { previous: f64, current: f64 },

    #[error("invalid sample: {0}")]
    InvalidSample(String),

    #[error("invalid track geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid lap: {0}")]
    InvalidLap(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoachError {
    /// True for errors that only invalidate the current sample
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoachError::Sequence { .. } | CoachError::InvalidSample(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoachError>;
