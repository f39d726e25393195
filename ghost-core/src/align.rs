//! Distance-based alignment of live samples against the ghost
//!
//! A live sample is compared with the ghost at the same track position,
//! not at the same wall-clock time. Positions outside the ghost's recorded
//! range are clamped to the nearest endpoint and flagged unaligned.

use crate::error::{CoachError, Result};
use crate::ghost::{GhostLap, GhostPoint};
use crate::units::{Meters, Seconds};
use serde::{Deserialize, Serialize};

/// How far a comparison can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    #[default]
    Aligned,
    /// Position fell outside the ghost's recorded range
    Unaligned,
}

impl Confidence {
    pub fn is_aligned(&self) -> bool {
        matches!(self, Confidence::Aligned)
    }

    /// Unaligned if either side is
    pub fn and(self, other: Confidence) -> Confidence {
        if self.is_aligned() && other.is_aligned() {
            Confidence::Aligned
        } else {
            Confidence::Unaligned
        }
    }
}

/// Ghost state matched to a live track position
#[derive(Debug, Clone)]
pub struct Alignment {
    pub distance: Meters,
    pub ghost_elapsed: Seconds,
    pub ghost: GhostPoint,
    pub confidence: Confidence,
}

fn confidence_for(ghost: &GhostLap, distance: Meters) -> Confidence {
    if ghost.contains(distance) {
        Confidence::Aligned
    } else {
        Confidence::Unaligned
    }
}

/// One-off alignment by binary search
pub fn align(ghost: &GhostLap, distance: Meters) -> Alignment {
    let point = ghost.point_clamped(distance);
    Alignment {
        distance,
        ghost_elapsed: point.elapsed,
        ghost: point,
        confidence: confidence_for(ghost, distance),
    }
}

/// Forward-only alignment for a live stream
///
/// Live distance never decreases within a lap, so the bracketing ghost
/// index only moves forward and each lookup is amortized O(1).
#[derive(Debug, Clone, Default)]
pub struct AlignmentCursor {
    upper: usize,
    last_distance: Option<Meters>,
}

impl AlignmentCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_distance(&self) -> Option<Meters> {
        self.last_distance
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Reject a non-finite distance or a regression without touching the cursor
    pub fn check(&self, distance: Meters) -> Result<()> {
        if !distance.0.is_finite() {
            return Err(CoachError::InvalidSample(format!(
                "distance is not finite ({})",
                distance.0
            )));
        }
        match self.last_distance {
            Some(previous) if distance.0 < previous.0 => Err(CoachError::Sequence {
                previous: previous.0,
                current: distance.0,
            }),
            _ => Ok(()),
        }
    }

    pub fn advance(&mut self, ghost: &GhostLap, distance: Meters) -> Result<Alignment> {
        self.check(distance)?;

        let points = ghost.points();
        let d = distance
            .0
            .clamp(ghost.first_distance().0, ghost.last_distance().0);
        while self.upper < points.len() && points[self.upper].distance.0 <= d {
            self.upper += 1;
        }
        self.last_distance = Some(distance);

        let point = ghost.point_between(d, self.upper);
        Ok(Alignment {
            distance,
            ghost_elapsed: point.elapsed,
            ghost: point,
            confidence: confidence_for(ghost, distance),
        })
    }
}
