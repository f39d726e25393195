//! Per-sector time deltas
//!
//! Sector records are closed at the exact boundary distance: live time at
//! the boundary is interpolated between the two samples straddling it, ghost
//! time is read from the ghost at the same distance. A record is never
//! touched again once appended.

use crate::align::Confidence;
use crate::ghost::GhostLap;
use crate::track::TrackGeometry;
use crate::units::{lerp, Meters, Seconds};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Time lost or gained over one closed sector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub sector_index: usize,
    /// Live time spent in the sector
    pub live_elapsed: Seconds,
    /// Ghost time over the same stretch of track
    pub ghost_elapsed: Seconds,
    /// `live_elapsed - ghost_elapsed`; positive means slower than the ghost
    pub delta: Seconds,
    /// Lap delta at the point the sector closed
    pub cumulative_delta: Seconds,
    pub confidence: Confidence,
}

/// Live and ghost elapsed time at one track position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mark {
    pub distance: Meters,
    pub live: Seconds,
    pub ghost: Seconds,
    pub confidence: Confidence,
}

impl Mark {
    pub fn delta(&self) -> Seconds {
        self.live - self.ghost
    }
}

/// Ordered log of closed sectors for the lap in progress
#[derive(Debug, Default)]
pub struct DeltaLog {
    records: Vec<DeltaRecord>,
    open: Option<(usize, Mark)>,
    last: Option<Mark>,
}

impl DeltaLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[DeltaRecord] {
        &self.records
    }

    pub fn last_closed(&self) -> Option<&DeltaRecord> {
        self.records.last()
    }

    /// Sector currently open and where it was entered
    pub fn open_sector(&self) -> Option<(usize, Mark)> {
        self.open
    }

    pub fn last_mark(&self) -> Option<Mark> {
        self.last
    }

    /// Record a sample in `sector`; returns the sectors it closed, in order
    pub fn observe(
        &mut self,
        track: &TrackGeometry,
        ghost: &GhostLap,
        sector: usize,
        mark: Mark,
    ) -> Vec<DeltaRecord> {
        let mut closed = Vec::new();

        let (open_sector, mut entry) = match self.open {
            Some(open) => open,
            None => {
                self.open = Some((sector, mark));
                self.last = Some(mark);
                return closed;
            }
        };

        if sector > open_sector {
            let previous = self.last.unwrap_or(entry);
            for index in open_sector..sector {
                let Some(boundary) = track.sector_end(index) else {
                    break;
                };
                let at_boundary = boundary_mark(ghost, &previous, &mark, boundary);
                closed.push(self.close(index, &entry, &at_boundary));
                entry = at_boundary;
            }
            self.open = Some((sector, entry));
        }

        self.last = Some(mark);
        closed
    }

    /// Close the open sector at the last observed sample (end of lap)
    pub fn finish(&mut self) -> Option<DeltaRecord> {
        let (sector, entry) = self.open.take()?;
        let last = self.last?;
        Some(self.close(sector, &entry, &last))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn close(&mut self, sector_index: usize, entry: &Mark, exit: &Mark) -> DeltaRecord {
        let live_elapsed = exit.live - entry.live;
        let ghost_elapsed = exit.ghost - entry.ghost;
        let record = DeltaRecord {
            sector_index,
            live_elapsed,
            ghost_elapsed,
            delta: live_elapsed - ghost_elapsed,
            cumulative_delta: exit.delta(),
            confidence: entry.confidence.and(exit.confidence),
        };
        debug!(
            "Sector {} closed at {:.1} m: {:+.3}s",
            sector_index, exit.distance.0, record.delta.0
        );
        self.records.push(record.clone());
        record
    }
}

/// Live/ghost times at a sector boundary between two consecutive samples
fn boundary_mark(ghost: &GhostLap, before: &Mark, after: &Mark, boundary: Meters) -> Mark {
    let span = after.distance.0 - before.distance.0;
    let t = if span > 0.0 {
        ((boundary.0 - before.distance.0) / span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let confidence = if ghost.contains(boundary) {
        Confidence::Aligned
    } else {
        Confidence::Unaligned
    };
    Mark {
        distance: boundary,
        live: Seconds(lerp(before.live.0, after.live.0, t)),
        ghost: ghost.point_clamped(boundary).elapsed,
        confidence,
    }
}
