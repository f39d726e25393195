//! Coaching session context
//!
//! A `CoachSession` owns everything one driver's live stream needs: the
//! ghost, the alignment cursor, the delta log, the insight engine and the
//! predictive timer. Track geometry is shared read-only between sessions.
//! Samples are processed strictly in arrival order with no I/O.

use crate::align::{AlignmentCursor, Confidence};
use crate::config::CoachConfig;
use crate::delta::{DeltaLog, DeltaRecord, Mark};
use crate::error::{CoachError, Result};
use crate::ghost::GhostLap;
use crate::insight::{Insight, InsightEngine, InsightInput};
use crate::model::{Lap, SourceEvent, TelemetrySample};
use crate::predictor::{PaceInput, PredictiveTimer};
use crate::track::{Location, SectorLocator, TrackGeometry, TrackPosition};
use crate::units::{Meters, Seconds};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of processing one live sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachUpdate {
    pub lap: usize,
    pub distance: Meters,
    pub sector: usize,
    pub live_elapsed: Seconds,
    pub ghost_elapsed: Seconds,
    /// Instantaneous delta, withheld for unaligned samples
    pub delta: Option<Seconds>,
    pub confidence: Confidence,
    /// Sectors closed by this sample
    pub closed: Vec<DeltaRecord>,
    pub insight: Option<Insight>,
    pub projected_lap_time: Option<Seconds>,
}

/// Summary of a completed lap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LapReport {
    pub lap: usize,
    pub live_lap_time: Seconds,
    pub ghost_lap_time: Seconds,
    /// Delta at the last sample, `None` if it was unaligned
    pub final_delta: Option<Seconds>,
    pub sectors: Vec<DeltaRecord>,
}

/// What a source event produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionOutput {
    Update(CoachUpdate),
    LapComplete(LapReport),
    /// End of lap arrived before any sample
    Idle,
}

pub struct CoachSession {
    id: String,
    locator: SectorLocator,
    ghost: GhostLap,
    cursor: AlignmentCursor,
    deltas: DeltaLog,
    insights: InsightEngine,
    timer: PredictiveTimer,
    lap_start: Option<Seconds>,
    lap: usize,
    history: Vec<LapReport>,
    dropped: usize,
}

impl CoachSession {
    /// Set up a session against an existing ghost
    ///
    /// Fails with `OutOfRange` if any inner sector boundary lies outside the
    /// ghost's recorded distance, since that sector could never be closed
    /// against a real ghost time.
    pub fn new(
        id: impl Into<String>,
        track: Arc<TrackGeometry>,
        ghost: GhostLap,
        config: &CoachConfig,
    ) -> Result<Self> {
        let inner = &track.boundaries()[..track.sector_count() - 1];
        if let Some(&boundary) = inner.iter().find(|&&b| !ghost.contains(Meters(b))) {
            return Err(CoachError::OutOfRange {
                distance: boundary,
                min: ghost.first_distance().0,
                max: ghost.last_distance().0,
            });
        }

        let locator = SectorLocator::new(track.clone()).with_centerline(ghost.centerline()?);
        let id = id.into();
        info!(
            "Session {} ready on {}: ghost lap {} ({:.3}s), {} sectors",
            id,
            track.name(),
            ghost.source_lap(),
            ghost.lap_time().0,
            track.sector_count()
        );

        Ok(Self {
            id,
            locator,
            ghost,
            cursor: AlignmentCursor::new(),
            deltas: DeltaLog::new(),
            insights: InsightEngine::new(config.insights.clone()),
            timer: PredictiveTimer::new(config.predictor.clone()),
            lap_start: None,
            lap: 0,
            history: Vec::new(),
            dropped: 0,
        })
    }

    /// Build the ghost from a session's laps, then set up
    pub fn from_laps(
        id: impl Into<String>,
        track: Arc<TrackGeometry>,
        laps: &[Lap],
        config: &CoachConfig,
    ) -> Result<Self> {
        let ghost = GhostLap::build(laps, config.laps.reference)?;
        Self::new(id, track, ghost, config)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn track(&self) -> &TrackGeometry {
        self.locator.geometry()
    }

    /// Resolve a raw position, using the ghost's driving line for coordinates
    pub fn locate(&self, position: TrackPosition) -> Result<Location> {
        self.locator.locate(position)
    }

    pub fn ghost(&self) -> &GhostLap {
        &self.ghost
    }

    /// Lap in progress (0-based)
    pub fn lap(&self) -> usize {
        self.lap
    }

    /// Closed sectors of the lap in progress
    pub fn deltas(&self) -> &[DeltaRecord] {
        self.deltas.records()
    }

    pub fn history(&self) -> &[LapReport] {
        &self.history
    }

    /// Samples rejected as out of order or malformed
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn handle(&mut self, event: &SourceEvent) -> Result<SessionOutput> {
        match event {
            SourceEvent::Sample(sample) => self.process(sample).map(SessionOutput::Update),
            SourceEvent::EndOfLap => Ok(self
                .end_lap()
                .map(SessionOutput::LapComplete)
                .unwrap_or(SessionOutput::Idle)),
        }
    }

    /// Run one live sample through the pipeline
    ///
    /// A distance regression returns `Sequence` and a non-finite distance or
    /// timestamp returns `InvalidSample`. Either leaves all state as it was;
    /// the caller drops the sample and carries on.
    pub fn process(&mut self, sample: &TelemetrySample) -> Result<CoachUpdate> {
        let checked = if sample.timestamp.0.is_finite() {
            self.cursor.check(sample.distance)
        } else {
            Err(CoachError::InvalidSample(format!(
                "timestamp is not finite ({})",
                sample.timestamp.0
            )))
        };
        if let Err(e) = checked {
            self.dropped += 1;
            warn!("Session {}: dropping sample: {}", self.id, e);
            return Err(e);
        }

        let start = *self.lap_start.get_or_insert(sample.timestamp);
        let live_elapsed = sample.timestamp - start;

        let alignment = self.cursor.advance(&self.ghost, sample.distance)?;
        let sector = self.locator.sector_clamped(sample.distance);
        let confidence = alignment.confidence;

        let closed = self.deltas.observe(
            self.locator.geometry(),
            &self.ghost,
            sector,
            Mark {
                distance: sample.distance,
                live: live_elapsed,
                ghost: alignment.ghost_elapsed,
                confidence,
            },
        );

        let aligned = confidence.is_aligned();
        let delta = aligned.then(|| live_elapsed - alignment.ghost_elapsed);
        let sector_delta = self
            .deltas
            .open_sector()
            .filter(|_| aligned)
            .and_then(|(_, entry)| delta.map(|d| d - entry.delta()));
        let last_closed = self.deltas.last_closed();

        let insight = self.insights.update(&InsightInput {
            live: sample,
            ghost: &alignment.ghost,
            sector,
            delta,
            sector_delta,
            last_closed,
            confidence,
        });

        let projected_lap_time = self.timer.update(&PaceInput {
            elapsed: live_elapsed,
            distance: sample.distance,
            lap_distance: self.locator.geometry().total_distance(),
            ghost_lap_time: self.ghost.lap_time(),
            ghost_elapsed: aligned.then_some(alignment.ghost_elapsed),
            last_closed,
        });

        Ok(CoachUpdate {
            lap: self.lap,
            distance: sample.distance,
            sector,
            live_elapsed,
            ghost_elapsed: alignment.ghost_elapsed,
            delta,
            confidence,
            closed,
            insight,
            projected_lap_time,
        })
    }

    /// Explicit end-of-lap marker: close the open sector and start over
    pub fn end_lap(&mut self) -> Option<LapReport> {
        let last = self.deltas.last_mark()?;
        self.deltas.finish();

        let report = LapReport {
            lap: self.lap,
            live_lap_time: last.live,
            ghost_lap_time: self.ghost.lap_time(),
            final_delta: last.confidence.is_aligned().then(|| last.delta()),
            sectors: self.deltas.records().to_vec(),
        };
        info!(
            "Session {}: lap {} complete in {:.3}s ({} sectors)",
            self.id,
            report.lap,
            report.live_lap_time.0,
            report.sectors.len()
        );

        self.cursor.reset();
        self.deltas.reset();
        self.insights.reset();
        self.timer.reset();
        self.lap_start = None;
        self.lap += 1;
        self.history.push(report.clone());
        Some(report)
    }
}
