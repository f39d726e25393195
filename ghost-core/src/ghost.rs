//! Ghost lap selection and distance indexing
//!
//! The ghost is the reference lap a live lap is compared against. Once
//! built it is keyed by cumulative distance (strictly increasing) instead of
//! time, so any track position can be looked up by binary search.

use crate::config::ReferenceStrategy;
use crate::error::{CoachError, Result};
use crate::model::{Lap, Position, TelemetrySample};
use crate::track::Centerline;
use crate::units::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use tracing::info;

/// One ghost sample: lap distance, elapsed time and the recorded inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhostPoint {
    pub distance: Meters,
    pub elapsed: Seconds,
    pub position: Position,
    pub speed: MetersPerSecond,
    pub throttle: Percentage,
    pub brake: Percentage,
    pub longitudinal_g: GForce,
    pub lateral_g: GForce,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm: Option<Rpm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steering: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gear: Option<i8>,
}

impl GhostPoint {
    fn from_sample(sample: &TelemetrySample, start: Seconds) -> Self {
        Self {
            distance: sample.distance,
            elapsed: sample.timestamp - start,
            position: sample.position,
            speed: sample.speed,
            throttle: sample.throttle,
            brake: sample.brake,
            longitudinal_g: sample.longitudinal_g,
            lateral_g: sample.lateral_g,
            rpm: sample.rpm,
            steering: sample.steering,
            gear: sample.gear,
        }
    }

    /// Blend two neighbouring points; discrete fields come from `a`
    fn interpolate(a: &GhostPoint, b: &GhostPoint, t: f64) -> GhostPoint {
        let blend = |x: f64, y: f64| lerp(x, y, t);
        GhostPoint {
            distance: Meters(blend(a.distance.0, b.distance.0)),
            elapsed: Seconds(blend(a.elapsed.0, b.elapsed.0)),
            position: Position::new(
                blend(a.position.x, b.position.x),
                blend(a.position.y, b.position.y),
            ),
            speed: MetersPerSecond(blend(a.speed.0, b.speed.0)),
            throttle: Percentage::new(blend(a.throttle.0, b.throttle.0)),
            brake: Percentage::new(blend(a.brake.0, b.brake.0)),
            longitudinal_g: GForce(blend(a.longitudinal_g.0, b.longitudinal_g.0)),
            lateral_g: GForce(blend(a.lateral_g.0, b.lateral_g.0)),
            rpm: match (a.rpm, b.rpm) {
                (Some(x), Some(y)) => Some(Rpm(blend(x.0, y.0))),
                (x, _) => x,
            },
            steering: match (a.steering, b.steering) {
                (Some(x), Some(y)) => Some(blend(x, y)),
                (x, _) => x,
            },
            gear: a.gear,
        }
    }
}

/// Reference lap indexed by cumulative distance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GhostRecord")]
pub struct GhostLap {
    source_lap: usize,
    lap_time: Seconds,
    points: Vec<GhostPoint>,
}

/// Unvalidated on-disk form of a ghost lap
#[derive(Deserialize)]
struct GhostRecord {
    source_lap: usize,
    lap_time: Seconds,
    points: Vec<GhostPoint>,
}

impl TryFrom<GhostRecord> for GhostLap {
    type Error = CoachError;

    fn try_from(record: GhostRecord) -> Result<Self> {
        if record.points.len() < 2 {
            return Err(CoachError::InvalidLap(
                "cached ghost needs at least two points".to_string(),
            ));
        }
        if record
            .points
            .windows(2)
            .any(|w| w[1].distance.0 <= w[0].distance.0 || w[1].elapsed.0 < w[0].elapsed.0)
        {
            return Err(CoachError::InvalidLap(
                "cached ghost is not strictly ordered by distance".to_string(),
            ));
        }
        Ok(Self {
            source_lap: record.source_lap,
            lap_time: record.lap_time,
            points: record.points,
        })
    }
}

/// Pick the reference lap from a session
///
/// Only laps flagged valid with at least two samples are candidates. Ties
/// go to the earliest lap index.
pub fn select_reference(laps: &[Lap], strategy: ReferenceStrategy) -> Result<&Lap> {
    let candidates: Vec<&Lap> = laps
        .iter()
        .filter(|lap| lap.valid && lap.samples.len() >= 2)
        .collect();
    if candidates.is_empty() {
        return Err(CoachError::NoValidLap);
    }

    let key: Box<dyn Fn(&Lap) -> f64> = match strategy {
        ReferenceStrategy::Fastest => Box::new(|lap| lap.lap_time().0),
        ReferenceStrategy::Median => {
            let target = median(candidates.iter().map(|l| l.lap_time().0));
            Box::new(move |lap| (lap.lap_time().0 - target).abs())
        }
    };

    candidates
        .into_iter()
        .min_by(|a, b| {
            key(a)
                .partial_cmp(&key(b))
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        })
        .ok_or(CoachError::NoValidLap)
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut sorted: Vec<f64> = values.collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

impl GhostLap {
    /// Select the reference lap and index it by distance
    pub fn build(laps: &[Lap], strategy: ReferenceStrategy) -> Result<Self> {
        let lap = select_reference(laps, strategy)?;
        let ghost = Self::from_lap(lap)?;
        info!(
            "Ghost built from lap {} ({:?}): {:.3}s over {} points",
            ghost.source_lap,
            strategy,
            ghost.lap_time.0,
            ghost.points.len()
        );
        Ok(ghost)
    }

    /// Re-index one lap by distance
    ///
    /// Samples that do not advance the distance, or whose timestamp goes
    /// backwards, are skipped so the key stays strictly increasing and the
    /// elapsed time never falls.
    pub fn from_lap(lap: &Lap) -> Result<Self> {
        let start = lap
            .start_time()
            .ok_or_else(|| CoachError::InvalidLap(format!("lap {} is empty", lap.index)))?;

        let mut points: Vec<GhostPoint> = Vec::with_capacity(lap.samples.len());
        for sample in &lap.samples {
            let advances = points.last().map_or(true, |last| {
                sample.distance.0 > last.distance.0
                    && (sample.timestamp - start).0 >= last.elapsed.0
            });
            if advances {
                points.push(GhostPoint::from_sample(sample, start));
            }
        }

        if points.len() < 2 {
            return Err(CoachError::InvalidLap(format!(
                "lap {} does not advance along the track",
                lap.index
            )));
        }

        Ok(Self {
            source_lap: lap.index,
            lap_time: lap.lap_time(),
            points,
        })
    }

    pub fn source_lap(&self) -> usize {
        self.source_lap
    }

    pub fn lap_time(&self) -> Seconds {
        self.lap_time
    }

    pub fn points(&self) -> &[GhostPoint] {
        &self.points
    }

    pub fn first_distance(&self) -> Meters {
        self.points[0].distance
    }

    pub fn last_distance(&self) -> Meters {
        self.points[self.points.len() - 1].distance
    }

    pub fn contains(&self, distance: Meters) -> bool {
        (self.first_distance().0..=self.last_distance().0).contains(&distance.0)
    }

    /// Index of the first point strictly beyond `distance`, from `hint` on
    pub(crate) fn upper_index(&self, distance: f64, hint: usize) -> usize {
        let hint = hint.min(self.points.len());
        hint + self.points[hint..].partition_point(|p| p.distance.0 <= distance)
    }

    /// Interpolated point from the bracketing pair ending at `upper`
    pub(crate) fn point_between(&self, distance: f64, upper: usize) -> GhostPoint {
        let last = self.points.len() - 1;
        if upper == 0 {
            return self.points[0].clone();
        }
        if upper > last {
            return self.points[last].clone();
        }
        let (a, b) = (&self.points[upper - 1], &self.points[upper]);
        if distance <= a.distance.0 {
            return a.clone();
        }
        let t = (distance - a.distance.0) / (b.distance.0 - a.distance.0);
        GhostPoint::interpolate(a, b, t)
    }

    /// Ghost state at `distance`, interpolated between recorded samples
    ///
    /// Never extrapolates: distances outside the recorded range fail.
    pub fn sample_at(&self, distance: Meters) -> Result<GhostPoint> {
        if !self.contains(distance) {
            return Err(CoachError::OutOfRange {
                distance: distance.0,
                min: self.first_distance().0,
                max: self.last_distance().0,
            });
        }
        Ok(self.point_clamped(distance))
    }

    pub fn elapsed_at(&self, distance: Meters) -> Result<Seconds> {
        self.sample_at(distance).map(|p| p.elapsed)
    }

    /// Ghost state at `distance`, clamped to the nearest recorded endpoint
    pub fn point_clamped(&self, distance: Meters) -> GhostPoint {
        let d = distance
            .0
            .clamp(self.first_distance().0, self.last_distance().0);
        self.point_between(d, self.upper_index(d, 0))
    }

    /// Driving line of the ghost, for coordinate based sector lookup
    pub fn centerline(&self) -> Result<Centerline> {
        Centerline::new(
            self.points
                .iter()
                .map(|p| (p.position, p.distance))
                .collect(),
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
