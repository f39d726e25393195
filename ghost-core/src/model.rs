//! Telemetry data model
//!
//! A `TelemetrySample` is one immutable reading from the car. Samples are
//! grouped into `Lap`s, ordered by timestamp, and carry the cumulative
//! distance from the start/finish line used to align live and ghost traces.

use crate::units::*;
use serde::{Deserialize, Serialize};

/// 2-D track coordinate (local meters, or GPS minutes as recorded)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One telemetry reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Capture time in seconds (session clock)
    pub timestamp: Seconds,

    /// Distance travelled since the start/finish line
    pub distance: Meters,

    /// Track coordinate
    #[serde(default)]
    pub position: Position,

    pub speed: MetersPerSecond,

    /// Throttle input (0.0 to 1.0)
    pub throttle: Percentage,

    /// Brake input (0.0 to 1.0)
    pub brake: Percentage,

    #[serde(default)]
    pub longitudinal_g: GForce,

    #[serde(default)]
    pub lateral_g: GForce,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm: Option<Rpm>,

    /// Steering angle in radians (signed: + = right)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steering: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gear: Option<i8>,
}

impl TelemetrySample {
    /// Minimal sample with neutral inputs, handy for synthetic traces
    pub fn at(timestamp: f64, distance: f64, speed: f64) -> Self {
        Self {
            timestamp: Seconds(timestamp),
            distance: Meters(distance),
            position: Position::default(),
            speed: MetersPerSecond(speed),
            throttle: Percentage::new(1.0),
            brake: Percentage::new(0.0),
            longitudinal_g: GForce(0.0),
            lateral_g: GForce(0.0),
            rpm: None,
            steering: None,
            gear: None,
        }
    }

    pub fn with_inputs(mut self, throttle: f64, brake: f64) -> Self {
        self.throttle = Percentage::new(throttle);
        self.brake = Percentage::new(brake);
        self
    }
}

/// One traversal of the circuit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lap {
    /// Position of this lap within its session (0-based)
    pub index: usize,

    pub samples: Vec<TelemetrySample>,

    /// False for out-laps, in-laps and incomplete laps
    pub valid: bool,
}

impl Lap {
    pub fn new(index: usize, samples: Vec<TelemetrySample>, valid: bool) -> Self {
        Self {
            index,
            samples,
            valid,
        }
    }

    /// Last timestamp minus first timestamp
    pub fn lap_time(&self) -> Seconds {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Seconds(0.0),
        }
    }

    pub fn start_time(&self) -> Option<Seconds> {
        self.samples.first().map(|s| s.timestamp)
    }

    /// Lap distance covered by the recorded samples
    pub fn distance_covered(&self) -> Meters {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.distance - first.distance,
            _ => Meters(0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Event yielded by a telemetry source
///
/// End of lap is always an explicit marker; it is never inferred from a
/// gap in distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceEvent {
    Sample(TelemetrySample),
    EndOfLap,
}
