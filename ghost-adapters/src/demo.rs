//! Demo source that generates synthetic laps
//!
//! Simulates laps around a circuit with straights, braking zones, corners,
//! and acceleration phases. Every lap covers exactly the same distance; pace
//! varies per lap and per segment so that the live driver gains and loses
//! time against a ghost in different places.

use anyhow::{bail, Result};
use ghost_core::model::{Lap, Position, SourceEvent, TelemetrySample};
use ghost_core::source::TelemetrySource;
use ghost_core::units::*;
use std::collections::VecDeque;
use std::f64::consts::TAU;
use tracing::debug;

// =============================================================================
// Track definition: a sequence of segments that form a lap
// =============================================================================

#[derive(Clone, Copy)]
enum SegmentKind {
    Straight,   // Full throttle, top speed
    Braking,    // Heavy braking into a corner
    Corner,     // Constant-ish speed cornering
    Accel,      // Accelerating out of a corner
}

#[derive(Clone, Copy)]
struct TrackSegment {
    kind: SegmentKind,
    duration: f64,       // seconds to traverse at reference pace
    target_speed: f64,   // m/s at end of segment
    steering: f64,       // peak steering angle in radians (signed: + = right)
    lateral_g: f64,      // peak lateral G
}

/// A simple circuit: ~85s lap, mix of corners and straights
fn demo_track() -> Vec<TrackSegment> {
    vec![
        // Start/finish straight
        TrackSegment { kind: SegmentKind::Straight, duration: 8.0,  target_speed: 75.0, steering: 0.0,   lateral_g: 0.0 },
        // T1: heavy braking into slow right-hander
        TrackSegment { kind: SegmentKind::Braking,  duration: 3.0,  target_speed: 28.0, steering: 0.02,  lateral_g: 0.1 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 4.0,  target_speed: 25.0, steering: 0.35,  lateral_g: 1.8 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 3.5,  target_speed: 55.0, steering: 0.1,   lateral_g: 0.4 },
        // Short straight
        TrackSegment { kind: SegmentKind::Straight, duration: 4.0,  target_speed: 62.0, steering: 0.0,   lateral_g: 0.0 },
        // T2: medium braking into fast left-hander
        TrackSegment { kind: SegmentKind::Braking,  duration: 2.0,  target_speed: 45.0, steering: -0.02, lateral_g: -0.1 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 3.5,  target_speed: 42.0, steering: -0.22, lateral_g: -1.5 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 3.0,  target_speed: 58.0, steering: -0.05, lateral_g: -0.3 },
        // Back straight
        TrackSegment { kind: SegmentKind::Straight, duration: 10.0, target_speed: 80.0, steering: 0.0,   lateral_g: 0.0 },
        // T3: chicane, quick right-left
        TrackSegment { kind: SegmentKind::Braking,  duration: 2.5,  target_speed: 35.0, steering: 0.05,  lateral_g: 0.2 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 2.0,  target_speed: 32.0, steering: 0.30,  lateral_g: 1.6 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 2.0,  target_speed: 30.0, steering: -0.32, lateral_g: -1.7 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 3.0,  target_speed: 50.0, steering: -0.05, lateral_g: -0.2 },
        // Medium straight
        TrackSegment { kind: SegmentKind::Straight, duration: 6.0,  target_speed: 68.0, steering: 0.0,   lateral_g: 0.0 },
        // T4: long sweeping right
        TrackSegment { kind: SegmentKind::Braking,  duration: 1.5,  target_speed: 52.0, steering: 0.03,  lateral_g: 0.1 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 5.0,  target_speed: 50.0, steering: 0.18,  lateral_g: 1.3 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 3.0,  target_speed: 60.0, steering: 0.05,  lateral_g: 0.3 },
        // T5: tight hairpin left
        TrackSegment { kind: SegmentKind::Braking,  duration: 3.5,  target_speed: 22.0, steering: -0.03, lateral_g: -0.1 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 4.5,  target_speed: 20.0, steering: -0.42, lateral_g: -1.2 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 4.0,  target_speed: 55.0, steering: -0.1,  lateral_g: -0.3 },
        // Run to start/finish
        TrackSegment { kind: SegmentKind::Straight, duration: 6.0,  target_speed: 72.0, steering: 0.0,   lateral_g: 0.0 },
    ]
}

impl TrackSegment {
    /// Distance covered at progress `u` through the segment
    ///
    /// Speed follows `lerp(entry, target, smoothstep(u))`, whose integral
    /// is closed-form. The result does not depend on pace: a slower driver
    /// takes longer at proportionally lower speed.
    fn distance_at(&self, entry_speed: f64, u: f64) -> f64 {
        let u = u.clamp(0.0, 1.0);
        let smooth_integral = u * u * u - u * u * u * u / 2.0;
        self.duration * (entry_speed * u + (self.target_speed - entry_speed) * smooth_integral)
    }
}

// =============================================================================
// Sample state, derived from track position
// =============================================================================

struct SampleState {
    speed: f64,
    throttle: f64,
    brake: f64,
    steering: f64,
    lateral_g: f64,
    longitudinal_g: f64,
    gear: i8,
    rpm: f64,
}

fn compute_state(seg: &TrackSegment, entry_speed: f64, u: f64, pace: f64) -> SampleState {
    // Smooth interpolation of speed through the segment
    let smooth_u = smoothstep(u);
    let speed = lerp(entry_speed, seg.target_speed, smooth_u) / pace;

    // Inputs based on segment kind
    let (throttle, brake) = match seg.kind {
        SegmentKind::Straight => (0.95 + 0.05 * (1.0 - u), 0.0), // slight lift approaching end
        SegmentKind::Braking => {
            let brake_force = 1.0 - smooth_u * 0.3; // starts heavy, eases off
            (0.0, brake_force.clamp(0.0, 1.0))
        }
        SegmentKind::Corner => (0.2 + 0.3 * u, 0.0),
        SegmentKind::Accel => (0.5 + 0.5 * smooth_u, 0.0),
    };

    // Steering: ramp in during first half, ramp out during second half
    let steer_envelope = if u < 0.5 {
        smoothstep(u * 2.0)
    } else {
        smoothstep((1.0 - u) * 2.0)
    };

    let speed_rate = (seg.target_speed - entry_speed) / (seg.duration * pace * pace);
    let gear = speed_to_gear(speed);

    SampleState {
        speed,
        throttle,
        brake,
        steering: seg.steering * steer_envelope,
        lateral_g: seg.lateral_g * steer_envelope / (pace * pace),
        longitudinal_g: speed_rate / 9.81,
        gear,
        rpm: speed_to_rpm(speed, gear),
    }
}

fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn speed_to_gear(speed_ms: f64) -> i8 {
    let kph = speed_ms * 3.6;
    match kph {
        x if x < 40.0 => 1,
        x if x < 80.0 => 2,
        x if x < 120.0 => 3,
        x if x < 170.0 => 4,
        x if x < 230.0 => 5,
        _ => 6,
    }
}

fn speed_to_rpm(speed_ms: f64, gear: i8) -> f64 {
    // Approximate RPM curve per gear: lower gear = higher RPM for same speed
    let base_ratio = match gear {
        1 => 130.0,
        2 => 85.0,
        3 => 60.0,
        4 => 45.0,
        5 => 36.0,
        _ => 30.0,
    };
    (speed_ms * base_ratio + 1200.0).clamp(1200.0, 8000.0)
}

/// Simple deterministic noise from a seed
fn noise(seed: f64) -> f64 {
    let x = (seed * 12.9898 + 78.233).sin() * 43_758.547;
    x - x.floor()
}

/// Small jitter centered around 0
fn jitter(seed: f64, amplitude: f64) -> f64 {
    (noise(seed) - 0.5) * 2.0 * amplitude
}

// =============================================================================
// DemoSource
// =============================================================================

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub sample_rate_hz: f64,
    /// Maximum per-segment deviation from reference pace (0.02 = ±2%)
    pub pace_spread: f64,
    /// Stop after this many laps; `None` runs forever
    pub laps: Option<usize>,
    pub seed: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 10.0,
            pace_spread: 0.02,
            laps: None,
            seed: 1.0,
        }
    }
}

pub struct DemoSource {
    config: DemoConfig,
    track: Vec<TrackSegment>,
    /// Cumulative distance at the start of each segment
    offsets: Vec<f64>,
    lap_length: f64,
    active: bool,
    lap: usize,
    session_time: f64,
    pending: VecDeque<SourceEvent>,
}

impl DemoSource {
    pub fn new(config: DemoConfig) -> Result<Self> {
        if !(config.sample_rate_hz > 0.0) {
            bail!("sample rate must be positive, got {}", config.sample_rate_hz);
        }
        let track = demo_track();
        let mut offsets = Vec::with_capacity(track.len());
        let mut lap_length = 0.0;
        for (i, seg) in track.iter().enumerate() {
            offsets.push(lap_length);
            lap_length += seg.distance_at(entry_speed(&track, i), 1.0);
        }
        Ok(Self {
            config,
            track,
            offsets,
            lap_length,
            active: false,
            lap: 0,
            session_time: 0.0,
            pending: VecDeque::new(),
        })
    }

    pub fn lap_length(&self) -> Meters {
        Meters(self.lap_length)
    }

    /// Lap time at reference pace
    pub fn reference_lap_time(&self) -> Seconds {
        Seconds(self.track.iter().map(|s| s.duration).sum())
    }

    /// Per-segment pace multipliers for one lap; lap 0 is always reference pace
    fn paces(&self, lap: usize) -> Vec<f64> {
        if lap == 0 {
            return vec![1.0; self.track.len()];
        }
        (0..self.track.len())
            .map(|i| {
                let seed = self.config.seed * 97.0 + lap as f64 * 31.0 + i as f64;
                1.0 + jitter(seed, self.config.pace_spread)
            })
            .collect()
    }

    /// One complete lap, timestamps starting at `start`
    pub fn generate_lap(&self, index: usize, start: f64) -> Lap {
        self.lap_with_paces(index, start, &self.paces(index))
    }

    /// One complete lap at a uniform pace multiplier
    pub fn generate_lap_at_pace(&self, index: usize, start: f64, pace: f64) -> Lap {
        self.lap_with_paces(index, start, &vec![pace; self.track.len()])
    }

    fn lap_with_paces(&self, index: usize, start: f64, paces: &[f64]) -> Lap {
        let durations: Vec<f64> = self
            .track
            .iter()
            .zip(paces)
            .map(|(seg, pace)| seg.duration * pace)
            .collect();
        let lap_time: f64 = durations.iter().sum();
        let dt = 1.0 / self.config.sample_rate_hz;

        let mut samples = Vec::with_capacity((lap_time / dt) as usize + 2);
        let mut seg_idx = 0;
        let mut seg_start = 0.0;
        let mut k = 0usize;
        loop {
            let t = (k as f64 * dt).min(lap_time);
            while seg_idx + 1 < self.track.len() && t >= seg_start + durations[seg_idx] {
                seg_start += durations[seg_idx];
                seg_idx += 1;
            }
            let seg = &self.track[seg_idx];
            let u = ((t - seg_start) / durations[seg_idx]).clamp(0.0, 1.0);
            let entry = entry_speed(&self.track, seg_idx);
            let distance = if t >= lap_time {
                self.lap_length
            } else {
                (self.offsets[seg_idx] + seg.distance_at(entry, u)).min(self.lap_length)
            };
            let state = compute_state(seg, entry, u, paces[seg_idx]);

            let seed = self.config.seed + index as f64 * 1000.0 + k as f64;
            let angle = TAU * distance / self.lap_length;
            let radius = self.lap_length / TAU;
            samples.push(TelemetrySample {
                timestamp: Seconds(start + t),
                distance: Meters(distance),
                position: Position::new(radius * angle.cos(), radius * angle.sin()),
                speed: MetersPerSecond((state.speed + jitter(seed, 0.3)).max(0.0)),
                throttle: Percentage::new(state.throttle + jitter(seed * 1.2, 0.02)),
                brake: Percentage::new(state.brake + jitter(seed * 1.3, 0.02)),
                longitudinal_g: GForce(state.longitudinal_g + jitter(seed * 1.6, 0.03)),
                lateral_g: GForce(state.lateral_g + jitter(seed * 1.5, 0.05)),
                rpm: Some(Rpm((state.rpm + jitter(seed * 1.1, 30.0)).clamp(1200.0, 8000.0))),
                steering: Some(state.steering + jitter(seed * 1.4, 0.005)),
                gear: Some(state.gear),
            });

            if t >= lap_time {
                break;
            }
            k += 1;
        }

        Lap::new(index, samples, true)
    }

    fn queue_next_lap(&mut self) {
        let lap = self.generate_lap(self.lap, self.session_time);
        debug!(
            "Demo lap {} queued: {:.3}s, {} samples",
            self.lap,
            lap.lap_time().0,
            lap.samples.len()
        );
        self.session_time += lap.lap_time().0 + 1.0 / self.config.sample_rate_hz;
        self.pending
            .extend(lap.samples.into_iter().map(SourceEvent::Sample));
        self.pending.push_back(SourceEvent::EndOfLap);
        self.lap += 1;
    }
}

/// Speed at the start of segment `i`: the previous segment's target
fn entry_speed(track: &[TrackSegment], i: usize) -> f64 {
    let prev = if i > 0 { i - 1 } else { track.len() - 1 };
    track[prev].target_speed
}

impl TelemetrySource for DemoSource {
    fn name(&self) -> &str {
        "Demo"
    }

    fn start(&mut self) -> Result<()> {
        self.active = true;
        self.lap = 0;
        self.session_time = 0.0;
        self.pending.clear();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.active = false;
        self.pending.clear();
        Ok(())
    }

    fn next_event(&mut self) -> Result<Option<SourceEvent>> {
        if !self.active {
            return Ok(None);
        }
        if self.pending.is_empty() {
            if self.config.laps.is_some_and(|limit| self.lap >= limit) {
                self.active = false;
                return Ok(None);
            }
            self.queue_next_lap();
        }
        Ok(self.pending.pop_front())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
