//! Type-safe wrappers for physical units
//!
//! Newtype wrappers around f64 so distances, times and speeds cannot be
//! mixed up when they flow through the alignment pipeline.
//!
//! All unit types serialize with 4 decimal places to keep cached ghost
//! laps and streamed updates compact.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Round f64 to 4 decimal places for compact JSON serialization
fn round4<S: serde::Serializer>(val: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((*val * 10000.0).round() / 10000.0)
}

/// Meters (cumulative lap distance, local coordinates)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Meters(#[serde(serialize_with = "round4")] pub f64);

/// Seconds (timestamps, elapsed times, deltas)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Seconds(#[serde(serialize_with = "round4")] pub f64);

/// Meters per second
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct MetersPerSecond(#[serde(serialize_with = "round4")] pub f64);

impl MetersPerSecond {
    pub fn from_kph(kph: f64) -> Self {
        Self(kph / 3.6)
    }

    pub fn as_kph(&self) -> f64 {
        self.0 * 3.6
    }
}

/// Revolutions per minute
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Rpm(#[serde(serialize_with = "round4")] pub f64);

/// G-force (multiples of gravitational acceleration)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct GForce(#[serde(serialize_with = "round4")] pub f64);

/// Percentage (0.0 to 1.0), clamped on deserialization too
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64")]
pub struct Percentage(#[serde(serialize_with = "round4")] pub f64);

impl From<f64> for Percentage {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl Percentage {
    /// Create a new percentage, clamping to [0.0, 1.0]
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    /// Get as percentage (0-100)
    pub fn as_percent(&self) -> f64 {
        self.0 * 100.0
    }
}

macro_rules! impl_linear {
    ($($ty:ident),*) => {
        $(
            impl Add for $ty {
                type Output = $ty;
                fn add(self, rhs: $ty) -> $ty {
                    $ty(self.0 + rhs.0)
                }
            }

            impl Sub for $ty {
                type Output = $ty;
                fn sub(self, rhs: $ty) -> $ty {
                    $ty(self.0 - rhs.0)
                }
            }
        )*
    };
}

impl_linear!(Meters, Seconds, MetersPerSecond);

/// Linear interpolation between two values at fraction `t`
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
