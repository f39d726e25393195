//! Lap time forecasting
//!
//! Aggregate features are extracted from a lap and handed to a forecasting
//! model. The model itself is an external collaborator behind
//! [`LapTimeForecaster`]; [`LinearForecaster`] is the in-tree implementation.

use crate::model::Lap;
use crate::units::Seconds;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Throttle above this counts as full throttle
const FULL_THROTTLE: f64 = 0.95;
/// Brake above this counts as braking
const BRAKING: f64 = 0.05;

/// Aggregate statistics describing how a lap was driven
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LapFeatures {
    /// m/s
    pub avg_speed: f64,
    pub max_speed: f64,
    pub avg_rpm: f64,
    pub max_rpm: f64,
    /// 0.0 to 1.0
    pub avg_throttle: f64,
    /// Share of samples at full throttle, 0 to 100
    pub percent_full_throttle: f64,
    /// Share of samples on the brakes, 0 to 100
    pub percent_braking: f64,
    /// Mean absolute steering angle (radians)
    pub avg_steering_angle: f64,
}

impl LapFeatures {
    /// Column order of [`to_vector`](Self::to_vector)
    pub const NAMES: [&'static str; 8] = [
        "avg_speed",
        "max_speed",
        "avg_rpm",
        "max_rpm",
        "avg_throttle",
        "percent_full_throttle",
        "percent_braking",
        "avg_steering_angle",
    ];

    /// Missing channels (rpm, steering) contribute zero
    pub fn from_lap(lap: &Lap) -> Self {
        let samples = &lap.samples;
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;

        let mean = |f: &dyn Fn(usize) -> Option<f64>| {
            let values: Vec<f64> = (0..samples.len()).filter_map(f).collect();
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        let max = |f: &dyn Fn(usize) -> Option<f64>| {
            (0..samples.len())
                .filter_map(f)
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
                .unwrap_or(0.0)
        };

        Self {
            avg_speed: mean(&|i| Some(samples[i].speed.0)),
            max_speed: max(&|i| Some(samples[i].speed.0)),
            avg_rpm: mean(&|i| samples[i].rpm.map(|r| r.0)),
            max_rpm: max(&|i| samples[i].rpm.map(|r| r.0)),
            avg_throttle: mean(&|i| Some(samples[i].throttle.0)),
            percent_full_throttle: samples
                .iter()
                .filter(|s| s.throttle.0 > FULL_THROTTLE)
                .count() as f64
                / n
                * 100.0,
            percent_braking: samples.iter().filter(|s| s.brake.0 > BRAKING).count() as f64 / n
                * 100.0,
            avg_steering_angle: mean(&|i| samples[i].steering.map(f64::abs)),
        }
    }

    pub fn to_vector(&self) -> [f64; 8] {
        [
            self.avg_speed,
            self.max_speed,
            self.avg_rpm,
            self.max_rpm,
            self.avg_throttle,
            self.percent_full_throttle,
            self.percent_braking,
            self.avg_steering_angle,
        ]
    }
}

/// Forecasting model consumed as a black box
pub trait LapTimeForecaster: Send + Sync {
    fn name(&self) -> &str;

    /// Predicted lap time for a lap driven like `features`
    fn forecast(&self, features: &LapFeatures) -> Result<Seconds>;
}

/// `intercept + Σ weight·feature`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearForecaster {
    pub intercept: f64,
    pub weights: [f64; 8],
}

impl LinearForecaster {
    pub fn new(intercept: f64, weights: [f64; 8]) -> Self {
        Self { intercept, weights }
    }
}

impl Default for LinearForecaster {
    /// Lap time inversely tracking average speed on a ~3.7 km circuit
    fn default() -> Self {
        Self {
            intercept: 180.0,
            weights: [-2.0, 0.0, 0.0, 0.0, 0.0, -0.1, 0.05, 0.0],
        }
    }
}

impl LapTimeForecaster for LinearForecaster {
    fn name(&self) -> &str {
        "linear"
    }

    fn forecast(&self, features: &LapFeatures) -> Result<Seconds> {
        let value = features
            .to_vector()
            .iter()
            .zip(self.weights.iter())
            .fold(self.intercept, |acc, (x, w)| acc + x * w);
        if !value.is_finite() || value <= 0.0 {
            bail!("forecast produced a non-positive lap time ({})", value);
        }
        Ok(Seconds(value))
    }
}

/// Circuit the forecast is being projected onto
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackProfile {
    pub name: String,
    /// Lap length relative to the circuit the model was trained on
    pub length_scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub model: String,
    pub track: String,
    pub baseline: Seconds,
    pub adjusted: Seconds,
}

/// Forecast on the training circuit, then scale to `track`
pub fn forecast_for_track(
    forecaster: &dyn LapTimeForecaster,
    features: &LapFeatures,
    track: &TrackProfile,
) -> Result<Forecast> {
    if !(track.length_scale > 0.0) {
        bail!("length scale must be positive, got {}", track.length_scale);
    }
    let baseline = forecaster.forecast(features)?;
    Ok(Forecast {
        model: forecaster.name().to_string(),
        track: track.name.clone(),
        baseline,
        adjusted: Seconds(baseline.0 * track.length_scale),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TelemetrySample;
    use crate::units::Rpm;

    fn lap() -> Lap {
        let mut samples = vec![
            TelemetrySample::at(0.0, 0.0, 40.0).with_inputs(1.0, 0.0),
            TelemetrySample::at(1.0, 40.0, 60.0).with_inputs(0.5, 0.0),
            TelemetrySample::at(2.0, 100.0, 30.0).with_inputs(0.0, 0.9),
            TelemetrySample::at(3.0, 130.0, 50.0).with_inputs(0.96, 0.0),
        ];
        for (i, s) in samples.iter_mut().enumerate() {
            s.rpm = Some(Rpm(5000.0 + 1000.0 * i as f64));
            s.steering = Some(if i % 2 == 0 { 0.2 } else { -0.4 });
        }
        Lap::new(0, samples, true)
    }

    #[test]
    fn test_features_from_lap() {
        let f = LapFeatures::from_lap(&lap());
        assert!((f.avg_speed - 45.0).abs() < 1e-9);
        assert_eq!(f.max_speed, 60.0);
        assert!((f.avg_rpm - 6500.0).abs() < 1e-9);
        assert_eq!(f.max_rpm, 8000.0);
        assert!((f.avg_throttle - 0.615).abs() < 1e-9);
        assert!((f.percent_full_throttle - 50.0).abs() < 1e-9);
        assert!((f.percent_braking - 25.0).abs() < 1e-9);
        assert!((f.avg_steering_angle - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_missing_channels_are_zero() {
        let lap = Lap::new(0, vec![TelemetrySample::at(0.0, 0.0, 10.0)], true);
        let f = LapFeatures::from_lap(&lap);
        assert_eq!(f.avg_rpm, 0.0);
        assert_eq!(f.max_rpm, 0.0);
        assert_eq!(f.avg_steering_angle, 0.0);
        assert_eq!(LapFeatures::from_lap(&Lap::new(0, vec![], false)), LapFeatures::default());
    }

    #[test]
    fn test_track_scaling() {
        let model = LinearForecaster::new(90.0, [0.0; 8]);
        let profile = TrackProfile {
            name: "Sebring".to_string(),
            length_scale: 1.4,
        };
        let forecast = forecast_for_track(&model, &LapFeatures::default(), &profile).unwrap();
        assert_eq!(forecast.baseline, Seconds(90.0));
        assert!((forecast.adjusted.0 - 126.0).abs() < 1e-9);
        assert_eq!(forecast.model, "linear");
    }

    #[test]
    fn test_rejects_nonsense() {
        let model = LinearForecaster::new(-1.0, [0.0; 8]);
        assert!(model.forecast(&LapFeatures::default()).is_err());

        let profile = TrackProfile {
            name: "Nowhere".to_string(),
            length_scale: 0.0,
        };
        assert!(forecast_for_track(&LinearForecaster::default(), &LapFeatures::default(), &profile).is_err());
    }
}
