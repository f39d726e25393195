//! Coaching configuration
//!
//! Every threshold the pipeline uses lives here rather than in code. All
//! fields have defaults, so a partial JSON file only overrides what it
//! names.

use crate::error::Result;
use crate::insight::RuleKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    pub laps: LapConfig,
    pub insights: InsightConfig,
    pub predictor: PredictorConfig,
    pub track: TrackConfig,
    pub server: ServerConfig,
}

/// How a reference lap is chosen from a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceStrategy {
    /// Minimum lap time among valid laps
    #[default]
    Fastest,
    /// Lap closest to the median valid lap time
    Median,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LapConfig {
    /// Distance drop between consecutive samples that marks a line crossing
    pub reset_threshold_m: f64,
    /// Laps at or below this duration are invalid
    pub min_lap_time_s: f64,
    pub reference: ReferenceStrategy,
}

impl Default for LapConfig {
    fn default() -> Self {
        Self {
            reset_threshold_m: -3000.0,
            min_lap_time_s: 60.0,
            reference: ReferenceStrategy::Fastest,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Brake input above which a driver counts as braking
    pub brake_on: f64,
    /// Throttle input above which a driver counts as flat out
    pub full_throttle: f64,
    /// Speed gap to the ghost worth reporting (m/s)
    pub speed_deficit_mps: f64,
    /// Time lost/gained within a sector worth reporting
    pub sector_delta_s: f64,
    /// Growth of the delta since sector entry worth reporting
    pub delta_growth_s: f64,
    /// Consecutive delta samples making up a trend
    pub trend_window: usize,
    /// Rules in priority order; the first one that fires wins
    pub rules: Vec<RuleKind>,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            brake_on: 0.05,
            full_throttle: 0.9,
            speed_deficit_mps: 5.0 / 3.6,
            sector_delta_s: 0.1,
            delta_growth_s: 0.25,
            trend_window: 10,
            rules: RuleKind::default_order(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Exponential smoothing factor applied to each raw projection
    pub alpha: f64,
    /// Largest change of the projected lap time between two updates
    pub max_step_s: f64,
    /// Bounds on the live/ghost pace ratio used for extrapolation
    pub pace_ratio_bounds: (f64, f64),
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            max_step_s: 0.5,
            pace_ratio_bounds: (0.5, 2.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub name: String,
    /// Sector end distances; the last one is the lap length
    pub boundaries_m: Vec<f64>,
    /// Lap length relative to the circuit the forecaster was trained on
    pub length_scale: f64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            name: "Barber Motorsports Park".to_string(),
            boundaries_m: vec![1216.0, 1608.0, 1943.0, 3699.0],
            length_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Start a synthetic session named "demo" on startup
    pub demo: bool,
    /// Where cached ghost laps are stored (platform data dir when unset)
    pub ghost_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9100".to_string(),
            demo: false,
            ghost_dir: None,
        }
    }
}

impl CoachConfig {
    /// Load from a JSON file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: CoachConfig =
            serde_json::from_str(r#"{"predictor":{"max_step_s":0.25}}"#).unwrap();
        assert_eq!(config.predictor.max_step_s, 0.25);
        assert_eq!(config.predictor.alpha, 0.2);
        assert_eq!(config.laps.min_lap_time_s, 60.0);
        assert_eq!(config.track.boundaries_m.len(), 4);
    }

    #[test]
    fn test_default_track_is_barber() {
        let track = crate::track::TrackGeometry::from_config(&TrackConfig::default()).unwrap();
        assert_eq!(track.sector_count(), 4);
        assert_eq!(track.total_distance().0, 3699.0);
        assert_eq!(track.sector_of(crate::units::Meters(1500.0)).unwrap(), 1);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoachConfig::load(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config.laps.reset_threshold_m, -3000.0);
        assert_eq!(config.laps.reference, ReferenceStrategy::Fastest);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = CoachConfig::default();
        config.insights.trend_window = 4;
        config.laps.reference = ReferenceStrategy::Median;
        config.save(&path).unwrap();

        let loaded = CoachConfig::load(&path).unwrap();
        assert_eq!(loaded.insights.trend_window, 4);
        assert_eq!(loaded.laps.reference, ReferenceStrategy::Median);
        assert_eq!(loaded.insights.rules, RuleKind::default_order());
    }

    #[test]
    fn test_reference_strategy_serialization() {
        let json = serde_json::to_string(&ReferenceStrategy::Median).unwrap();
        assert_eq!(json, "\"median\"");
    }
}
