//! Projected lap time
//!
//! Each sample produces a raw projection: elapsed time plus the ghost's
//! remaining time scaled by the pace ratio of the most recently closed
//! sector. The published value follows the raw projection through
//! exponential smoothing, and never moves by more than `max_step_s`
//! between two updates.

use crate::config::PredictorConfig;
use crate::delta::DeltaRecord;
use crate::units::{Meters, Seconds};

/// Inputs for one projection
#[derive(Debug, Clone, Copy)]
pub struct PaceInput<'a> {
    pub elapsed: Seconds,
    pub distance: Meters,
    pub lap_distance: Meters,
    pub ghost_lap_time: Seconds,
    /// Ghost elapsed time at the same distance, `None` when unaligned
    pub ghost_elapsed: Option<Seconds>,
    pub last_closed: Option<&'a DeltaRecord>,
}

#[derive(Debug, Clone)]
pub struct PredictiveTimer {
    config: PredictorConfig,
    projected: Option<f64>,
}

impl PredictiveTimer {
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            projected: None,
        }
    }

    pub fn projected(&self) -> Option<Seconds> {
        self.projected.map(Seconds)
    }

    /// Unsmoothed projection for this sample
    pub fn raw_projection(&self, input: &PaceInput<'_>) -> Option<f64> {
        match input.ghost_elapsed {
            Some(ghost_elapsed) => {
                let remaining = (input.ghost_lap_time.0 - ghost_elapsed.0).max(0.0);
                let (low, high) = self.config.pace_ratio_bounds;
                let ratio = input
                    .last_closed
                    .filter(|r| r.ghost_elapsed.0 > 0.0)
                    .map(|r| r.live_elapsed.0 / r.ghost_elapsed.0)
                    .unwrap_or(1.0)
                    .clamp(low, high);
                Some(input.elapsed.0 + remaining * ratio)
            }
            None => {
                // no ghost reference here: plain linear extrapolation
                let fraction = input.distance.0 / input.lap_distance.0;
                (fraction > 0.01 && fraction.is_finite()).then(|| input.elapsed.0 / fraction.min(1.0))
            }
        }
    }

    pub fn update(&mut self, input: &PaceInput<'_>) -> Option<Seconds> {
        let Some(raw) = self.raw_projection(input) else {
            return self.projected();
        };

        let next = match self.projected {
            None => raw,
            Some(previous) => {
                let smoothed = previous + self.config.alpha * (raw - previous);
                let step = self.config.max_step_s;
                previous + (smoothed - previous).clamp(-step, step)
            }
        };
        self.projected = Some(next);
        self.projected()
    }

    pub fn reset(&mut self) {
        self.projected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::Confidence;

    fn input(elapsed: f64, ghost_elapsed: f64) -> PaceInput<'static> {
        PaceInput {
            elapsed: Seconds(elapsed),
            distance: Meters(ghost_elapsed * 50.0),
            lap_distance: Meters(3000.0),
            ghost_lap_time: Seconds(60.0),
            ghost_elapsed: Some(Seconds(ghost_elapsed)),
            last_closed: None,
        }
    }

    #[test]
    fn test_matching_pace_projects_ghost_time() {
        let mut timer = PredictiveTimer::new(PredictorConfig::default());
        for i in 1..=100 {
            let t = i as f64 * 0.1;
            let projected = timer.update(&input(t, t)).unwrap();
            assert!((projected.0 - 60.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sector_pace_ratio_scales_remaining_time() {
        let timer = PredictiveTimer::new(PredictorConfig::default());
        let record = DeltaRecord {
            sector_index: 0,
            live_elapsed: Seconds(22.0),
            ghost_elapsed: Seconds(20.0),
            delta: Seconds(2.0),
            cumulative_delta: Seconds(2.0),
            confidence: Confidence::Aligned,
        };
        let mut inp = input(22.0, 20.0);
        inp.last_closed = Some(&record);
        // 22 + 40 * 1.1
        assert!((timer.raw_projection(&inp).unwrap() - 66.0).abs() < 1e-9);
    }

    #[test]
    fn test_outlier_is_bounded_at_10hz() {
        let config = PredictorConfig {
            max_step_s: 0.3,
            ..PredictorConfig::default()
        };
        let mut timer = PredictiveTimer::new(config);
        let mut previous: Option<f64> = None;

        for i in 1..=600 {
            let t = i as f64 * 0.1;
            // one sample reports a wildly late timestamp
            let elapsed = if i == 250 { t + 8.0 } else { t };
            let projected = timer.update(&input(elapsed, t)).unwrap().0;
            if let Some(p) = previous {
                assert!((projected - p).abs() <= 0.3 + 1e-9, "jump at sample {}", i);
            }
            previous = Some(projected);
        }
    }

    #[test]
    fn test_unaligned_falls_back_to_linear_projection() {
        let timer = PredictiveTimer::new(PredictorConfig::default());
        let mut inp = input(30.0, 0.0);
        inp.distance = Meters(1500.0);
        inp.ghost_elapsed = None;
        assert!((timer.raw_projection(&inp).unwrap() - 60.0).abs() < 1e-9);

        inp.distance = Meters(0.0);
        assert!(timer.raw_projection(&inp).is_none());
    }

    #[test]
    fn test_reset_clears_projection() {
        let mut timer = PredictiveTimer::new(PredictorConfig::default());
        timer.update(&input(1.0, 1.0));
        assert!(timer.projected().is_some());
        timer.reset();
        assert!(timer.projected().is_none());
    }
}
