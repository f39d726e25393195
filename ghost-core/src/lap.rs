//! Lap segmentation
//!
//! Splits a continuous session stream into laps by watching for the
//! cumulative distance resetting at the start/finish line.

use crate::config::LapConfig;
use crate::model::{Lap, TelemetrySample};
use tracing::debug;

/// Incremental start/finish crossing detector
///
/// Everything before the first crossing is an out-lap and is dropped. Each
/// subsequent crossing closes the lap in progress.
#[derive(Debug)]
pub struct LapSegmenter {
    reset_threshold_m: f64,
    min_lap_time_s: f64,
    previous_distance: Option<f64>,
    current: Vec<TelemetrySample>,
    crossed: bool,
    next_index: usize,
}

impl LapSegmenter {
    pub fn new(config: &LapConfig) -> Self {
        Self {
            reset_threshold_m: config.reset_threshold_m,
            min_lap_time_s: config.min_lap_time_s,
            previous_distance: None,
            current: Vec::new(),
            crossed: false,
            next_index: 0,
        }
    }

    /// Feed one sample; returns a lap when this sample starts a new one
    pub fn push(&mut self, sample: TelemetrySample) -> Option<Lap> {
        let crossing = self
            .previous_distance
            .map(|prev| sample.distance.0 - prev < self.reset_threshold_m)
            .unwrap_or(false);
        self.previous_distance = Some(sample.distance.0);

        if !crossing {
            if self.crossed {
                self.current.push(sample);
            }
            return None;
        }

        let finished = if self.crossed {
            let samples = std::mem::take(&mut self.current);
            Some(self.close(samples))
        } else {
            debug!("First start/finish crossing, discarding out-lap");
            None
        };

        self.crossed = true;
        self.current.push(sample);
        finished
    }

    /// Flush the lap in progress, always marked invalid
    pub fn finish(&mut self) -> Option<Lap> {
        if self.current.is_empty() {
            return None;
        }
        let samples = std::mem::take(&mut self.current);
        let mut lap = self.close(samples);
        lap.valid = false;
        Some(lap)
    }

    fn close(&mut self, samples: Vec<TelemetrySample>) -> Lap {
        let mut lap = Lap::new(self.next_index, samples, false);
        lap.valid = lap.lap_time().0 > self.min_lap_time_s;
        debug!(
            "Lap {} closed: {:.3}s ({} samples, valid: {})",
            lap.index,
            lap.lap_time().0,
            lap.samples.len(),
            lap.valid
        );
        self.next_index += 1;
        lap
    }
}

/// Segment a complete recording, trailing partial lap included
pub fn segment_laps(
    samples: impl IntoIterator<Item = TelemetrySample>,
    config: &LapConfig,
) -> Vec<Lap> {
    let mut segmenter = LapSegmenter::new(config);
    let mut laps: Vec<Lap> = samples
        .into_iter()
        .filter_map(|s| segmenter.push(s))
        .collect();
    laps.extend(segmenter.finish());
    laps
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three and a half laps of a 3700 m circuit at a constant pace
    fn session_stream(lap_times: &[f64]) -> Vec<TelemetrySample> {
        let length = 3700.0;
        let mut samples = Vec::new();
        let mut t = 0.0;

        // out-lap: second half of a lap
        for i in 0..50 {
            samples.push(TelemetrySample::at(t, length / 2.0 + i as f64 * 30.0, 40.0));
            t += 0.5;
        }

        for &lap_time in lap_times {
            let steps = (lap_time / 0.5).round() as usize;
            for i in 0..steps {
                let d = length * i as f64 / steps as f64;
                samples.push(TelemetrySample::at(t, d, length / lap_time));
                t += 0.5;
            }
        }

        // partial in-lap
        for i in 0..10 {
            samples.push(TelemetrySample::at(t, i as f64 * 20.0, 20.0));
            t += 0.5;
        }
        samples
    }

    #[test]
    fn test_segments_laps_between_crossings() {
        let laps = segment_laps(session_stream(&[92.0, 91.5, 45.0]), &LapConfig::default());

        assert_eq!(laps.len(), 4);
        assert_eq!(laps[0].index, 0);
        assert!(laps[0].valid);
        assert!((laps[0].lap_time().0 - 91.5).abs() < 1e-9);
        assert!(laps[1].valid);
        assert!(!laps[2].valid, "45s lap is below the minimum lap time");
        assert!(!laps[3].valid, "trailing partial lap is never valid");
        assert_eq!(laps[3].samples.len(), 10);
    }

    #[test]
    fn test_no_crossing_yields_no_laps() {
        let samples: Vec<_> = (0..100)
            .map(|i| TelemetrySample::at(i as f64, i as f64 * 10.0, 10.0))
            .collect();
        assert!(segment_laps(samples, &LapConfig::default()).is_empty());
    }

    #[test]
    fn test_small_distance_drop_is_not_a_crossing() {
        let mut segmenter = LapSegmenter::new(&LapConfig::default());
        assert!(segmenter.push(TelemetrySample::at(0.0, 3600.0, 40.0)).is_none());
        assert!(segmenter.push(TelemetrySample::at(0.1, 3590.0, 40.0)).is_none());
        assert!(segmenter.finish().is_none());
    }
}
