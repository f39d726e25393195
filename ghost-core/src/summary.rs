//! Post-session lap statistics

use crate::error::{CoachError, Result};
use crate::model::Lap;
use crate::units::Seconds;
use serde::{Deserialize, Serialize};

/// One lap picked out of the session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LapTime {
    pub lap: usize,
    pub time: Seconds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub valid_laps: usize,
    pub fastest: LapTime,
    pub slowest: LapTime,
    pub mean: Seconds,
    /// Sample standard deviation of the valid lap times; zero for a single lap
    pub std_dev: Seconds,
}

impl SessionSummary {
    /// Statistics over the valid laps only
    pub fn from_laps(laps: &[Lap]) -> Result<Self> {
        let times: Vec<LapTime> = laps
            .iter()
            .filter(|lap| lap.valid && !lap.is_empty())
            .map(|lap| LapTime {
                lap: lap.index,
                time: lap.lap_time(),
            })
            .collect();

        let first = *times.first().ok_or(CoachError::NoValidLap)?;
        let (fastest, slowest) = times.iter().fold((first, first), |(fast, slow), t| {
            (
                if t.time.0 < fast.time.0 { *t } else { fast },
                if t.time.0 > slow.time.0 { *t } else { slow },
            )
        });

        let n = times.len() as f64;
        let mean = times.iter().map(|t| t.time.0).sum::<f64>() / n;
        let std_dev = if times.len() > 1 {
            let variance = times
                .iter()
                .map(|t| (t.time.0 - mean).powi(2))
                .sum::<f64>()
                / (n - 1.0);
            variance.sqrt()
        } else {
            0.0
        };

        Ok(Self {
            valid_laps: times.len(),
            fastest,
            slowest,
            mean: Seconds(mean),
            std_dev: Seconds(std_dev),
        })
    }
}
