//! Coaching insights
//!
//! Rules form a fixed, ordered table. Each update walks the table and
//! surfaces only the first rule that fires. Instantaneous input contrasts
//! (brake, throttle, speed) come before sector-level statistics.

use crate::align::Confidence;
use crate::config::InsightConfig;
use crate::delta::DeltaRecord;
use crate::ghost::GhostPoint;
use crate::model::TelemetrySample;
use crate::units::Seconds;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Condition a rule checks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Driver on the brakes where the ghost is not
    UnneededBraking,
    /// Ghost on the brakes where the driver is not
    MissedBraking,
    /// Ghost flat out, driver not
    ThrottleDeficit,
    /// Driver noticeably slower than the ghost at this point
    SpeedDeficit,
    /// Delta has grown since entering the current sector
    DeltaGrowth,
    /// Delta moving in one direction over the recent window
    Trend,
    /// Result of the last closed sector
    SectorResult,
    /// Nothing to correct in the current sector
    OnPace,
}

impl RuleKind {
    pub fn default_order() -> Vec<RuleKind> {
        vec![
            RuleKind::UnneededBraking,
            RuleKind::MissedBraking,
            RuleKind::ThrottleDeficit,
            RuleKind::SpeedDeficit,
            RuleKind::DeltaGrowth,
            RuleKind::Trend,
            RuleKind::SectorResult,
            RuleKind::OnPace,
        ]
    }

    /// Rules that compare times, or speeds at a matched position, need a
    /// trustworthy alignment
    pub fn requires_alignment(&self) -> bool {
        matches!(
            self,
            RuleKind::SpeedDeficit | RuleKind::DeltaGrowth | RuleKind::Trend | RuleKind::OnPace
        )
    }

    fn evaluate(&self, input: &InsightInput<'_>, window: &VecDeque<f64>, cfg: &InsightConfig) -> Option<String> {
        let live = input.live;
        let ghost = input.ghost;
        let live_braking = live.brake.0 > cfg.brake_on;
        let ghost_braking = ghost.brake.0 > cfg.brake_on;

        match self {
            RuleKind::UnneededBraking => (live_braking && !ghost_braking)
                .then(|| "You are braking, but the ghost is not.".to_string()),
            RuleKind::MissedBraking => (!live_braking && ghost_braking)
                .then(|| "Ghost is braking, but you are not.".to_string()),
            RuleKind::ThrottleDeficit => (live.throttle.0 < cfg.full_throttle
                && ghost.throttle.0 > cfg.full_throttle)
                .then(|| "Ghost is full throttle, but you are not.".to_string()),
            RuleKind::SpeedDeficit => {
                let gap = ghost.speed.0 - live.speed.0;
                (gap > cfg.speed_deficit_mps)
                    .then(|| format!("Speed is {:.0} km/h slower.", gap * 3.6))
            }
            RuleKind::DeltaGrowth => {
                let growth = input.sector_delta?.0;
                (growth > cfg.delta_growth_s).then(|| {
                    format!(
                        "Lost {:.2}s since entering sector {}.",
                        growth,
                        input.sector + 1
                    )
                })
            }
            RuleKind::Trend => {
                if cfg.trend_window < 2 || window.len() < cfg.trend_window {
                    return None;
                }
                let pairs = || window.iter().zip(window.iter().skip(1));
                if pairs().all(|(a, b)| b > a) {
                    Some("Losing time consistently to the ghost.".to_string())
                } else if pairs().all(|(a, b)| b < a) {
                    Some("Gaining time consistently on the ghost.".to_string())
                } else {
                    None
                }
            }
            RuleKind::SectorResult => {
                let record = input.last_closed?;
                let sector = record.sector_index + 1;
                if record.delta.0 > cfg.sector_delta_s {
                    Some(format!("Lost {:.2}s in sector {}.", record.delta.0, sector))
                } else if record.delta.0 < -cfg.sector_delta_s {
                    Some(format!("Gained {:.2}s in sector {}!", -record.delta.0, sector))
                } else {
                    None
                }
            }
            RuleKind::OnPace => {
                let so_far = input.sector_delta?.0;
                (so_far.abs() <= cfg.sector_delta_s).then(|| {
                    format!("Pace is matching the ghost in sector {}.", input.sector + 1)
                })
            }
        }
    }
}

/// A coaching statement for the current sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Rank of the rule that produced it; 0 is the most urgent
    pub priority: usize,
    pub message: String,
    pub trigger: RuleKind,
    pub confidence: Confidence,
}

/// Everything the rules look at for one live sample
#[derive(Debug)]
pub struct InsightInput<'a> {
    pub live: &'a TelemetrySample,
    /// Ghost at the same track position (nearest endpoint when unaligned)
    pub ghost: &'a GhostPoint,
    pub sector: usize,
    /// Instantaneous delta; `None` when the sample is unaligned
    pub delta: Option<Seconds>,
    /// Delta change since entering the current sector
    pub sector_delta: Option<Seconds>,
    pub last_closed: Option<&'a DeltaRecord>,
    pub confidence: Confidence,
}

/// Evaluates the rule table once per sample
#[derive(Debug)]
pub struct InsightEngine {
    config: InsightConfig,
    window: VecDeque<f64>,
}

impl InsightEngine {
    pub fn new(config: InsightConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.trend_window),
            config,
        }
    }

    pub fn rules(&self) -> &[RuleKind] {
        &self.config.rules
    }

    pub fn update(&mut self, input: &InsightInput<'_>) -> Option<Insight> {
        if let Some(delta) = input.delta {
            self.window.push_back(delta.0);
            while self.window.len() > self.config.trend_window {
                self.window.pop_front();
            }
        }

        let aligned = input.confidence.is_aligned();
        self.config
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| aligned || !rule.requires_alignment())
            .find_map(|(priority, rule)| {
                rule.evaluate(input, &self.window, &self.config)
                    .map(|message| Insight {
                        priority,
                        message,
                        trigger: *rule,
                        confidence: input.confidence,
                    })
            })
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ghost::GhostLap;
    use crate::model::Lap;
    use crate::units::{Meters, MetersPerSecond};

    fn ghost_point(throttle: f64, brake: f64, speed: f64) -> GhostPoint {
        let samples = vec![
            TelemetrySample::at(0.0, 0.0, speed).with_inputs(throttle, brake),
            TelemetrySample::at(1.0, 10.0, speed).with_inputs(throttle, brake),
        ];
        GhostLap::from_lap(&Lap::new(0, samples, true))
            .unwrap()
            .point_clamped(Meters(5.0))
    }

    fn input<'a>(live: &'a TelemetrySample, ghost: &'a GhostPoint) -> InsightInput<'a> {
        InsightInput {
            live,
            ghost,
            sector: 1,
            delta: Some(Seconds(0.0)),
            sector_delta: Some(Seconds(0.0)),
            last_closed: None,
            confidence: Confidence::Aligned,
        }
    }

    fn record(delta: f64) -> DeltaRecord {
        DeltaRecord {
            sector_index: 0,
            live_elapsed: Seconds(20.0 + delta),
            ghost_elapsed: Seconds(20.0),
            delta: Seconds(delta),
            cumulative_delta: Seconds(delta),
            confidence: Confidence::Aligned,
        }
    }

    #[test]
    fn test_braking_mismatch_outranks_sector_statistics() {
        let mut engine = InsightEngine::new(InsightConfig::default());
        let live = TelemetrySample::at(5.0, 5.0, 40.0).with_inputs(0.0, 0.8);
        let ghost = ghost_point(1.0, 0.0, 40.0);
        let closed = record(0.5);
        let mut inp = input(&live, &ghost);
        inp.last_closed = Some(&closed);

        let insight = engine.update(&inp).unwrap();
        assert_eq!(insight.trigger, RuleKind::UnneededBraking);
        assert_eq!(insight.priority, 0);
    }

    #[test]
    fn test_missed_braking_and_throttle() {
        let mut engine = InsightEngine::new(InsightConfig::default());
        let live = TelemetrySample::at(5.0, 5.0, 40.0).with_inputs(0.5, 0.0);

        let braking_ghost = ghost_point(0.0, 0.9, 40.0);
        let insight = engine.update(&input(&live, &braking_ghost)).unwrap();
        assert_eq!(insight.trigger, RuleKind::MissedBraking);

        let flat_ghost = ghost_point(1.0, 0.0, 40.0);
        let insight = engine.update(&input(&live, &flat_ghost)).unwrap();
        assert_eq!(insight.trigger, RuleKind::ThrottleDeficit);
        assert_eq!(insight.message, "Ghost is full throttle, but you are not.");
    }

    #[test]
    fn test_speed_deficit_message_in_kph() {
        let mut engine = InsightEngine::new(InsightConfig::default());
        let mut live = TelemetrySample::at(5.0, 5.0, 0.0);
        live.speed = MetersPerSecond::from_kph(150.0);
        let ghost = ghost_point(1.0, 0.0, 50.0);
        let insight = engine.update(&input(&live, &ghost)).unwrap();
        assert_eq!(insight.trigger, RuleKind::SpeedDeficit);
        assert_eq!(insight.message, "Speed is 30 km/h slower.");
    }

    #[test]
    fn test_sector_result_reports_loss_and_gain() {
        let mut engine = InsightEngine::new(InsightConfig::default());
        let live = TelemetrySample::at(5.0, 5.0, 40.0);
        let ghost = ghost_point(1.0, 0.0, 40.0);

        let lost = record(0.35);
        let mut inp = input(&live, &ghost);
        inp.last_closed = Some(&lost);
        let insight = engine.update(&inp).unwrap();
        assert_eq!(insight.trigger, RuleKind::SectorResult);
        assert_eq!(insight.message, "Lost 0.35s in sector 1.");

        let gained = record(-0.2);
        inp.last_closed = Some(&gained);
        assert_eq!(engine.update(&inp).unwrap().message, "Gained 0.20s in sector 1!");
    }

    #[test]
    fn test_on_pace_when_nothing_else_fires() {
        let mut engine = InsightEngine::new(InsightConfig::default());
        let live = TelemetrySample::at(5.0, 5.0, 40.0);
        let ghost = ghost_point(1.0, 0.0, 40.0);
        let insight = engine.update(&input(&live, &ghost)).unwrap();
        assert_eq!(insight.trigger, RuleKind::OnPace);
        assert_eq!(insight.message, "Pace is matching the ghost in sector 2.");
    }

    #[test]
    fn test_trend_needs_full_window() {
        let config = InsightConfig {
            trend_window: 4,
            ..InsightConfig::default()
        };
        let mut engine = InsightEngine::new(config);
        let live = TelemetrySample::at(5.0, 5.0, 40.0);
        let ghost = ghost_point(1.0, 0.0, 40.0);

        let mut last = None;
        for i in 0..4 {
            let mut inp = input(&live, &ghost);
            inp.delta = Some(Seconds(0.01 * i as f64));
            inp.sector_delta = Some(Seconds(0.01 * i as f64));
            last = engine.update(&inp);
            if i < 3 {
                assert_ne!(last.as_ref().unwrap().trigger, RuleKind::Trend);
            }
        }
        assert_eq!(last.unwrap().trigger, RuleKind::Trend);
    }

    #[test]
    fn test_unaligned_sample_still_gets_input_contrast() {
        let mut engine = InsightEngine::new(InsightConfig::default());
        let live = TelemetrySample::at(5.0, 5.0, 10.0).with_inputs(0.0, 0.5);
        let ghost = ghost_point(1.0, 0.0, 60.0);
        let mut inp = input(&live, &ghost);
        inp.delta = None;
        inp.sector_delta = None;
        inp.confidence = Confidence::Unaligned;

        let insight = engine.update(&inp).unwrap();
        assert_eq!(insight.trigger, RuleKind::UnneededBraking);
        assert_eq!(insight.confidence, Confidence::Unaligned);

        let coasting = TelemetrySample::at(5.0, 5.0, 10.0).with_inputs(1.0, 0.0);
        inp.live = &coasting;
        assert!(engine.update(&inp).is_none(), "speed rule needs alignment");
    }

    #[test]
    fn test_custom_rule_order() {
        let config = InsightConfig {
            rules: vec![RuleKind::SectorResult, RuleKind::UnneededBraking],
            ..InsightConfig::default()
        };
        let mut engine = InsightEngine::new(config);
        let live = TelemetrySample::at(5.0, 5.0, 40.0).with_inputs(0.0, 0.8);
        let ghost = ghost_point(1.0, 0.0, 40.0);
        let closed = record(0.5);
        let mut inp = input(&live, &ghost);
        inp.last_closed = Some(&closed);

        let insight = engine.update(&inp).unwrap();
        assert_eq!(insight.trigger, RuleKind::SectorResult);
        assert_eq!(insight.priority, 0);
    }
}
