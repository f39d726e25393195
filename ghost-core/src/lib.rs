//! Ghost Coach Core Library
//!
//! Compares a live lap against a stored reference lap (the "ghost") one
//! sample at a time: distance alignment, per-sector deltas, rule-based
//! driving insights and a projected lap time.

pub mod align;
pub mod config;
pub mod delta;
pub mod error;
pub mod forecast;
pub mod ghost;
pub mod insight;
pub mod lap;
pub mod model;
pub mod predictor;
pub mod session;
pub mod source;
pub mod summary;
pub mod track;
pub mod units;

pub use align::{align, Alignment, AlignmentCursor, Confidence};
pub use config::{CoachConfig, ReferenceStrategy};
pub use delta::DeltaRecord;
pub use error::{CoachError, Result};
pub use forecast::{forecast_for_track, LapFeatures, LapTimeForecaster, LinearForecaster, TrackProfile};
pub use ghost::{select_reference, GhostLap, GhostPoint};
pub use insight::{Insight, InsightEngine, RuleKind};
pub use lap::{segment_laps, LapSegmenter};
pub use model::{Lap, Position, SourceEvent, TelemetrySample};
pub use predictor::PredictiveTimer;
pub use session::{CoachSession, CoachUpdate, LapReport, SessionOutput};
pub use source::TelemetrySource;
pub use summary::SessionSummary;
pub use track::{Centerline, Location, SectorLocator, TrackGeometry, TrackPosition};
