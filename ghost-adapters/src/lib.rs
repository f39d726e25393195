//! Telemetry sources for Ghost Coach

pub mod demo;
pub mod replay;

pub use demo::{DemoConfig, DemoSource};
pub use replay::ReplaySource;
