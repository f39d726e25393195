//! Telemetry source trait definition

use crate::model::SourceEvent;
use anyhow::Result;

/// Anything that produces a stream of samples and end-of-lap markers
///
/// Sources are polled: the session pipeline owns the loop and asks for the
/// next event at its own cadence.
pub trait TelemetrySource: Send {
    /// Get the name of this source (e.g. "demo", "replay")
    fn name(&self) -> &str;

    /// Open files, reset generators
    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Read the next event
    ///
    /// Returns:
    /// - `Ok(Some(event))` if an event is available
    /// - `Ok(None)` once the source is exhausted
    /// - `Err(_)` if reading failed
    fn next_event(&mut self) -> Result<Option<SourceEvent>>;

    fn is_active(&self) -> bool;
}
