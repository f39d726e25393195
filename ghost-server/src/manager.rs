//! Source feeder tasks
//!
//! A feeder polls a `TelemetrySource` at a fixed cadence and pushes every
//! event through one session, broadcasting the outputs. It stops when the
//! source is exhausted, fails, or the session's token is cancelled.

use crate::state::{AppState, SessionHandle};
use anyhow::{anyhow, Result};
use ghost_adapters::{DemoConfig, DemoSource};
use ghost_core::{source::TelemetrySource, CoachSession, GhostLap, TrackGeometry};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const DEMO_SESSION: &str = "demo";
const DEMO_SECTORS: usize = 4;

/// Create the "demo" session and start feeding it synthetic laps
pub async fn start_demo(state: &AppState) -> Result<JoinHandle<()>> {
    let config = DemoConfig::default();
    let interval = Duration::from_secs_f64(1.0 / config.sample_rate_hz);
    let source = DemoSource::new(config)?;

    // the demo circuit has its own length, independent of the configured track
    let track = Arc::new(TrackGeometry::even(
        "Demo Circuit",
        source.lap_length(),
        DEMO_SECTORS,
    )?);
    let ghost = GhostLap::from_lap(&source.generate_lap(0, 0.0))?;
    let session = CoachSession::new(DEMO_SESSION, track, ghost, &state.config)?;

    let handle = state
        .insert_session(session)
        .await
        .ok_or_else(|| anyhow!("session {} already exists", DEMO_SESSION))?;

    Ok(tokio::spawn(feed(source, handle, interval)))
}

/// Main feeder loop
pub async fn feed<S: TelemetrySource>(mut source: S, handle: SessionHandle, interval: Duration) {
    if let Err(e) = source.start() {
        error!("Failed to start source {}: {}", source.name(), e);
        return;
    }
    info!("Feeding {} into a session", source.name());

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = handle.cancel.cancelled() => {
                info!("Feeder for {} cancelled", source.name());
                break;
            }
            _ = ticker.tick() => {}
        }

        let event = match source.next_event() {
            Ok(Some(event)) => event,
            Ok(None) => {
                info!("Source {} exhausted", source.name());
                break;
            }
            Err(e) => {
                warn!("Error reading from {}: {}", source.name(), e);
                break;
            }
        };

        let result = handle.session.lock().await.handle(&event);
        match result {
            Ok(output) => handle.publish(output),
            // already logged by the session
            Err(e) if e.is_recoverable() => {}
            Err(e) => {
                error!("Session rejected event from {}: {}", source.name(), e);
                break;
            }
        }
    }

    if let Err(e) = source.stop() {
        error!("Error stopping source {}: {}", source.name(), e);
    }
}
