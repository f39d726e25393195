//! Application state management

use crate::store::GhostStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use ghost_core::{CoachConfig, CoachSession, LapTimeForecaster, LinearForecaster, SessionOutput, TrackGeometry};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Capacity of each session's update channel
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// One live coaching session and the plumbing around it
#[derive(Clone)]
pub struct SessionHandle {
    pub session: Arc<Mutex<CoachSession>>,

    /// Broadcast channel for session outputs
    /// Multiple SSE consumers can subscribe
    pub updates_tx: broadcast::Sender<SessionOutput>,

    /// Cancels the session's stream and any feeder task
    pub cancel: CancellationToken,

    pub created_at: DateTime<Utc>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SessionOutput> {
        self.updates_tx.subscribe()
    }

    /// Publish to subscribers; no subscribers is fine
    pub fn publish(&self, output: SessionOutput) {
        let _ = self.updates_tx.send(output);
    }

    pub async fn info(&self) -> SessionInfo {
        let session = self.session.lock().await;
        SessionInfo {
            id: session.id().to_string(),
            track: session.track().name().to_string(),
            ghost_lap: session.ghost().source_lap(),
            ghost_lap_time: session.ghost().lap_time().0,
            lap: session.lap(),
            completed_laps: session.history().len(),
            dropped_samples: session.dropped(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub track: String,
    pub ghost_lap: usize,
    pub ghost_lap_time: f64,
    pub lap: usize,
    pub completed_laps: usize,
    pub dropped_samples: usize,
    pub created_at: DateTime<Utc>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CoachConfig>,

    /// Geometry shared read-only by every session created over the API
    pub track: Arc<TrackGeometry>,

    /// Live sessions by id; each is independent of the others
    pub sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,

    pub ghosts: Arc<GhostStore>,

    pub forecaster: Arc<dyn LapTimeForecaster>,

    /// Parent of every session token; cancelled on shutdown
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: CoachConfig) -> Result<Self> {
        let dir = config
            .server
            .ghost_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(GhostStore::default_dir);
        let store = GhostStore::open(dir)?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: CoachConfig, store: GhostStore) -> Result<Self> {
        let track = TrackGeometry::from_config(&config.track)?;
        info!(
            "Track {}: {:.0} m, {} sectors",
            track.name(),
            track.total_distance().0,
            track.sector_count()
        );
        Ok(Self {
            config: Arc::new(config),
            track: Arc::new(track),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ghosts: Arc::new(store),
            forecaster: Arc::new(LinearForecaster::default()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Register a session; `None` if the id is already taken
    pub async fn insert_session(&self, session: CoachSession) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let id = session.id().to_string();
        if sessions.contains_key(&id) {
            return None;
        }

        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let handle = SessionHandle {
            session: Arc::new(Mutex::new(session)),
            updates_tx,
            cancel: self.shutdown.child_token(),
            created_at: Utc::now(),
        };
        sessions.insert(id.clone(), handle.clone());
        info!("Session {} created ({} active)", id, sessions.len());
        Some(handle)
    }

    pub async fn session(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session and cancel its stream and feeder
    pub async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(handle) => {
                handle.cancel.cancel();
                info!("Session {} removed", id);
                true
            }
            None => false,
        }
    }
}
