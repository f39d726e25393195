//! REST API and SSE routes

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, SessionInfo};
use crate::store::{GhostInfo, GhostStore};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures::stream::{Stream, StreamExt as FuturesStreamExt};
use ghost_core::{
    forecast::Forecast, forecast_for_track, CoachSession, CoachUpdate, DeltaRecord, GhostLap, Lap,
    LapFeatures, LapReport, ReferenceStrategy, SessionOutput, SessionSummary, TelemetrySample,
    TrackProfile,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/track", get(get_track))
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/samples", post(push_samples))
        .route("/api/sessions/:id/lap", post(end_lap))
        .route("/api/sessions/:id/deltas", get(get_deltas))
        .route("/api/sessions/:id/stream", get(session_stream))
        .route("/api/ghosts", get(list_ghosts))
        .route("/api/ghosts/:name", put(put_ghost))
        .route("/api/forecast", post(forecast))
        .route("/api/summary", post(summary))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// === Track ===

#[derive(Serialize)]
struct TrackInfo {
    name: String,
    total_distance: f64,
    boundaries_m: Vec<f64>,
    sectors: usize,
}

async fn get_track(State(state): State<AppState>) -> Json<TrackInfo> {
    let track = &state.track;
    Json(TrackInfo {
        name: track.name().to_string(),
        total_distance: track.total_distance().0,
        boundaries_m: track.boundaries().to_vec(),
        sectors: track.sector_count(),
    })
}

// === Session Management ===

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    let handles: Vec<_> = state.sessions.read().await.values().cloned().collect();
    let mut info = Vec::with_capacity(handles.len());
    for handle in handles {
        info.push(handle.info().await);
    }
    info.sort_by(|a, b| a.id.cmp(&b.id));
    Json(info)
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    id: Option<String>,
    /// Build the ghost from these laps
    laps: Option<Vec<Lap>>,
    /// Or use a cached ghost by name
    ghost: Option<String>,
    strategy: Option<ReferenceStrategy>,
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    // Generate ID if not provided
    let id = match request.id {
        Some(id) if !id.is_empty() => id,
        _ => format!("session-{}", chrono::Utc::now().timestamp_millis()),
    };
    if state.session(&id).await.is_some() {
        return Err(ApiError::Conflict(format!("Session {} already exists", id)));
    }

    let ghost = match (request.laps, request.ghost) {
        (Some(laps), None) => {
            let strategy = request.strategy.unwrap_or(state.config.laps.reference);
            GhostLap::build(&laps, strategy)?
        }
        (None, Some(name)) => load_ghost(&state, &name)?,
        _ => {
            return Err(ApiError::BadRequest(
                "Provide exactly one of 'laps' or 'ghost'".to_string(),
            ))
        }
    };

    let session = CoachSession::new(id.clone(), state.track.clone(), ghost, &state.config)?;
    let handle = state
        .insert_session(session)
        .await
        .ok_or_else(|| ApiError::Conflict(format!("Session {} already exists", id)))?;

    Ok((StatusCode::CREATED, Json(handle.info().await)))
}

fn load_ghost(state: &AppState, name: &str) -> ApiResult<GhostLap> {
    if !GhostStore::is_valid_name(name) {
        return Err(ApiError::BadRequest(format!("Invalid ghost name: {:?}", name)));
    }
    state
        .ghosts
        .load(name)?
        .ok_or_else(|| ApiError::NotFound(format!("No ghost named {}", name)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionInfo>> {
    let handle = find_session(&state, &id).await?;
    Ok(Json(handle.info().await))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.remove_session(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn find_session(state: &AppState, id: &str) -> ApiResult<crate::state::SessionHandle> {
    state
        .session(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No session {}", id)))
}

// === Live Samples ===

#[derive(Serialize)]
struct PushResponse {
    accepted: usize,
    /// Samples rejected as out of order or malformed
    dropped: usize,
    updates: Vec<CoachUpdate>,
}

async fn push_samples(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(samples): Json<Vec<TelemetrySample>>,
) -> ApiResult<Json<PushResponse>> {
    let handle = find_session(&state, &id).await?;
    let mut session = handle.session.lock().await;

    let mut response = PushResponse {
        accepted: 0,
        dropped: 0,
        updates: Vec::with_capacity(samples.len()),
    };
    for sample in &samples {
        match session.process(sample) {
            Ok(update) => {
                response.accepted += 1;
                handle.publish(SessionOutput::Update(update.clone()));
                response.updates.push(update);
            }
            Err(e) if e.is_recoverable() => response.dropped += 1,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Json(response))
}

async fn end_lap(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LapReport>> {
    let handle = find_session(&state, &id).await?;
    let report = handle
        .session
        .lock()
        .await
        .end_lap()
        .ok_or_else(|| ApiError::Conflict("No samples received for this lap".to_string()))?;
    handle.publish(SessionOutput::LapComplete(report.clone()));
    Ok(Json(report))
}

#[derive(Serialize)]
struct DeltasResponse {
    lap: usize,
    /// Closed sectors of the lap in progress
    sectors: Vec<DeltaRecord>,
    history: Vec<LapReport>,
}

async fn get_deltas(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeltasResponse>> {
    let handle = find_session(&state, &id).await?;
    let session = handle.session.lock().await;
    Ok(Json(DeltasResponse {
        lap: session.lap(),
        sectors: session.deltas().to_vec(),
        history: session.history().to_vec(),
    }))
}

// === Session Stream Endpoint ===

async fn session_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let handle = find_session(&state, &id).await?;
    let rx = handle.subscribe();

    let stream = BroadcastStream::new(rx)
        .filter_map(|result| async move {
            match result {
                Ok(output) => {
                    let kind = match &output {
                        SessionOutput::Update(_) => "update",
                        SessionOutput::LapComplete(_) => "lap_complete",
                        SessionOutput::Idle => "idle",
                    };
                    match serde_json::to_string(&output) {
                        Ok(json) => Some(Ok(Event::default().event(kind).data(json))),
                        Err(e) => {
                            tracing::error!("Failed to serialize session output: {}", e);
                            None
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Session stream lagged: {}", e);
                    None
                }
            }
        })
        .take_until(handle.cancel.clone().cancelled_owned());

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// === Ghost Cache ===

async fn list_ghosts(State(state): State<AppState>) -> ApiResult<Json<Vec<GhostInfo>>> {
    Ok(Json(state.ghosts.list()?))
}

#[derive(Deserialize)]
struct PutGhostRequest {
    laps: Vec<Lap>,
    strategy: Option<ReferenceStrategy>,
}

async fn put_ghost(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<PutGhostRequest>,
) -> ApiResult<Json<GhostInfo>> {
    if !GhostStore::is_valid_name(&name) {
        return Err(ApiError::BadRequest(format!("Invalid ghost name: {:?}", name)));
    }
    let strategy = request.strategy.unwrap_or(state.config.laps.reference);
    let ghost = GhostLap::build(&request.laps, strategy)?;
    Ok(Json(state.ghosts.save(&name, &ghost)?))
}

// === Forecast & Summary ===

#[derive(Deserialize)]
struct ForecastRequest {
    laps: Option<Vec<Lap>>,
    features: Option<LapFeatures>,
    track: Option<TrackProfile>,
}

#[derive(Serialize)]
struct LapForecast {
    lap: Option<usize>,
    features: LapFeatures,
    forecast: Forecast,
}

async fn forecast(
    State(state): State<AppState>,
    Json(request): Json<ForecastRequest>,
) -> ApiResult<Json<Vec<LapForecast>>> {
    let profile = request.track.unwrap_or_else(|| TrackProfile {
        name: state.config.track.name.clone(),
        length_scale: state.config.track.length_scale,
    });

    let inputs: Vec<(Option<usize>, LapFeatures)> = match (request.laps, request.features) {
        (Some(laps), None) => laps
            .iter()
            .filter(|lap| !lap.is_empty())
            .map(|lap| (Some(lap.index), LapFeatures::from_lap(lap)))
            .collect(),
        (None, Some(features)) => vec![(None, features)],
        _ => {
            return Err(ApiError::BadRequest(
                "Provide exactly one of 'laps' or 'features'".to_string(),
            ))
        }
    };

    let mut forecasts = Vec::with_capacity(inputs.len());
    for (lap, features) in inputs {
        let forecast = forecast_for_track(state.forecaster.as_ref(), &features, &profile)
            .map_err(|e| ApiError::Unprocessable(format!("{:#}", e)))?;
        forecasts.push(LapForecast {
            lap,
            features,
            forecast,
        });
    }
    Ok(Json(forecasts))
}

#[derive(Deserialize)]
struct SummaryRequest {
    laps: Vec<Lap>,
}

async fn summary(Json(request): Json<SummaryRequest>) -> ApiResult<Json<SessionSummary>> {
    Ok(Json(SessionSummary::from_laps(&request.laps)?))
}
