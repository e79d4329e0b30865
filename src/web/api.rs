use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::anchor_watch::{AnchorReference, AnchorStatus};
use crate::engine::EngineHandle;
use crate::error::EngineError;
use crate::position::PositionSample;
use crate::position_intake::{AnchorDrop, StatusView, TrackingChange};
use crate::track_ledger::{TotalDistance, TrackPoint, Waypoint};

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub default_interval_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, StatusCode>;

/// Validation failures go back in the body; a dead engine is a 503
fn respond<T>(result: Result<T, EngineError>) -> ApiResult<T> {
    match result {
        Ok(data) => Ok(Json(ApiResponse::ok(data))),
        Err(EngineError::EngineStopped) => {
            error!("Engine is not running");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
        Err(e) => {
            warn!(error = %e, "Request rejected");
            Ok(Json(ApiResponse::error(e.to_string())))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SampleRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct StartTrackingRequest {
    #[serde(default)]
    pub interval_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TrackView {
    pub waypoints: Vec<Waypoint>,
    pub total_distance: TotalDistance,
}

pub async fn get_status(State(state): State<AppState>) -> ApiResult<StatusView> {
    respond(state.engine.status().await)
}

pub async fn get_track(State(state): State<AppState>) -> ApiResult<TrackView> {
    let result = state.engine.track().await
        .map(|(waypoints, total_distance)| TrackView { waypoints, total_distance });
    respond(result)
}

pub async fn get_track_points(State(state): State<AppState>) -> ApiResult<Vec<TrackPoint>> {
    respond(state.engine.track_points().await)
}

pub async fn get_distance(State(state): State<AppState>) -> ApiResult<TotalDistance> {
    respond(state.engine.total_distance().await)
}

pub async fn post_sample(
    State(state): State<AppState>,
    Json(params): Json<SampleRequest>,
) -> ApiResult<AnchorStatus> {
    let sample = PositionSample::new(
        params.latitude,
        params.longitude,
        params.speed,
        params.heading,
        params.timestamp.unwrap_or_else(Utc::now),
    );
    match sample {
        Ok(sample) => respond(state.engine.on_sample(sample).await),
        Err(e) => respond(Err(e)),
    }
}

pub async fn post_mark(State(state): State<AppState>) -> ApiResult<Option<Waypoint>> {
    info!("POST /api/mark called");
    respond(state.engine.mark_manual().await)
}

pub async fn post_man_overboard(State(state): State<AppState>) -> ApiResult<Option<Waypoint>> {
    info!("POST /api/mob called");
    respond(state.engine.mark_man_overboard().await)
}

pub async fn post_drop_anchor(State(state): State<AppState>) -> ApiResult<Option<AnchorDrop>> {
    info!("POST /api/anchor called");
    respond(state.engine.drop_anchor().await)
}

pub async fn post_raise_anchor(State(state): State<AppState>) -> ApiResult<Option<AnchorReference>> {
    info!("POST /api/anchor/raise called");
    respond(state.engine.raise_anchor().await)
}

pub async fn post_start_tracking(
    State(state): State<AppState>,
    params: Option<Json<StartTrackingRequest>>,
) -> ApiResult<TrackingChange> {
    info!(?params, "POST /api/tracking/start called");
    // A bare POST starts with the configured interval
    let interval_ms = params
        .and_then(|Json(p)| p.interval_ms)
        .unwrap_or(state.default_interval_ms);
    respond(state.engine.start_tracking(interval_ms).await)
}

pub async fn post_stop_tracking(State(state): State<AppState>) -> ApiResult<TrackingChange> {
    info!("POST /api/tracking/stop called");
    respond(state.engine.stop_tracking().await)
}

pub async fn post_rebuild(
    State(state): State<AppState>,
    Json(points): Json<Vec<TrackPoint>>,
) -> ApiResult<TotalDistance> {
    info!(points = points.len(), "POST /api/track/rebuild called");
    respond(state.engine.rebuild_from_external_list(points).await)
}

pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/track", get(get_track))
        .route("/track/points", get(get_track_points))
        .route("/distance", get(get_distance))
        .route("/sample", post(post_sample))
        .route("/mark", post(post_mark))
        .route("/mob", post(post_man_overboard))
        .route("/anchor", post(post_drop_anchor))
        .route("/anchor/raise", post(post_raise_anchor))
        .route("/tracking/start", post(post_start_tracking))
        .route("/tracking/stop", post(post_stop_tracking))
        .route("/track/rebuild", post(post_rebuild))
        .with_state(state)
}
