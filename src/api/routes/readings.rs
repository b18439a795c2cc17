//! Reading Routes
//!
//! Endpoints for ingesting and querying sensor readings.
//!
//! - POST /api/readings - Ingest a reading
//! - GET /api/readings - Recent history, newest first
//! - GET /api/readings/latest - Most recent reading
//! - GET /api/readings/:id - Single reading

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CreateReadingRequest, HistoryParams};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::storage::Reading;

/// POST /api/readings
///
/// Durably store a reading and return it with its assigned id and timestamp.
/// Broadcast and alerting happen after the response, off the request path.
pub async fn create_reading(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateReadingRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Reading>)> {
    let Json(req) = payload.map_err(|rejection| {
        ApiError::Validation(format!(
            "temperature and humidity must be numbers: {}",
            rejection.body_text()
        ))
    })?;

    let reading = state.ingestor.ingest(req.temperature, req.humidity).await?;

    tracing::info!(
        reading_id = reading.id,
        temperature = reading.temperature,
        humidity = reading.humidity,
        "Reading ingested"
    );

    Ok((StatusCode::CREATED, Json(reading)))
}

/// GET /api/readings?limit=N
pub async fn list_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Vec<Reading>>> {
    let limit = params.resolve_limit(&state.config);
    let readings = state.store.recent(limit).await?;
    Ok(Json(readings))
}

/// GET /api/readings/latest
pub async fn latest_reading(State(state): State<Arc<AppState>>) -> ApiResult<Json<Reading>> {
    state
        .store
        .latest()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No data yet".to_string()))
}

/// GET /api/readings/:id
pub async fn get_reading(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Reading>> {
    let Path(id) = path.map_err(|rejection| {
        ApiError::Validation(format!("reading id must be an integer: {}", rejection.body_text()))
    })?;

    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Reading {} not found", id)))
}
