//! Route handlers for the prediction API.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use database::{NewPrediction, PredictionRecord, PredictionRepository};
use features::{FeatureInput, FeatureRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ApiError, AppState};

/// Default number of history entries returned.
const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// Largest accepted `limit` for the history endpoint.
const MAX_HISTORY_LIMIT: u32 = 200;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    model_path: String,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    prediction: u8,
    probability: f64,
    label: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    id: i64,
    created_at: DateTime<Utc>,
    prediction: i64,
    probability: f64,
    label: String,
    inputs: FeatureRecord,
}

impl From<PredictionRecord> for HistoryEntry {
    fn from(record: PredictionRecord) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            prediction: record.prediction,
            probability: record.probability,
            label: record.label,
            inputs: record.inputs.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    deleted: u64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_loaded: state.inference.is_loaded(),
        model_path: state.model_path.display().to_string(),
    })
}

/// Validates the measurements, scores them and logs the result.
///
/// Degraded-mode answers are returned but never logged.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<FeatureInput>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Json(input) = payload.map_err(|rejection| ApiError::MalformedBody(rejection.body_text()))?;
    let record = input.validate()?;

    let outcome = state.inference.predict(&record)?;
    let persist = outcome.is_available();
    let prediction = outcome.into_prediction();

    if persist {
        let stored = PredictionRepository::record(
            &state.pool,
            NewPrediction {
                inputs: record,
                prediction: prediction.class,
                probability: prediction.probability,
                label: prediction.label.clone(),
            },
        )
        .await?;
        info!(
            id = stored.id,
            prediction = prediction.class,
            probability = prediction.probability,
            "Prediction recorded"
        );
    } else {
        debug!("Model not loaded, returning placeholder prediction");
    }

    Ok(Json(PredictionResponse {
        prediction: prediction.class,
        probability: prediction.probability,
        label: prediction.label,
    }))
}

pub async fn history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::InvalidQuery(rejection.body_text()))?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(ApiError::InvalidQuery(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }

    let records = PredictionRepository::list_recent(&state.pool, limit).await?;
    Ok(Json(records.into_iter().map(HistoryEntry::from).collect()))
}

pub async fn clear_history(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    let deleted = PredictionRepository::clear_all(&state.pool).await?;
    info!(deleted, "Cleared prediction history");
    Ok(Json(ClearResponse { deleted }))
}

