//! Database model types.

use chrono::{DateTime, Utc};
use features::FeatureRecord;
use sqlx::types::Json;

/// A logged prediction as stored in the `predictions` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PredictionRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[sqlx(rename = "inputs_json")]
    pub inputs: Json<FeatureRecord>,
    pub prediction: i64,
    pub probability: f64,
    pub label: String,
}

/// Input for logging a new prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub inputs: FeatureRecord,
    pub prediction: u8,
    pub probability: f64,
    pub label: String,
}
