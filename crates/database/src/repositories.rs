//! Repository functions for database operations.

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json;
use tracing::debug;

use crate::models::{NewPrediction, PredictionRecord};

/// Repository for the prediction log.
pub struct PredictionRepository;

impl PredictionRepository {
    /// Appends a prediction to the log and returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn record(
        pool: &SqlitePool,
        input: NewPrediction,
    ) -> Result<PredictionRecord, sqlx::Error> {
        let created_at = Utc::now();
        let inputs = Json(input.inputs);

        let result = sqlx::query(
            r"
            INSERT INTO predictions (created_at, inputs_json, prediction, probability, label)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(created_at)
        .bind(&inputs)
        .bind(i64::from(input.prediction))
        .bind(input.probability)
        .bind(&input.label)
        .execute(pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, prediction = input.prediction, "Recorded prediction");

        Ok(PredictionRecord {
            id,
            created_at,
            inputs,
            prediction: i64::from(input.prediction),
            probability: input.probability,
            label: input.label,
        })
    }

    /// Lists the most recent predictions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_recent(
        pool: &SqlitePool,
        limit: u32,
    ) -> Result<Vec<PredictionRecord>, sqlx::Error> {
        sqlx::query_as::<_, PredictionRecord>(
            r"
            SELECT id, created_at, inputs_json, prediction, probability, label
            FROM predictions
            ORDER BY id DESC
            LIMIT ?
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
    }

    /// Deletes every logged prediction and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn clear_all(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM predictions").execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Counts the logged predictions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM predictions")
            .fetch_one(pool)
            .await
    }
}
