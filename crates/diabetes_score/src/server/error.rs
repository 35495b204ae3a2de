//! API error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use features::ValidationErrors;
use ml_model::InferenceError;
use serde_json::json;
use tracing::error;

/// Errors a handler can return.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The body was not valid JSON or had the wrong value types.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::MalformedBody(message) | Self::InvalidQuery(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "detail": message }))
            }
            Self::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "detail": errors.fields() }),
            ),
            Self::Inference(_) | Self::Database(_) => {
                error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
