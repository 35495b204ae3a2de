//! Serve command - loads the model and runs the HTTP service.

use std::sync::Arc;

use anyhow::{Context, Result};
use config::Config;
use database::{create_pool, run_migrations};
use ml_model::{InferenceService, ModelArtifact};
use tracing::{info, warn};

use crate::server::{self, AppState};

/// Runs the serve command.
///
/// A missing artifact starts the service in degraded mode. An artifact that
/// exists but cannot be loaded aborts start-up.
///
/// # Errors
///
/// Returns an error if the artifact is corrupt, the database is unreachable,
/// or the listener cannot be bound.
pub async fn run(config: &Config) -> Result<()> {
    let inference = load_inference(config)?;

    let pool = create_pool(&config.database_url)
        .await
        .with_context(|| format!("failed to open database at {}", config.database_url))?;
    run_migrations(&pool).await.context("failed to run migrations")?;

    let state = AppState {
        pool,
        inference: Arc::new(inference),
        model_path: config.model_path.clone(),
    };

    server::run(state, config.bind_addr).await
}

fn load_inference(config: &Config) -> Result<InferenceService> {
    let path = &config.model_path;
    let artifact = ModelArtifact::load(path)
        .with_context(|| format!("model artifact at {} is unusable", path.display()))?;

    match artifact {
        Some(artifact) => {
            info!(
                path = %path.display(),
                trained_at = %artifact.metadata.trained_at,
                accuracy = artifact.metadata.evaluation.accuracy,
                "Loaded model artifact"
            );
            Ok(InferenceService::new(Arc::new(artifact)))
        }
        None => {
            warn!(
                path = %path.display(),
                "No model artifact found, predictions are unavailable until `diabetes-score train` is run"
            );
            Ok(InferenceService::unavailable())
        }
    }
}
