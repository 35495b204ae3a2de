//! Train command - fits the classifier and writes the model artifact.

use std::path::Path;

use anyhow::{Context, Result};
use ml_model::{HeaderMode, TrainingConfig};
use tracing::info;

/// Runs the train command.
///
/// The artifact is only written once fitting and evaluation succeed, so a
/// failed run leaves any previous artifact untouched.
///
/// # Errors
///
/// Returns an error if the dataset is missing or malformed, training fails,
/// or the artifact cannot be written.
pub fn run(
    dataset_path: &Path,
    output_path: &Path,
    header_mode: HeaderMode,
    config: &TrainingConfig,
) -> Result<()> {
    let artifact = ml_model::train(dataset_path, header_mode, config)
        .with_context(|| format!("training on {} failed", dataset_path.display()))?;

    let evaluation = &artifact.metadata.evaluation;
    info!(accuracy = evaluation.accuracy, "Evaluation on held-out split");
    info!("\n{evaluation}");

    artifact
        .save(output_path)
        .with_context(|| format!("failed to write model artifact to {}", output_path.display()))?;

    info!(
        output = %output_path.display(),
        train_rows = artifact.metadata.train_rows,
        test_rows = artifact.metadata.test_rows,
        "Training complete"
    );

    Ok(())
}
