//! Predict command - scores one set of measurements offline.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use features::FeatureInput;
use ml_model::{InferenceService, ModelArtifact};
use tracing::info;

/// Measurements for a single patient, in feature contract order.
#[derive(Debug, Clone, Copy, Args)]
pub struct FeatureArgs {
    /// Number of pregnancies
    #[arg(long)]
    pub pregnancies: f64,

    /// Plasma glucose concentration
    #[arg(long)]
    pub glucose: f64,

    /// Diastolic blood pressure (mm Hg)
    #[arg(long)]
    pub blood_pressure: f64,

    /// Triceps skin fold thickness (mm)
    #[arg(long)]
    pub skin_thickness: f64,

    /// 2-hour serum insulin (mu U/ml)
    #[arg(long)]
    pub insulin: f64,

    /// Body mass index
    #[arg(long)]
    pub bmi: f64,

    /// Diabetes pedigree function
    #[arg(long)]
    pub diabetes_pedigree_function: f64,

    /// Age in years
    #[arg(long)]
    pub age: f64,
}

impl From<&FeatureArgs> for FeatureInput {
    fn from(args: &FeatureArgs) -> Self {
        Self::from([
            args.pregnancies,
            args.glucose,
            args.blood_pressure,
            args.skin_thickness,
            args.insulin,
            args.bmi,
            args.diabetes_pedigree_function,
            args.age,
        ])
    }
}

/// Runs the predict command.
///
/// Nothing is written to the prediction log.
///
/// # Errors
///
/// Returns an error if the measurements are invalid, no artifact exists at
/// `model_path`, or the model cannot score the row.
pub fn run(model_path: &Path, args: &FeatureArgs) -> Result<()> {
    let record = FeatureInput::from(args).validate()?;

    let Some(artifact) = ModelArtifact::load(model_path)
        .with_context(|| format!("model artifact at {} is unusable", model_path.display()))?
    else {
        bail!(
            "No model artifact at {}. Train first: diabetes-score train",
            model_path.display()
        );
    };

    let service = InferenceService::new(Arc::new(artifact));
    let prediction = service.predict(&record)?.into_prediction();

    info!(
        prediction = prediction.class,
        probability = prediction.probability,
        label = %prediction.label,
        "Prediction"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_args() -> FeatureArgs {
        FeatureArgs {
            pregnancies: 6.0,
            glucose: 148.0,
            blood_pressure: 72.0,
            skin_thickness: 35.0,
            insulin: 0.0,
            bmi: 33.6,
            diabetes_pedigree_function: 0.627,
            age: 50.0,
        }
    }

    #[test]
    fn test_feature_args_map_in_contract_order() {
        let record = FeatureInput::from(&reference_args()).validate().unwrap();

        assert_eq!(
            record.to_row(),
            [6.0, 148.0, 72.0, 35.0, 0.0, 33.6, 0.627, 50.0]
        );
    }

    #[test]
    fn test_negative_measurement_is_rejected() {
        let args = FeatureArgs {
            glucose: -1.0,
            ..reference_args()
        };
        let dir = tempfile::tempdir().unwrap();

        let err = run(&dir.path().join("model.json"), &args).unwrap_err();

        assert!(err.to_string().contains("Glucose"));
    }

    #[test]
    fn test_missing_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = run(&dir.path().join("model.json"), &reference_args()).unwrap_err();

        assert!(err.to_string().contains("Train first"));
    }
}
