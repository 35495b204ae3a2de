//! ML model crate for diabetes risk prediction.
//!
//! This crate covers the offline side (loading the dataset, fitting the
//! imputation + scaling + logistic regression pipeline with the Burn
//! framework, evaluating it and writing the artifact) and the online side
//! (loading the artifact and scoring validated feature records).

pub mod artifact;
pub mod dataset;
pub mod inference;
pub mod metrics;
pub mod preprocess;
pub mod training;

pub use artifact::{ArtifactError, LogisticCoefficients, ModelArtifact, TrainingMetadata};
pub use dataset::{Dataset, DatasetError, HeaderMode, load_dataset, stratified_split};
pub use inference::{
    InferenceError, InferenceOutcome, InferenceService, Prediction, ProbabilityModel,
};
pub use metrics::{ClassMetrics, ConfusionMatrix, EvaluationReport};
pub use preprocess::Preprocessor;
pub use training::{TrainingConfig, TrainingError, fit_logistic_regression, train, train_on_dataset};
