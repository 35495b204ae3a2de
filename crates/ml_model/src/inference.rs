//! Inference service: turns a validated feature record into a prediction.

use std::fmt;
use std::sync::Arc;

use features::{FeatureRecord, FeatureRow};

/// Probability at or above which the positive class is predicted.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Label for the positive class.
pub const POSITIVE_LABEL: &str = "Diabetic (higher risk)";

/// Label for the negative class.
pub const NEGATIVE_LABEL: &str = "Not diabetic (lower risk)";

/// Label returned while no model is loaded.
pub const UNAVAILABLE_LABEL: &str = "Model not loaded. Train first: diabetes-score train";

/// Errors raised while scoring a row.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("model returned an invalid probability: {0}")]
    InvalidProbability(f64),
}

/// Anything that can estimate P(outcome = 1) for a row in contract order.
pub trait ProbabilityModel: Send + Sync {
    /// Returns the probability of the positive outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot score the row.
    fn predict_proba(&self, row: &FeatureRow) -> Result<f64, InferenceError>;
}

/// The result of a single prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted class, 0 or 1.
    pub class: u8,
    /// Estimated probability of class 1.
    pub probability: f64,
    /// Human-readable label for the class.
    pub label: String,
}

impl Prediction {
    /// Classifies a probability with the fixed [`DECISION_THRESHOLD`].
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidProbability`] if `probability` is not
    /// a finite value in `[0, 1]`.
    pub fn from_probability(probability: f64) -> Result<Self, InferenceError> {
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(InferenceError::InvalidProbability(probability));
        }

        let class = u8::from(probability >= DECISION_THRESHOLD);
        let label = if class == 1 {
            POSITIVE_LABEL
        } else {
            NEGATIVE_LABEL
        };

        Ok(Self {
            class,
            probability,
            label: label.to_string(),
        })
    }

    /// The sentinel returned in degraded mode.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            class: 0,
            probability: 0.0,
            label: UNAVAILABLE_LABEL.to_string(),
        }
    }
}

/// Whether a prediction came from a model or is the degraded-mode sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceOutcome {
    Predicted(Prediction),
    Unavailable(Prediction),
}

impl InferenceOutcome {
    /// Returns true if a model produced this prediction.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Predicted(_))
    }

    #[must_use]
    pub const fn prediction(&self) -> &Prediction {
        match self {
            Self::Predicted(p) | Self::Unavailable(p) => p,
        }
    }

    #[must_use]
    pub fn into_prediction(self) -> Prediction {
        match self {
            Self::Predicted(p) | Self::Unavailable(p) => p,
        }
    }
}

/// Scores feature records with an optional, immutable model.
///
/// Built once at start-up and shared behind an `Arc`. Without a model every
/// call returns [`InferenceOutcome::Unavailable`].
#[derive(Clone, Default)]
pub struct InferenceService {
    model: Option<Arc<dyn ProbabilityModel>>,
}

impl fmt::Debug for InferenceService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceService")
            .field("model_loaded", &self.is_loaded())
            .finish()
    }
}

impl InferenceService {
    /// Creates a service backed by `model`.
    #[must_use]
    pub fn new(model: Arc<dyn ProbabilityModel>) -> Self {
        Self { model: Some(model) }
    }

    /// Creates a service in degraded mode.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self { model: None }
    }

    /// Returns true if a model is loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Predicts the outcome for a validated record.
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails or returns an invalid probability.
    pub fn predict(&self, record: &FeatureRecord) -> Result<InferenceOutcome, InferenceError> {
        let Some(model) = &self.model else {
            return Ok(InferenceOutcome::Unavailable(Prediction::unavailable()));
        };

        let probability = model.predict_proba(&record.to_row())?;
        Prediction::from_probability(probability).map(InferenceOutcome::Predicted)
    }
}
