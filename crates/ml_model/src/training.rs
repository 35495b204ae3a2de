//! Training pipeline: dataset → preprocessing → logistic regression → artifact.

use std::path::Path;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::TensorData;
use burn::tensor::activation::log_sigmoid;
use chrono::Utc;
use features::{FEATURE_COUNT, FeatureRow};
use tracing::{debug, info};

use crate::artifact::{LogisticCoefficients, ModelArtifact, TrainingMetadata, sigmoid};
use crate::dataset::{Dataset, DatasetError, HeaderMode, RawRow, load_dataset, stratified_split};
use crate::metrics::EvaluationReport;
use crate::preprocess::Preprocessor;

/// Training runs on the CPU; autodiff is required for the optimizer.
type TrainBackend = Autodiff<NdArray>;

/// Errors raised by the training pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("tensor conversion failed: {0}")]
    Tensor(String),
}

/// Configuration for fitting the classifier.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation.
    #[config(default = 0.2)]
    pub test_size: f64,
    /// Seed for the train/test split.
    #[config(default = 42)]
    pub seed: u64,
    /// Iteration cap for the optimizer.
    #[config(default = 2000)]
    pub max_iterations: usize,
    /// Adam learning rate.
    #[config(default = 0.01)]
    pub learning_rate: f64,
    /// Stop once every component of the objective gradient is below this.
    #[config(default = 1e-6)]
    pub tolerance: f64,
    /// Inverse L2 regularization strength.
    #[config(default = 1.0)]
    pub inverse_regularization: f64,
}

impl TrainingConfig {
    fn check(&self) -> Result<(), TrainingError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(TrainingError::InvalidConfig(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.max_iterations == 0 {
            return Err(TrainingError::InvalidConfig(
                "max_iterations must be positive".to_string(),
            ));
        }
        if self.learning_rate <= 0.0 || self.inverse_regularization <= 0.0 {
            return Err(TrainingError::InvalidConfig(
                "learning_rate and inverse_regularization must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logistic regression as a single linear unit over the standardized features.
#[derive(Module, Debug)]
pub struct LogisticRegression<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> LogisticRegression<B> {
    /// Creates a zero-initialised model, which keeps fitting deterministic.
    pub fn new(device: &B::Device) -> Self {
        let linear = LinearConfig::new(FEATURE_COUNT, 1)
            .with_initializer(Initializer::Zeros)
            .init(device);

        Self { linear }
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `input` - Tensor of shape [`batch_size`, `FEATURE_COUNT`]
    ///
    /// # Returns
    ///
    /// Tensor of shape [`batch_size`] containing logits.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 1> {
        let [batch_size, _] = input.dims();
        self.linear.forward(input).reshape([batch_size])
    }

    /// Regularized mean log-loss.
    ///
    /// Matches the objective `0.5 * |w|^2 + C * sum(log_loss)` divided by
    /// `C * n`, so the optimum is the same as the unscaled form.
    fn objective(&self, inputs: Tensor<B, 2>, targets: Tensor<B, 1>, l2: f64) -> Tensor<B, 1> {
        let logits = self.forward(inputs);

        let positive = targets.clone() * log_sigmoid(logits.clone());
        let negative = targets.neg().add_scalar(1.0) * log_sigmoid(logits.neg());
        let log_loss = (positive + negative).mean().neg();

        let penalty = self.linear.weight.val().powf_scalar(2.0).sum().mul_scalar(l2);

        log_loss + penalty
    }

    fn coefficients(&self) -> Result<LogisticCoefficients, TrainingError> {
        let weights = to_f32_vec(self.linear.weight.val().reshape([FEATURE_COUNT]))?;
        let intercept = match &self.linear.bias {
            Some(bias) => to_f32_vec(bias.val())?.first().copied().unwrap_or(0.0),
            None => 0.0,
        };

        let weights: FeatureRow =
            std::array::from_fn(|i| weights.get(i).copied().map_or(0.0, f64::from));

        Ok(LogisticCoefficients {
            weights,
            intercept: f64::from(intercept),
        })
    }
}

/// Result of fitting the classifier.
#[derive(Debug, Clone)]
pub struct FitOutput {
    pub coefficients: LogisticCoefficients,
    pub iterations: usize,
    pub final_loss: f64,
}

/// Fits a logistic regression on standardized rows with full-batch Adam.
///
/// # Errors
///
/// Returns an error if there is no data or tensors cannot be read back.
pub fn fit_logistic_regression(
    rows: &[FeatureRow],
    labels: &[u8],
    config: &TrainingConfig,
) -> Result<FitOutput, TrainingError> {
    if rows.is_empty() || rows.len() != labels.len() {
        return Err(TrainingError::InvalidConfig(format!(
            "need matching non-empty rows and labels, got {} and {}",
            rows.len(),
            labels.len()
        )));
    }

    let device = NdArrayDevice::default();
    let n = rows.len();

    #[allow(clippy::cast_possible_truncation)]
    let features_data: Vec<f32> = rows.iter().flatten().map(|&v| v as f32).collect();
    let targets_data: Vec<f32> = labels.iter().map(|&l| f32::from(l)).collect();

    let inputs = Tensor::<TrainBackend, 2>::from_data(
        TensorData::new(features_data, [n, FEATURE_COUNT]),
        &device,
    );
    let targets = Tensor::<TrainBackend, 1>::from_data(TensorData::new(targets_data, [n]), &device);

    #[allow(clippy::cast_precision_loss)]
    let l2 = 1.0 / (2.0 * config.inverse_regularization * n as f64);

    let mut model = LogisticRegression::<TrainBackend>::new(&device);
    let mut optimizer = AdamConfig::new().init();

    let mut coefficients = model.coefficients()?;
    let mut iterations = 0;

    for iteration in 0..config.max_iterations {
        let (loss_value, gradient_norm) = objective_and_gradient(rows, labels, &coefficients, l2);

        if iteration % 200 == 0 {
            debug!(iteration, loss = loss_value, gradient_norm, "Fitting logistic regression");
        }

        if gradient_norm < config.tolerance {
            debug!(iteration, gradient_norm, "Converged");
            break;
        }

        // Backward pass
        let loss = model.objective(inputs.clone(), targets.clone(), l2);
        let grads = GradientsParams::from_grads(loss.backward(), &model);

        // Update weights
        model = optimizer.step(config.learning_rate, model, grads);
        coefficients = model.coefficients()?;
        iterations = iteration + 1;
    }

    let (final_loss, _) = objective_and_gradient(rows, labels, &coefficients, l2);

    Ok(FitOutput {
        coefficients,
        iterations,
        final_loss,
    })
}

/// Evaluates the regularized objective in `f64` at `coefficients`.
///
/// Returns the objective value and the largest absolute component of its
/// gradient over the weights and the intercept.
fn objective_and_gradient(
    rows: &[FeatureRow],
    labels: &[u8],
    coefficients: &LogisticCoefficients,
    l2: f64,
) -> (f64, f64) {
    #[allow(clippy::cast_precision_loss)]
    let n = rows.len() as f64;

    let mut log_loss = 0.0;
    let mut weight_gradient = [0.0; FEATURE_COUNT];
    let mut intercept_gradient = 0.0;

    for (row, &label) in rows.iter().zip(labels) {
        let logit = coefficients.intercept
            + row
                .iter()
                .zip(&coefficients.weights)
                .map(|(x, w)| x * w)
                .sum::<f64>();
        let target = f64::from(label);

        log_loss += softplus(logit) - target * logit;

        let residual = sigmoid(logit) - target;
        for (gradient, x) in weight_gradient.iter_mut().zip(row) {
            *gradient += residual * x;
        }
        intercept_gradient += residual;
    }

    let penalty: f64 = coefficients.weights.iter().map(|w| w * w).sum::<f64>() * l2;
    let gradient_norm = weight_gradient
        .iter()
        .zip(&coefficients.weights)
        .map(|(gradient, w)| (gradient / n + 2.0 * l2 * w).abs())
        .fold((intercept_gradient / n).abs(), f64::max);

    (log_loss / n + penalty, gradient_norm)
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Fits the full pipeline on an in-memory dataset and evaluates it.
///
/// # Errors
///
/// Returns an error if the dataset is not trainable or the config is invalid.
pub fn train_on_dataset(
    dataset: &Dataset,
    config: &TrainingConfig,
) -> Result<ModelArtifact, TrainingError> {
    config.check()?;
    dataset.ensure_trainable()?;

    let [negatives, positives] = dataset.class_counts();
    info!(rows = dataset.len(), negatives, positives, "Loaded training data");

    let split = stratified_split(&dataset.labels, config.test_size, config.seed);
    let select = |indices: &[usize]| -> (Vec<RawRow>, Vec<u8>) {
        indices
            .iter()
            .map(|&i| (dataset.features[i], dataset.labels[i]))
            .unzip()
    };
    let (train_rows, train_labels) = select(&split.train);
    let (test_rows, test_labels) = select(&split.test);

    info!(
        train = train_rows.len(),
        test = test_rows.len(),
        seed = config.seed,
        "Split dataset"
    );

    let preprocessor = Preprocessor::fit(&train_rows);
    let x_train: Vec<FeatureRow> = train_rows.iter().map(|r| preprocessor.transform(r)).collect();

    let fit = fit_logistic_regression(&x_train, &train_labels, config)?;
    info!(
        iterations = fit.iterations,
        final_loss = fit.final_loss,
        "Classifier fitted"
    );

    let predicted: Vec<u8> = test_rows
        .iter()
        .map(|r| {
            let p = fit.coefficients.probability(&preprocessor.transform(r));
            u8::from(p >= crate::inference::DECISION_THRESHOLD)
        })
        .collect();
    let evaluation = EvaluationReport::from_predictions(&test_labels, &predicted);

    let metadata = TrainingMetadata {
        trained_at: Utc::now(),
        dataset_path: None,
        dataset_rows: dataset.len(),
        skipped_rows: dataset.skipped_rows,
        train_rows: train_rows.len(),
        test_rows: test_rows.len(),
        seed: config.seed,
        test_size: config.test_size,
        iterations: fit.iterations,
        final_loss: fit.final_loss,
        evaluation,
    };

    Ok(ModelArtifact::new(preprocessor, fit.coefficients, metadata))
}

/// Loads the dataset at `dataset_path` and fits the full pipeline.
///
/// Nothing is written to disk; call [`ModelArtifact::save`] on the result.
///
/// # Errors
///
/// Returns an error if the dataset is missing or malformed, or fitting fails.
pub fn train(
    dataset_path: &Path,
    header_mode: HeaderMode,
    config: &TrainingConfig,
) -> Result<ModelArtifact, TrainingError> {
    info!(
        dataset = %dataset_path.display(),
        header_mode = %header_mode,
        "Starting training"
    );

    let dataset = load_dataset(dataset_path, header_mode)?;
    let mut artifact = train_on_dataset(&dataset, config)?;
    artifact.metadata.dataset_path = Some(dataset_path.to_path_buf());

    Ok(artifact)
}

fn to_f32_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>, TrainingError> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| TrainingError::Tensor(format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic synthetic data where glucose and BMI drive the outcome.
    fn synthetic_dataset(rows: usize) -> Dataset {
        let mut dataset = Dataset::default();
        for i in 0..rows {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f64;
            let glucose = 80.0 + (t * 37.0) % 120.0;
            let bmi = 20.0 + (t * 13.0) % 25.0;
            let risk = (glucose - 140.0) / 20.0 + (bmi - 32.0) / 6.0;
            let mut row: RawRow = [
                Some(t % 7.0),
                Some(glucose),
                Some(60.0 + t % 30.0),
                Some(20.0 + t % 15.0),
                Some(t % 200.0),
                Some(bmi),
                Some(0.2 + (t % 10.0) / 20.0),
                Some(21.0 + t % 40.0),
            ];
            if i % 11 == 0 {
                row[4] = None;
            }
            dataset.features.push(row);
            dataset.labels.push(u8::from(risk > 0.0));
        }
        dataset
    }

    fn fast_config() -> TrainingConfig {
        TrainingConfig::new().with_max_iterations(600).with_learning_rate(0.05)
    }

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::new();
        assert!((config.test_size - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.seed, 42);
        assert_eq!(config.max_iterations, 2000);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dataset = synthetic_dataset(40);
        let config = TrainingConfig::new().with_test_size(1.5);
        assert!(matches!(
            train_on_dataset(&dataset, &config),
            Err(TrainingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_model_creation_is_zero_initialised() {
        let device = NdArrayDevice::default();
        let model = LogisticRegression::<NdArray>::new(&device);
        let coefficients = model.coefficients().expect("readable");
        assert!(coefficients.weights.iter().all(|w| w.abs() < f64::EPSILON));
        assert!(coefficients.intercept.abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_learns_separable_signal() {
        let dataset = synthetic_dataset(200);
        let artifact = train_on_dataset(&dataset, &fast_config()).expect("trains");

        // Glucose and BMI carry the signal.
        assert!(artifact.classifier.weights[1] > 0.5);
        assert!(artifact.classifier.weights[5] > 0.5);
        assert!(artifact.metadata.evaluation.accuracy > 0.85);
        assert_eq!(artifact.metadata.train_rows + artifact.metadata.test_rows, 200);
        assert!(artifact.validate().is_ok());
    }

    const PARAMETERS: usize = FEATURE_COUNT + 1;

    /// Standardized rows with label noise so the optimum stays finite.
    fn noisy_standardized(rows: usize) -> (Vec<FeatureRow>, Vec<u8>) {
        let mut dataset = synthetic_dataset(rows);
        for (i, label) in dataset.labels.iter_mut().enumerate() {
            if i % 5 == 0 {
                *label = 1 - *label;
            }
        }
        let preprocessor = Preprocessor::fit(&dataset.features);
        let x = dataset.features.iter().map(|r| preprocessor.transform(r)).collect();
        (x, dataset.labels)
    }

    /// Newton's method on the same objective, intercept first.
    fn exact_optimum(rows: &[FeatureRow], labels: &[u8], l2: f64) -> [f64; PARAMETERS] {
        #[allow(clippy::cast_precision_loss)]
        let n = rows.len() as f64;
        let mut theta = [0.0; PARAMETERS];

        for _ in 0..30 {
            let mut gradient = [0.0; PARAMETERS];
            let mut hessian = [[0.0; PARAMETERS]; PARAMETERS];

            for (row, &label) in rows.iter().zip(labels) {
                let mut x = [1.0; PARAMETERS];
                x[1..].copy_from_slice(row);
                let p = sigmoid(x.iter().zip(&theta).map(|(a, b)| a * b).sum());
                let residual = p - f64::from(label);
                for i in 0..PARAMETERS {
                    gradient[i] += residual * x[i] / n;
                    for j in 0..PARAMETERS {
                        hessian[i][j] += p * (1.0 - p) * x[i] * x[j] / n;
                    }
                }
            }
            for i in 1..PARAMETERS {
                gradient[i] += 2.0 * l2 * theta[i];
                hessian[i][i] += 2.0 * l2;
            }

            let step = solve(hessian, gradient);
            for (t, s) in theta.iter_mut().zip(step) {
                *t -= s;
            }
        }
        theta
    }

    /// Gaussian elimination with partial pivoting.
    fn solve(
        mut a: [[f64; PARAMETERS]; PARAMETERS],
        mut b: [f64; PARAMETERS],
    ) -> [f64; PARAMETERS] {
        for col in 0..PARAMETERS {
            let pivot = (col..PARAMETERS)
                .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
                .unwrap();
            a.swap(col, pivot);
            b.swap(col, pivot);
            for row in col + 1..PARAMETERS {
                let factor = a[row][col] / a[col][col];
                for k in col..PARAMETERS {
                    a[row][k] -= factor * a[col][k];
                }
                b[row] -= factor * b[col];
            }
        }
        let mut x = [0.0; PARAMETERS];
        for row in (0..PARAMETERS).rev() {
            let tail: f64 = (row + 1..PARAMETERS).map(|k| a[row][k] * x[k]).sum();
            x[row] = (b[row] - tail) / a[row][row];
        }
        x
    }

    #[test]
    fn test_fit_reaches_exact_optimum() {
        let (rows, labels) = noisy_standardized(300);
        let config = TrainingConfig::new();

        let fit = fit_logistic_regression(&rows, &labels, &config).expect("fits");

        #[allow(clippy::cast_precision_loss)]
        let l2 = 1.0 / (2.0 * config.inverse_regularization * rows.len() as f64);
        let exact = exact_optimum(&rows, &labels, l2);

        let max_diff = std::iter::once((fit.coefficients.intercept - exact[0]).abs())
            .chain(
                fit.coefficients
                    .weights
                    .iter()
                    .zip(&exact[1..])
                    .map(|(w, e)| (w - e).abs()),
            )
            .fold(0.0, f64::max);
        assert!(max_diff < 1e-3, "max coefficient diff {max_diff}");

        let exact_coefficients = LogisticCoefficients {
            weights: std::array::from_fn(|i| exact[i + 1]),
            intercept: exact[0],
        };
        let (exact_loss, exact_gradient) =
            objective_and_gradient(&rows, &labels, &exact_coefficients, l2);
        assert!(exact_gradient < 1e-9);
        assert!((fit.final_loss - exact_loss).abs() < 1e-6);
    }

    #[test]
    fn test_zero_tolerance_runs_every_iteration() {
        let (rows, labels) = noisy_standardized(60);
        let config = TrainingConfig::new().with_max_iterations(50).with_tolerance(0.0);

        let fit = fit_logistic_regression(&rows, &labels, &config).expect("fits");

        assert_eq!(fit.iterations, 50);
    }

    #[test]
    fn test_softplus_is_stable() {
        assert!((softplus(0.0) - std::f64::consts::LN_2).abs() < 1e-12);
        assert!((softplus(800.0) - 800.0).abs() < 1e-9);
        assert!(softplus(-800.0) >= 0.0);
    }

    #[test]
    fn test_training_is_deterministic() {
        let dataset = synthetic_dataset(120);
        let config = fast_config();

        let first = train_on_dataset(&dataset, &config).expect("trains");
        let second = train_on_dataset(&dataset, &config).expect("trains");

        assert_eq!(first.preprocessor, second.preprocessor);
        assert_eq!(first.classifier, second.classifier);
        assert_eq!(first.metadata.evaluation, second.metadata.evaluation);

        let reference = [6.0, 148.0, 72.0, 35.0, 0.0, 33.6, 0.627, 50.0];
        let p1 = first.probability(&reference);
        let p2 = second.probability(&reference);
        assert!((0.0..=1.0).contains(&p1));
        assert!((p1 - p2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_class_dataset_fails() {
        let mut dataset = synthetic_dataset(30);
        dataset.labels.iter_mut().for_each(|l| *l = 0);
        assert!(matches!(
            train_on_dataset(&dataset, &fast_config()),
            Err(TrainingError::Dataset(DatasetError::SingleClass(0)))
        ));
    }

    #[test]
    fn test_missing_dataset_file() {
        let result = train(
            Path::new("/no/such/diabetes.csv"),
            HeaderMode::Auto,
            &TrainingConfig::new(),
        );
        assert!(matches!(
            result,
            Err(TrainingError::Dataset(DatasetError::NotFound(_)))
        ));
    }
}
