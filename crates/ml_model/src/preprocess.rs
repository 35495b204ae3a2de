//! Median imputation and standardization.

use features::{FEATURE_COUNT, FeatureRow};
use serde::{Deserialize, Serialize};

use crate::dataset::RawRow;

/// Scales below this are treated as zero variance.
const MIN_SCALE: f64 = 1e-12;

/// Fitted preprocessing state: per-feature medians, means and scales.
///
/// Missing values are replaced by the training median, then every feature is
/// centred on the training mean and divided by the training standard
/// deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub medians: FeatureRow,
    pub means: FeatureRow,
    pub scales: FeatureRow,
}

impl Preprocessor {
    /// Fits medians on the raw rows, then means and scales on the imputed rows.
    ///
    /// A feature with no observed values gets a median of `0.0`. A feature with
    /// zero variance keeps a scale of `1.0`.
    #[must_use]
    pub fn fit(rows: &[RawRow]) -> Self {
        let medians: FeatureRow = std::array::from_fn(|feature| {
            let mut values: Vec<f64> = rows.iter().filter_map(|row| row[feature]).collect();
            median(&mut values).unwrap_or(0.0)
        });

        let imputed: Vec<FeatureRow> = rows.iter().map(|row| impute(row, &medians)).collect();

        #[allow(clippy::cast_precision_loss)]
        let count = imputed.len().max(1) as f64;

        let means: FeatureRow = std::array::from_fn(|feature| {
            imputed.iter().map(|row| row[feature]).sum::<f64>() / count
        });

        let scales: FeatureRow = std::array::from_fn(|feature| {
            let variance = imputed
                .iter()
                .map(|row| (row[feature] - means[feature]).powi(2))
                .sum::<f64>()
                / count;
            let std = variance.sqrt();
            if std < MIN_SCALE { 1.0 } else { std }
        });

        Self {
            medians,
            means,
            scales,
        }
    }

    /// Imputes and standardizes a raw row.
    #[must_use]
    pub fn transform(&self, row: &RawRow) -> FeatureRow {
        self.standardize(&impute(row, &self.medians))
    }

    /// Standardizes a complete row.
    #[must_use]
    pub fn standardize(&self, row: &FeatureRow) -> FeatureRow {
        std::array::from_fn(|feature| (row[feature] - self.means[feature]) / self.scales[feature])
    }

    /// Checks that every fitted statistic is finite and every scale positive.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        (0..FEATURE_COUNT).all(|i| {
            self.medians[i].is_finite()
                && self.means[i].is_finite()
                && self.scales[i].is_finite()
                && self.scales[i] > 0.0
        })
    }
}

fn impute(row: &RawRow, medians: &FeatureRow) -> FeatureRow {
    std::array::from_fn(|feature| row[feature].unwrap_or(medians[feature]))
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;

    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
