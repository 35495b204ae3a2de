//! Feature contract for the diabetes risk model.
//!
//! The model consumes exactly [`FEATURE_COUNT`] numeric measurements in the
//! order given by [`FEATURE_NAMES`]. The same names are used as JSON keys on
//! the HTTP API and as CSV header names in the training dataset.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// The number of features the model consumes.
pub const FEATURE_COUNT: usize = 8;

/// Canonical feature order. The fitted model is order-sensitive.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Pregnancies",
    "Glucose",
    "BloodPressure",
    "SkinThickness",
    "Insulin",
    "BMI",
    "DiabetesPedigreeFunction",
    "Age",
];

/// Name of the binary label column in the training dataset.
pub const OUTCOME_COLUMN: &str = "Outcome";

/// Total number of columns expected in a training dataset.
pub const DATASET_COLUMN_COUNT: usize = FEATURE_COUNT + 1;

/// Returns the dataset column names: every feature followed by the outcome.
#[must_use]
pub fn dataset_columns() -> [&'static str; DATASET_COLUMN_COUNT] {
    let mut columns = [OUTCOME_COLUMN; DATASET_COLUMN_COUNT];
    columns[..FEATURE_COUNT].copy_from_slice(&FEATURE_NAMES);
    columns
}

/// A row of features in canonical order.
pub type FeatureRow = [f64; FEATURE_COUNT];

/// A validated set of health measurements.
///
/// Every field is present, finite and non-negative. Instances are only built
/// through [`FeatureInput::validate`] or [`FeatureRecord::from_row`], or read
/// back from storage where they were written after validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "Pregnancies")]
    pub pregnancies: f64,
    #[serde(rename = "Glucose")]
    pub glucose: f64,
    #[serde(rename = "BloodPressure")]
    pub blood_pressure: f64,
    #[serde(rename = "SkinThickness")]
    pub skin_thickness: f64,
    #[serde(rename = "Insulin")]
    pub insulin: f64,
    #[serde(rename = "BMI")]
    pub bmi: f64,
    #[serde(rename = "DiabetesPedigreeFunction")]
    pub diabetes_pedigree_function: f64,
    #[serde(rename = "Age")]
    pub age: f64,
}

impl FeatureRecord {
    /// Returns the features in [`FEATURE_NAMES`] order.
    #[must_use]
    pub const fn to_row(&self) -> FeatureRow {
        [
            self.pregnancies,
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.diabetes_pedigree_function,
            self.age,
        ]
    }

    /// Builds a record from a row in [`FEATURE_NAMES`] order.
    ///
    /// # Errors
    ///
    /// Returns the field errors if any value is negative or not finite.
    pub fn from_row(row: FeatureRow) -> Result<Self, ValidationErrors> {
        FeatureInput::from(row).validate()
    }
}

/// Request-shaped feature input where every field may be absent.
///
/// Deserializing into this type never fails on a missing key, so validation
/// can report every offending field at once instead of the first one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureInput {
    #[serde(rename = "Pregnancies", default, deserialize_with = "lenient_number")]
    pub pregnancies: Option<f64>,
    #[serde(rename = "Glucose", default, deserialize_with = "lenient_number")]
    pub glucose: Option<f64>,
    #[serde(rename = "BloodPressure", default, deserialize_with = "lenient_number")]
    pub blood_pressure: Option<f64>,
    #[serde(rename = "SkinThickness", default, deserialize_with = "lenient_number")]
    pub skin_thickness: Option<f64>,
    #[serde(rename = "Insulin", default, deserialize_with = "lenient_number")]
    pub insulin: Option<f64>,
    #[serde(rename = "BMI", default, deserialize_with = "lenient_number")]
    pub bmi: Option<f64>,
    #[serde(rename = "DiabetesPedigreeFunction", default, deserialize_with = "lenient_number")]
    pub diabetes_pedigree_function: Option<f64>,
    #[serde(rename = "Age", default, deserialize_with = "lenient_number")]
    pub age: Option<f64>,
}

/// Accepts a JSON number or a string holding one, such as `"148"`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(f64),
        Text(String),
    }

    match Option::<Lenient>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Lenient::Number(value)) => Ok(Some(value)),
        Some(Lenient::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid number: {text:?}"))),
    }
}

impl From<FeatureRow> for FeatureInput {
    fn from(row: FeatureRow) -> Self {
        let [
            pregnancies,
            glucose,
            blood_pressure,
            skin_thickness,
            insulin,
            bmi,
            diabetes_pedigree_function,
            age,
        ] = row.map(Some);

        Self {
            pregnancies,
            glucose,
            blood_pressure,
            skin_thickness,
            insulin,
            bmi,
            diabetes_pedigree_function,
            age,
        }
    }
}

impl From<FeatureRecord> for FeatureInput {
    fn from(record: FeatureRecord) -> Self {
        Self::from(record.to_row())
    }
}

impl FeatureInput {
    const fn values(&self) -> [Option<f64>; FEATURE_COUNT] {
        [
            self.pregnancies,
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.diabetes_pedigree_function,
            self.age,
        ]
    }

    /// Checks that every field is present, finite and `>= 0`.
    ///
    /// # Errors
    ///
    /// Returns one [`FieldError`] per offending field, in contract order.
    pub fn validate(&self) -> Result<FeatureRecord, ValidationErrors> {
        let mut errors = Vec::new();
        let mut row = [0.0; FEATURE_COUNT];

        for ((slot, value), field) in row.iter_mut().zip(self.values()).zip(FEATURE_NAMES) {
            match value {
                None => errors.push(FieldError::new(field, "field required")),
                Some(v) if !v.is_finite() => {
                    errors.push(FieldError::new(field, "must be a finite number"));
                }
                Some(v) if v < 0.0 => {
                    errors.push(FieldError::new(field, "must be greater than or equal to 0"));
                }
                Some(v) => *slot = v,
            }
        }

        if !errors.is_empty() {
            return Err(ValidationErrors(errors));
        }

        let [
            pregnancies,
            glucose,
            blood_pressure,
            skin_thickness,
            insulin,
            bmi,
            diabetes_pedigree_function,
            age,
        ] = row;

        Ok(FeatureRecord {
            pregnancies,
            glucose,
            blood_pressure,
            skin_thickness,
            insulin,
            bmi,
            diabetes_pedigree_function,
            age,
        })
    }
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl FieldError {
    const fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All field errors found while validating a [`FeatureInput`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid features: {}", join_errors(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    /// Returns the individual field errors.
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE_ROW: FeatureRow = [6.0, 148.0, 72.0, 35.0, 0.0, 33.6, 0.627, 50.0];

    #[test]
    fn test_dataset_columns() {
        let columns = dataset_columns();
        assert_eq!(columns.len(), 9);
        assert_eq!(columns[0], "Pregnancies");
        assert_eq!(columns[7], "Age");
        assert_eq!(columns[8], OUTCOME_COLUMN);
    }

    #[test]
    fn test_validate_accepts_complete_input() {
        let record = FeatureInput::from(REFERENCE_ROW)
            .validate()
            .expect("reference row is valid");
        assert_eq!(record.to_row(), REFERENCE_ROW);
        assert!((record.bmi - 33.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_reports_every_bad_field() {
        let input = FeatureInput {
            glucose: Some(-1.0),
            age: Some(f64::NAN),
            ..FeatureInput::from(REFERENCE_ROW)
        };
        let input = FeatureInput {
            insulin: None,
            ..input
        };

        let errors = input.validate().expect_err("input is invalid");
        let fields: Vec<_> = errors.fields().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["Glucose", "Insulin", "Age"]);
        assert!(errors.to_string().contains("Insulin: field required"));
    }

    #[test]
    fn test_zero_is_accepted() {
        assert!(FeatureRecord::from_row([0.0; FEATURE_COUNT]).is_ok());
    }

    #[test]
    fn test_json_uses_contract_names() {
        let record = FeatureRecord::from_row(REFERENCE_ROW).expect("valid");
        let json = serde_json::to_value(record).expect("serializable");
        for name in FEATURE_NAMES {
            assert!(json.get(name).is_some(), "missing key {name}");
        }

        let back: FeatureRecord = serde_json::from_value(json).expect("deserializable");
        assert_eq!(back, record);
    }

    #[test]
    fn test_missing_keys_deserialize_to_none() {
        let input: FeatureInput =
            serde_json::from_str(r#"{"Glucose": 120, "Age": 33}"#).expect("parses");
        assert_eq!(input.glucose, Some(120.0));
        assert_eq!(input.pregnancies, None);
        assert_eq!(input.validate().expect_err("incomplete").fields().len(), 6);
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let input: FeatureInput =
            serde_json::from_str(r#"{"Glucose": "148", "BMI": " 33.6 ", "Age": null}"#)
                .expect("parses");
        assert_eq!(input.glucose, Some(148.0));
        assert_eq!(input.bmi, Some(33.6));
        assert_eq!(input.age, None);
    }

    #[test]
    fn test_non_numeric_string_is_rejected() {
        let result = serde_json::from_str::<FeatureInput>(r#"{"Glucose": "high"}"#);
        assert!(result.is_err());
    }
}
