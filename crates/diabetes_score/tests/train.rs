use std::fmt::Write as _;
use std::path::Path;

use diabetes_score::commands;
use features::dataset_columns;
use ml_model::{HeaderMode, ModelArtifact, TrainingConfig};

/// Writes a small CSV where high glucose and BMI mean a positive outcome.
fn write_dataset(path: &Path, with_header: bool) {
    let mut csv = String::new();
    if with_header {
        csv.push_str(&dataset_columns().join(","));
        csv.push('\n');
    }
    for i in 0..60_u32 {
        let positive = i % 3 == 0;
        let glucose = if positive { 150 + i % 20 } else { 90 + i % 20 };
        let bmi = if positive { 36 + i % 5 } else { 24 + i % 5 };
        let outcome = u8::from(positive);
        writeln!(
            csv,
            "{},{glucose},70,20,0,{bmi},0.{},{},{outcome}",
            i % 6,
            300 + i,
            25 + i % 30
        )
        .unwrap();
    }
    std::fs::write(path, csv).unwrap();
}

#[test]
fn test_train_writes_loadable_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("diabetes.csv");
    let output = dir.path().join("artifacts").join("model.json");
    write_dataset(&dataset, true);

    commands::train::run(&dataset, &output, HeaderMode::Auto, &TrainingConfig::new()).unwrap();

    let artifact = ModelArtifact::load(&output).unwrap().unwrap();
    assert_eq!(artifact.metadata.dataset_rows, 60);
    assert_eq!(artifact.metadata.train_rows + artifact.metadata.test_rows, 60);
    assert!(artifact.metadata.evaluation.accuracy > 0.8);

    let high = artifact.probability(&[6.0, 165.0, 70.0, 20.0, 0.0, 39.0, 0.4, 50.0]);
    let low = artifact.probability(&[1.0, 95.0, 70.0, 20.0, 0.0, 25.0, 0.4, 30.0]);
    assert!(high > 0.5);
    assert!(low < 0.5);
}

#[test]
fn test_headerless_dataset_trains() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("diabetes.csv");
    let output = dir.path().join("model.json");
    write_dataset(&dataset, false);

    commands::train::run(&dataset, &output, HeaderMode::Absent, &TrainingConfig::new()).unwrap();

    assert!(output.exists());
}

#[test]
fn test_missing_dataset_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("model.json");

    let result = commands::train::run(
        &dir.path().join("missing.csv"),
        &output,
        HeaderMode::Auto,
        &TrainingConfig::new(),
    );

    assert!(result.is_err());
    assert!(!output.exists());
}
