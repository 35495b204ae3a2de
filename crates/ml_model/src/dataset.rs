//! Training dataset loading and splitting.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use features::{DATASET_COLUMN_COUNT, FEATURE_COUNT, dataset_columns};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

/// A feature row as read from disk, where any cell may be missing.
pub type RawRow = [Option<f64>; FEATURE_COUNT];

/// Errors raised while loading a training dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid dataset schema: {0}")]
    Schema(String),

    #[error("dataset contains no labelled rows")]
    Empty,

    #[error("dataset only contains outcome {0}; both classes are required")]
    SingleClass(u8),

    #[error("failed to read dataset: {0}")]
    Csv(#[from] csv::Error),
}

/// How the first CSV record is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderMode {
    /// Use the first record as a header if it names every expected column,
    /// otherwise treat the file as headerless.
    #[default]
    Auto,
    /// The first record must be a header naming every expected column.
    Present,
    /// There is no header; columns are assigned positionally.
    Absent,
}

impl FromStr for HeaderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "present" | "header" => Ok(Self::Present),
            "absent" | "none" | "headerless" => Ok(Self::Absent),
            other => Err(format!(
                "unknown header mode '{other}', expected auto, present or absent"
            )),
        }
    }
}

impl fmt::Display for HeaderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Present => "present",
            Self::Absent => "absent",
        };
        f.write_str(name)
    }
}

/// Labelled rows loaded from a training CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Feature rows in contract order; unparseable cells are `None`.
    pub features: Vec<RawRow>,
    /// Binary outcome for each row.
    pub labels: Vec<u8>,
    /// Rows dropped because their outcome was missing or not 0/1.
    pub skipped_rows: usize,
}

impl Dataset {
    /// Returns the number of labelled rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if there are no labelled rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Counts rows per outcome as `[negatives, positives]`.
    #[must_use]
    pub fn class_counts(&self) -> [usize; 2] {
        let positives = self.labels.iter().filter(|&&l| l == 1).count();
        [self.labels.len() - positives, positives]
    }

    /// Checks that both outcome classes are represented.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Empty`] or [`DatasetError::SingleClass`].
    pub fn ensure_trainable(&self) -> Result<(), DatasetError> {
        match self.class_counts() {
            [0, 0] => Err(DatasetError::Empty),
            [_, 0] => Err(DatasetError::SingleClass(0)),
            [0, _] => Err(DatasetError::SingleClass(1)),
            _ => Ok(()),
        }
    }
}

/// Loads a training dataset from a CSV file.
///
/// Columns are reconciled according to `header_mode`. Every cell is coerced
/// to a number; cells that do not parse become missing values.
///
/// # Errors
///
/// Returns an error if the file is absent, unreadable, or does not have the
/// expected columns.
pub fn load_dataset(path: &Path, header_mode: HeaderMode) -> Result<Dataset, DatasetError> {
    if !path.is_file() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let records = reader
        .records()
        .collect::<Result<Vec<csv::StringRecord>, _>>()?;

    parse_records(&records, header_mode)
}

/// Parses already-split CSV records into a dataset.
fn parse_records(
    records: &[csv::StringRecord],
    header_mode: HeaderMode,
) -> Result<Dataset, DatasetError> {
    let Some(first) = records.first() else {
        return Err(DatasetError::Empty);
    };

    let header = match header_mode {
        HeaderMode::Auto => locate_columns(first),
        HeaderMode::Present => Some(locate_columns(first).ok_or_else(|| {
            DatasetError::Schema(format!(
                "header must name all of {:?}, found {:?}",
                dataset_columns(),
                first.iter().collect::<Vec<_>>()
            ))
        })?),
        HeaderMode::Absent => None,
    };

    let (columns, body, first_line) = if let Some(columns) = header {
        debug!("Dataset has a header row, locating columns by name");
        (columns, &records[1..], 2)
    } else {
        if first.len() != DATASET_COLUMN_COUNT {
            return Err(DatasetError::Schema(format!(
                "expected {DATASET_COLUMN_COUNT} columns, but got {} columns",
                first.len()
            )));
        }
        debug!("Dataset has no header row, assigning columns positionally");
        (std::array::from_fn(|i| i), records, 1)
    };

    let mut dataset = Dataset::default();

    for (offset, record) in body.iter().enumerate() {
        if header.is_none() && record.len() != DATASET_COLUMN_COUNT {
            return Err(DatasetError::Schema(format!(
                "line {} has {} columns, expected {DATASET_COLUMN_COUNT}",
                first_line + offset,
                record.len()
            )));
        }

        let cell = |column: usize| record.get(columns[column]).and_then(parse_cell);

        let Some(label) = cell(FEATURE_COUNT).and_then(parse_label) else {
            dataset.skipped_rows += 1;
            continue;
        };

        dataset.features.push(std::array::from_fn(cell));
        dataset.labels.push(label);
    }

    if dataset.skipped_rows > 0 {
        warn!(
            skipped = dataset.skipped_rows,
            "Skipped rows without a 0/1 outcome"
        );
    }

    Ok(dataset)
}

/// Finds the position of every expected column in a header record.
fn locate_columns(header: &csv::StringRecord) -> Option<[usize; DATASET_COLUMN_COUNT]> {
    let expected = dataset_columns();
    let mut columns = [0; DATASET_COLUMN_COUNT];

    for (slot, name) in columns.iter_mut().zip(expected) {
        *slot = header.iter().position(|field| field == name)?;
    }

    Some(columns)
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_label(value: f64) -> Option<u8> {
    if value.abs() < f64::EPSILON {
        Some(0)
    } else if (value - 1.0).abs() < f64::EPSILON {
        Some(1)
    } else {
        None
    }
}

/// Row indices of a train/test split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Splits row indices into train and test sets, preserving the outcome ratio.
///
/// Each class is shuffled with a generator seeded from `seed` and
/// `test_size` of it (rounded) goes to the test set. At least one row of each
/// class is kept for training. Indices in both sets are returned sorted.
#[must_use]
pub fn stratified_split(labels: &[u8], test_size: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for class in [0_u8, 1] {
        let mut indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label == class)
            .map(|(i, _)| i)
            .collect();

        indices.shuffle(&mut rng);

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let n_test = ((indices.len() as f64) * test_size).round() as usize;
        let n_test = n_test.min(indices.len().saturating_sub(1));

        let (class_test, class_train) = indices.split_at(n_test);
        test.extend_from_slice(class_test);
        train.extend_from_slice(class_train);
    }

    train.sort_unstable();
    test.sort_unstable();

    Split { train, test }
}
