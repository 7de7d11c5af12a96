//! CSV feature table reader with full input validation.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use sprig_rf::FeatureVector;
use tracing::{debug, info, instrument};

use crate::IoError;

/// Cell values read as the missing-value sentinel.
const MISSING_TOKENS: [&str; 5] = ["", "NA", "NaN", "nan", "."];

/// Feature vectors read from a CSV file, in file order.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Record identifiers from the first column.
    pub record_ids: Vec<String>,
    /// Feature column names from the header.
    pub feature_names: Vec<String>,
    /// One vector per record. Every vector carries every feature column.
    pub vectors: Vec<FeatureVector>,
}

impl FeatureTable {
    /// Return the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.record_ids.len()
    }

    /// Return `true` if the table has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record_ids.is_empty()
    }
}

/// Reads feature vectors from a CSV file.
///
/// Expected CSV format:
/// - Header row required: `id,<feature>,<feature>,...`
/// - One row per record, all rows must have the same number of columns
/// - Empty, `NA`, `NaN`, `nan` and `.` cells become the missing-value sentinel
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::NoFeatureColumns`] | Header has only the id column |
/// | [`IoError::DuplicateColumn`] | Two header columns share a name |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::EmptyRecordId`] | Row has an empty id cell |
/// | [`IoError::InvalidValue`] | Cell is infinite or not a number |
/// | [`IoError::DuplicateRecordId`] | Same id appears twice |
pub struct FeatureTableReader {
    path: PathBuf,
}

impl FeatureTableReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`FeatureTable`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<FeatureTable, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets the InconsistentRowLength check below report
        // ragged rows instead of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        })?;
        let expected_cols = header.len();
        let feature_names: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
        if feature_names.is_empty() {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }
        let mut seen_columns = HashSet::new();
        for name in &feature_names {
            if !seen_columns.insert(name.as_str()) {
                return Err(IoError::DuplicateColumn {
                    path: self.path.clone(),
                    column: name.clone(),
                });
            }
        }
        debug!(n_features = feature_names.len(), "read CSV header");

        let mut record_ids = Vec::new();
        let mut vectors = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| IoError::CsvParse {
                path: self.path.clone(),
                offset: e.position().map_or(0, |p| p.byte()),
                source: e,
            })?;

            let record_id = record.get(0).unwrap_or("").to_string();
            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    record_id,
                    expected: expected_cols,
                    got: record.len(),
                });
            }
            if record_id.is_empty() {
                return Err(IoError::EmptyRecordId {
                    path: self.path.clone(),
                    row_index,
                });
            }
            if let Some(&first_row) = seen.get(&record_id) {
                return Err(IoError::DuplicateRecordId {
                    path: self.path.clone(),
                    record_id,
                    first_row,
                    second_row: row_index,
                });
            }
            seen.insert(record_id.clone(), row_index);

            let mut vector = FeatureVector::new();
            for (name, raw) in feature_names.iter().zip(record.iter().skip(1)) {
                vector.insert(name.as_str(), self.parse_cell(raw, row_index, name)?);
            }

            record_ids.push(record_id);
            vectors.push(vector);
        }

        if record_ids.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(
            n_records = record_ids.len(),
            n_features = feature_names.len(),
            "feature table loaded"
        );

        Ok(FeatureTable {
            record_ids,
            feature_names,
            vectors,
        })
    }

    fn parse_cell(&self, raw: &str, row_index: usize, column: &str) -> Result<f64, IoError> {
        if MISSING_TOKENS.contains(&raw) {
            return Ok(FeatureVector::MISSING);
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(IoError::InvalidValue {
                path: self.path.clone(),
                row_index,
                column: column.to_string(),
                raw: raw.to_string(),
            }),
        }
    }
}
