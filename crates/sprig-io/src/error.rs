//! Error types for sprig-io.

use std::path::PathBuf;

use sprig_eval::EvalError;
use sprig_pipeline::TransformError;
use sprig_rf::ForestError;

/// Errors from turning a model document into a forest.
///
/// Loading is atomic: whenever one of these is returned no forest exists.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Returned when the document violates the model schema or its invariants.
    #[error("model \"{model}\" is corrupt at {location}")]
    Corrupt {
        /// Model name, or `<unnamed>` if the name itself could not be read.
        model: String,
        /// Path to the offending value, e.g. `trees[3].left.right`.
        location: String,
        /// What is wrong at `location`.
        #[source]
        reason: Corruption,
    },

    /// Returned when a model file cannot be read.
    #[error("cannot read model file {path}")]
    Read {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a model file is not well-formed JSON.
    #[error("model file {path} is not valid JSON")]
    Parse {
        /// Path to the model file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// The specific defect behind a [`LoadError::Corrupt`].
#[derive(Debug, thiserror::Error)]
pub enum Corruption {
    /// Returned when a required object field is absent.
    #[error("required field \"{field}\" is missing")]
    MissingField {
        /// Name of the absent field.
        field: &'static str,
    },

    /// Returned when a value has the wrong document type.
    #[error("expected {expected}, found {found}")]
    WrongType {
        /// Type the schema requires.
        expected: &'static str,
        /// Type actually present.
        found: &'static str,
    },

    /// Returned when a numeric class label is fractional, non-finite or out of integer range.
    #[error("class label must be a string or an integer, found {value}")]
    InvalidLabel {
        /// The rejected number.
        value: f64,
    },

    /// Returned when the model declares no classes.
    #[error("class label list is empty")]
    NoClasses,

    /// Returned when a class label appears twice in the class list.
    #[error("class label \"{label}\" is declared twice")]
    DuplicateClass {
        /// The repeated label.
        label: String,
    },

    /// Returned when the model has an empty tree list.
    #[error("model has no trees")]
    NoTrees,

    /// Returned when a node carries both split and leaf fields.
    #[error("node has both split and leaf fields")]
    AmbiguousNode,

    /// Returned when a node carries neither split nor leaf fields.
    #[error("node has neither \"feature\" nor \"distribution\"")]
    UnknownNode,

    /// Returned when a split names an empty feature.
    #[error("feature name is empty")]
    EmptyFeature,

    /// Returned when a split threshold is NaN or infinite.
    #[error("threshold {threshold} is not finite")]
    NonFiniteThreshold {
        /// The rejected threshold.
        threshold: f64,
    },

    /// Returned when a tree nests splits beyond the loader's depth limit.
    #[error("tree is deeper than {limit} levels")]
    TooDeep {
        /// The configured limit.
        limit: usize,
    },

    /// Returned when a leaf names a class the model does not declare.
    #[error("distribution refers to undeclared class \"{label}\"")]
    UnknownLabel {
        /// The undeclared label.
        label: String,
    },

    /// Returned when a leaf names the same class twice.
    #[error("distribution lists class \"{label}\" twice")]
    RepeatedLabel {
        /// The repeated label.
        label: String,
    },

    /// Returned when a keyed leaf omits a declared class.
    #[error("distribution has no entry for class \"{label}\"")]
    MissingLabel {
        /// The omitted label.
        label: String,
    },

    /// Returned when a positional leaf has the wrong number of entries.
    #[error("distribution has {got} entries, model declares {expected} classes")]
    DistributionLength {
        /// Number of declared classes.
        expected: usize,
        /// Number of entries found.
        got: usize,
    },

    /// Returned when a probability is negative, NaN or infinite.
    #[error("probability {value} for class \"{label}\" is not a finite non-negative number")]
    InvalidProbability {
        /// Class the probability belongs to.
        label: String,
        /// The rejected value.
        value: f64,
    },

    /// Returned when a leaf's probabilities do not sum to one within tolerance.
    #[error("probabilities sum to {sum}, expected 1.0")]
    DistributionSum {
        /// The actual sum.
        sum: f64,
    },

    /// Returned when the forest builder rejects the assembled trees.
    #[error("forest assembly rejected the model")]
    Rejected {
        /// Builder error.
        #[source]
        source: ForestError,
    },
}

/// Why a configured classifier version was left out of an evaluator.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    /// Returned when the version's model file fails to load.
    #[error("model failed to load")]
    Load(#[from] LoadError),

    /// Returned when the version's pathogenicity labels do not match its model.
    #[error("pathogenicity rule does not fit the model")]
    Rule(#[from] EvalError),
}

/// Errors from feature tables, scoring configuration, and prediction output.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the header has no feature columns after the id column.
    #[error("no feature columns in {path}")]
    NoFeatureColumns {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when two header columns share a feature name.
    #[error("duplicate feature column \"{column}\" in {path}")]
    DuplicateColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// The repeated column name.
        column: String,
    },

    /// Returned when the CSV file contains a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} (record {record_id}) has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Record id of the offending row.
        record_id: String,
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a row has an empty record id.
    #[error("empty record id in {path}: row {row_index}")]
    EmptyRecordId {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
    },

    /// Returned when a cell is neither a finite number nor a missing-value token.
    #[error("invalid value in {path}: row {row_index}, column \"{column}\", raw value \"{raw}\"")]
    InvalidValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Feature column name.
        column: String,
        /// The raw cell text.
        raw: String,
    },

    /// Returned when the same record id appears more than once.
    #[error("duplicate record id \"{record_id}\" in {path}: first at row {first_row}, again at row {second_row}")]
    DuplicateRecordId {
        /// Path to the CSV file.
        path: PathBuf,
        /// The duplicated id.
        record_id: String,
        /// Zero-based row index of the first occurrence.
        first_row: usize,
        /// Zero-based row index of the second occurrence.
        second_row: usize,
    },

    /// Returned when a scoring configuration is not valid JSON or does not match the schema.
    #[error("invalid scoring configuration {path}")]
    ConfigParse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when the configured imputer defaults are unusable.
    #[error("invalid imputer configuration")]
    Imputer {
        /// The rejected default.
        #[source]
        source: TransformError,
    },

    /// Returned when the configured versions cannot form an evaluator.
    #[error("cannot assemble evaluator")]
    Evaluator {
        /// Why assembly failed.
        #[source]
        source: EvalError,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the number of evaluations does not match the number of records.
    #[error("{records} record ids but {evaluations} evaluations")]
    LengthMismatch {
        /// Number of record ids supplied.
        records: usize,
        /// Number of evaluations supplied.
        evaluations: usize,
    },
}
