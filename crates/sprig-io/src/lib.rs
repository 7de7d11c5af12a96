//! Model loading, scoring configuration, feature tables and prediction output.
//!
//! [`ModelLoader`] turns a format-agnostic [`Document`] into a validated
//! forest; [`load_model_file`] does the same for a JSON file on disk.
//! [`ScoringConfig`] wires models and pipeline settings into an evaluator,
//! [`FeatureTableReader`] reads input vectors from CSV and
//! [`PredictionWriter`] writes the results as JSON.

mod config;
mod document;
mod error;
mod loader;
mod reader;
mod writer;

pub use config::{PathogenicLabels, ScoringConfig, ScoringSetup, VersionConfig, VersionFailure};
pub use document::Document;
pub use error::{Corruption, IoError, LoadError, VersionError};
pub use loader::{MAX_TREE_DEPTH, ModelLoader, load_model_file};
pub use reader::{FeatureTable, FeatureTableReader};
pub use writer::{PredictionWriter, error_chain};
