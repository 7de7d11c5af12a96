//! JSON writer for per-record, per-version predictions.

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sprig_eval::{Evaluation, Prediction};
use tracing::{debug, info, instrument};

use crate::IoError;

/// Render an error and its source chain as `outer: inner: ...`.
#[must_use]
pub fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Writes evaluations to a single JSON file.
///
/// ```json
/// {
///   "n_records": 1,
///   "versions": ["v1"],
///   "records": [
///     { "id": "var1", "results": { "v1": {
///         "distribution": [{ "label": "benign", "probability": 0.2 }, ...],
///         "predicted": "pathogenic",
///         "pathogenicity": 0.8 } } }
///   ]
/// }
/// ```
///
/// A version that failed for a record reports `{ "error": "..." }` instead.
pub struct PredictionWriter {
    path: PathBuf,
}

impl PredictionWriter {
    /// Create a writer targeting `path`, creating its parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn new(path: &Path) -> Result<Self, IoError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| IoError::OutputDirCreate {
                path: dir.to_path_buf(),
                source: e,
            })?;
            debug!("output directory ready");
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Return the output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one entry per record, in the order given.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::LengthMismatch`] | `record_ids` and `evaluations` differ in length |
    /// | [`IoError::WriteFile`] | the file cannot be written |
    #[instrument(skip_all, fields(path = %self.path.display(), n_records = record_ids.len()))]
    pub fn write(&self, record_ids: &[String], evaluations: &[Evaluation]) -> Result<(), IoError> {
        if record_ids.len() != evaluations.len() {
            return Err(IoError::LengthMismatch {
                records: record_ids.len(),
                evaluations: evaluations.len(),
            });
        }

        let versions: BTreeSet<&str> = evaluations
            .iter()
            .flat_map(|e| e.keys().map(|id| id.as_str()))
            .collect();

        let records: Vec<RecordEntry> = record_ids
            .iter()
            .zip(evaluations)
            .map(|(id, evaluation)| RecordEntry {
                id: id.as_str(),
                results: evaluation
                    .iter()
                    .map(|(version, outcome)| {
                        let entry = match outcome {
                            Ok(prediction) => VersionEntry::scored(prediction),
                            Err(e) => VersionEntry::Failed {
                                error: error_chain(e),
                            },
                        };
                        (version.as_str(), entry)
                    })
                    .collect(),
            })
            .collect();

        let artifact = PredictionArtifact {
            n_records: records.len(),
            versions: versions.into_iter().collect(),
            records,
        };

        let write_err = |e: std::io::Error| IoError::WriteFile {
            path: self.path.clone(),
            source: e,
        };
        let file = File::create(&self.path).map_err(write_err)?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, &artifact).map_err(|e| write_err(e.into()))?;
        out.write_all(b"\n").map_err(write_err)?;
        out.flush().map_err(write_err)?;

        info!(path = %self.path.display(), "predictions written");
        Ok(())
    }
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct PredictionArtifact<'a> {
    n_records: usize,
    versions: Vec<&'a str>,
    records: Vec<RecordEntry<'a>>,
}

#[derive(Serialize)]
struct RecordEntry<'a> {
    id: &'a str,
    results: BTreeMap<&'a str, VersionEntry<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum VersionEntry<'a> {
    Scored {
        distribution: Vec<ClassProbability<'a>>,
        predicted: &'a str,
        pathogenicity: f64,
    },
    Failed {
        error: String,
    },
}

impl<'a> VersionEntry<'a> {
    fn scored(prediction: &'a Prediction) -> Self {
        VersionEntry::Scored {
            distribution: prediction
                .probabilities()
                .map(|(label, probability)| ClassProbability {
                    label: label.as_str(),
                    probability,
                })
                .collect(),
            predicted: prediction.predicted_label().as_str(),
            pathogenicity: prediction.pathogenicity(),
        }
    }
}

#[derive(Serialize)]
struct ClassProbability<'a> {
    label: &'a str,
    probability: f64,
}
