//! Binary snapshots of validated forests via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::forest::{RandomForest, RandomForestBuilder};
use crate::labels::ClassLabelList;
use crate::tree::DecisionTree;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope written by [`RandomForest::save`].
#[derive(serde::Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    name: &'a str,
    labels: &'a ClassLabelList,
    trees: &'a [DecisionTree],
}

/// Owned counterpart of [`EnvelopeRef`], decoded by [`RandomForest::load`].
#[derive(serde::Deserialize)]
struct Envelope {
    format_version: u32,
    name: String,
    labels: ClassLabelList,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Save the forest to a binary snapshot.
    ///
    /// Uses bincode encoding wrapped in a versioned envelope for
    /// forward-compatibility checking.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SerializeModel`] | bincode encoding failed |
    /// | [`ForestError::WriteModel`] | file write failed |
    #[instrument(skip_all, fields(forest = %self.name, path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        let path = path.as_ref();

        let envelope = EnvelopeRef {
            format_version: FORMAT_VERSION,
            name: &self.name,
            labels: &self.labels,
            trees: &self.trees,
        };

        let bytes =
            bincode::serialize(&envelope).map_err(|e| ForestError::SerializeModel { source: e })?;

        std::fs::write(path, &bytes).map_err(|e| ForestError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            n_trees = self.trees.len(),
            "model snapshot saved"
        );

        Ok(())
    }

    /// Load a forest from a binary snapshot.
    ///
    /// Checks the format version, then passes the decoded trees through
    /// [`RandomForestBuilder`] so a tampered snapshot cannot yield an
    /// invalid forest.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::ReadModel`] | file read failed |
    /// | [`ForestError::DeserializeModel`] | bincode decoding failed |
    /// | [`ForestError::IncompatibleModelVersion`] | format version mismatch |
    /// | [`ForestError::InvalidSnapshot`] | decoded forest fails validation |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForestError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| ForestError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        let envelope: Envelope =
            bincode::deserialize(&bytes).map_err(|e| ForestError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(ForestError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        debug!(
            name = %envelope.name,
            n_trees = envelope.trees.len(),
            n_classes = envelope.labels.len(),
            "model snapshot decoded"
        );

        RandomForestBuilder::new(envelope.name)
            .with_labels(envelope.labels)
            .with_trees(envelope.trees)
            .build()
            .map_err(|e| ForestError::InvalidSnapshot {
                path: path.to_path_buf(),
                source: Box::new(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::features::FeatureVector;
    use crate::tree::DecisionTreeBuilder;

    fn simple_forest() -> RandomForest {
        let trees = [0.2, 0.5, 0.8].map(|threshold| {
            let mut builder = DecisionTreeBuilder::new(2);
            let left = builder.leaf(vec![0.9, 0.1]).unwrap();
            let right = builder.leaf(vec![0.25, 0.75]).unwrap();
            let root = builder.split("x", threshold, left, right).unwrap();
            builder.build(root).unwrap()
        });
        RandomForestBuilder::new("snapshot")
            .with_labels(ClassLabelList::new(["0", "1"]).unwrap())
            .with_trees(trees)
            .build()
            .unwrap()
    }

    #[test]
    fn round_trip_identical_predictions() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("model.bin");

        let forest = simple_forest();
        forest.save(&model_path).unwrap();
        let loaded = RandomForest::load(&model_path).unwrap();

        assert_eq!(loaded.name(), "snapshot");
        assert_eq!(loaded.labels(), forest.labels());
        for x in [0.0, 0.35, 0.5, 0.9, f64::NAN] {
            let sample = FeatureVector::new().with("x", x);
            assert_eq!(forest.predict(&sample), loaded.predict(&sample));
            assert_eq!(
                forest.predict_proba(&sample).as_slice(),
                loaded.predict_proba(&sample).as_slice()
            );
        }
    }

    #[test]
    fn load_nonexistent_file_error() {
        let dir = TempDir::new().unwrap();
        let err = RandomForest::load(dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, ForestError::ReadModel { .. }));
    }

    #[test]
    fn load_corrupt_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");
        std::fs::write(&path, b"not a valid bincode file").unwrap();
        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(err, ForestError::DeserializeModel { .. }));
    }

    #[test]
    fn load_wrong_version_error() {
        let forest = simple_forest();
        let envelope = EnvelopeRef {
            format_version: FORMAT_VERSION + 1,
            name: &forest.name,
            labels: &forest.labels,
            trees: &forest.trees,
        };
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.bin");
        std::fs::write(&path, bincode::serialize(&envelope).unwrap()).unwrap();

        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ForestError::IncompatibleModelVersion { found: 2, .. }
        ));
    }

    #[test]
    fn load_empty_forest_snapshot_error() {
        let forest = simple_forest();
        let envelope = EnvelopeRef {
            format_version: FORMAT_VERSION,
            name: &forest.name,
            labels: &forest.labels,
            trees: &[],
        };
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, bincode::serialize(&envelope).unwrap()).unwrap();

        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(err, ForestError::InvalidSnapshot { .. }));
    }
}
