use std::path::PathBuf;

use crate::node::NodeIndex;

/// Errors from assembling, validating, or persisting trees and forests.
///
/// Every variant is raised at construction or load time; a tree or forest
/// that exists has already passed these checks and cannot fail to evaluate.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when a class label list has no entries.
    #[error("class label list must contain at least one label")]
    EmptyLabelList,

    /// Returned when the same class label appears twice in a label list.
    #[error("duplicate class label \"{label}\"")]
    DuplicateLabel {
        /// The repeated label.
        label: String,
    },

    /// Returned when a forest is built without a class label list.
    #[error("forest \"{forest}\" has no class labels")]
    MissingLabels {
        /// Name of the forest being built.
        forest: String,
    },

    /// Returned when a forest is built without any trees.
    #[error("forest \"{forest}\" has no trees")]
    EmptyForest {
        /// Name of the forest being built.
        forest: String,
    },

    /// Returned when a tree's class count differs from the forest's label count.
    #[error("tree {tree_index} produces {got} class probabilities, forest declares {expected} labels")]
    ClassCountMismatch {
        /// Zero-based position of the tree in the forest.
        tree_index: usize,
        /// Number of labels in the forest's label list.
        expected: usize,
        /// Number of classes the tree was built for.
        got: usize,
    },

    /// Returned when a tree was declared against a different label list than the forest.
    #[error("tree {tree_index} was built for labels {tree_labels:?}, forest declares {forest_labels:?}")]
    LabelListMismatch {
        /// Zero-based position of the tree in the forest.
        tree_index: usize,
        /// Labels the tree was declared against.
        tree_labels: Vec<String>,
        /// Labels of the forest.
        forest_labels: Vec<String>,
    },

    /// Returned when a tree inside a forest fails structural validation.
    #[error("tree {tree_index} is invalid")]
    InvalidTree {
        /// Zero-based position of the tree in the forest.
        tree_index: usize,
        /// The structural problem found in the tree.
        #[source]
        source: Box<ForestError>,
    },

    /// Returned when a leaf distribution has the wrong number of entries.
    #[error("node {node}: distribution has {got} entries, expected {expected}")]
    DistributionLength {
        /// Arena index of the offending leaf.
        node: NodeIndex,
        /// Number of classes of the tree.
        expected: usize,
        /// Number of entries supplied.
        got: usize,
    },

    /// Returned when a leaf probability is negative, NaN, or infinite.
    #[error("node {node}: probability {value} for class {class_index} is not a finite non-negative number")]
    InvalidProbability {
        /// Arena index of the offending leaf.
        node: NodeIndex,
        /// Position of the class within the distribution.
        class_index: usize,
        /// The offending value.
        value: f64,
    },

    /// Returned when a leaf distribution does not sum to 1.0 within tolerance.
    #[error("node {node}: distribution sums to {sum}, expected 1.0")]
    DistributionSum {
        /// Arena index of the offending leaf.
        node: NodeIndex,
        /// The actual sum of the distribution.
        sum: f64,
    },

    /// Returned when a split threshold is NaN or infinite.
    #[error("node {node}: split threshold {threshold} is not finite")]
    NonFiniteThreshold {
        /// Arena index of the offending split.
        node: NodeIndex,
        /// The offending threshold.
        threshold: f64,
    },

    /// Returned when a split refers to a node or feature that does not exist.
    #[error("node {node} refers to missing {what} {index}")]
    DanglingReference {
        /// Arena index of the referring node.
        node: NodeIndex,
        /// Kind of reference (`"node"` or `"feature"`).
        what: &'static str,
        /// The out-of-range index.
        index: usize,
    },

    /// Returned when a node is attached to more than one parent, or the root has a parent.
    #[error("node {node} has more than one parent")]
    SharedNode {
        /// Arena index of the shared node.
        node: NodeIndex,
    },

    /// Returned when a node cannot be reached from the root.
    #[error("node {node} is not reachable from the root")]
    UnreachableNode {
        /// Arena index of the orphaned node.
        node: NodeIndex,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },

    /// Returned when a snapshot decodes but fails validation.
    #[error("model in {path} failed validation")]
    InvalidSnapshot {
        /// Path to the snapshot file.
        path: PathBuf,
        /// The validation failure.
        #[source]
        source: Box<ForestError>,
    },
}
