//! Random Forest inference over named feature vectors.
//!
//! Provides arena-based decision trees with a fixed missing-value rule,
//! soft-vote forests over an ordered class label list, validating builders
//! for both, parallel batch prediction via rayon, and versioned binary
//! snapshots of validated forests.

mod error;
mod features;
mod forest;
mod labels;
mod node;
mod predict;
mod serialize;
mod tree;

pub use error::ForestError;
pub use features::{FeatureSource, FeatureVector};
pub use forest::{RandomForest, RandomForestBuilder};
pub use labels::{ClassLabel, ClassLabelList};
pub use node::{FeatureIndex, Node, NodeIndex};
pub use predict::ClassDistribution;
pub use tree::{DISTRIBUTION_TOLERANCE, DecisionTree, DecisionTreeBuilder};
