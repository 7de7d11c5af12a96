//! Random Forest assembly and validation.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::labels::ClassLabelList;
use crate::tree::DecisionTree;

/// A validated, immutable Random Forest ensemble.
///
/// Construct via [`RandomForestBuilder`]. Every tree produces distributions
/// aligned with [`RandomForest::labels`].
#[derive(Debug, Clone)]
pub struct RandomForest {
    pub(crate) name: String,
    pub(crate) labels: ClassLabelList,
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) feature_names: Vec<String>,
}

impl RandomForest {
    /// Return the forest name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the ordered class labels.
    #[must_use]
    pub fn labels(&self) -> &ClassLabelList {
        &self.labels
    }

    /// Return the trees in ensemble order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    /// Return the sorted union of features any tree splits on.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

/// Builder that validates trees and labels before yielding a [`RandomForest`].
///
/// # Example
///
/// ```
/// use sprig_rf::{ClassLabelList, DecisionTreeBuilder, RandomForestBuilder};
///
/// let mut tree = DecisionTreeBuilder::new(2);
/// let root = tree.leaf(vec![0.5, 0.5]).unwrap();
///
/// let forest = RandomForestBuilder::new("donor")
///     .with_labels(ClassLabelList::new(["0", "1"]).unwrap())
///     .with_tree(tree.build(root).unwrap())
///     .build()
///     .unwrap();
/// assert_eq!(forest.n_trees(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RandomForestBuilder {
    name: String,
    labels: Option<ClassLabelList>,
    trees: Vec<DecisionTree>,
}

impl RandomForestBuilder {
    /// Start a forest with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: None,
            trees: Vec::new(),
        }
    }

    /// Set the ordered class labels.
    #[must_use]
    pub fn with_labels(mut self, labels: ClassLabelList) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Append one tree.
    #[must_use]
    pub fn with_tree(mut self, tree: DecisionTree) -> Self {
        self.trees.push(tree);
        self
    }

    /// Append several trees, keeping their order.
    #[must_use]
    pub fn with_trees(mut self, trees: impl IntoIterator<Item = DecisionTree>) -> Self {
        self.trees.extend(trees);
        self
    }

    /// Validate and build the forest.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::MissingLabels`] | no label list was set |
    /// | [`ForestError::EmptyForest`] | no trees were added |
    /// | [`ForestError::InvalidTree`] | a tree fails structural validation |
    /// | [`ForestError::ClassCountMismatch`] | a tree's class count differs from the label count |
    /// | [`ForestError::LabelListMismatch`] | a tree was declared against other labels |
    #[instrument(skip_all, fields(forest = %self.name, n_trees = self.trees.len()))]
    pub fn build(self) -> Result<RandomForest, ForestError> {
        let Some(labels) = self.labels else {
            return Err(ForestError::MissingLabels { forest: self.name });
        };
        if self.trees.is_empty() {
            return Err(ForestError::EmptyForest { forest: self.name });
        }

        let mut features = BTreeSet::new();
        for (tree_index, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| ForestError::InvalidTree {
                tree_index,
                source: Box::new(e),
            })?;
            if tree.n_classes() != labels.len() {
                return Err(ForestError::ClassCountMismatch {
                    tree_index,
                    expected: labels.len(),
                    got: tree.n_classes(),
                });
            }
            if let Some(tree_labels) = tree.labels()
                && tree_labels != &labels
            {
                return Err(ForestError::LabelListMismatch {
                    tree_index,
                    tree_labels: tree_labels.to_strings(),
                    forest_labels: labels.to_strings(),
                });
            }
            features.extend(tree.feature_names().iter().cloned());
            debug!(tree_index, n_nodes = tree.n_nodes(), depth = tree.depth(), "tree accepted");
        }

        info!(
            n_classes = labels.len(),
            n_features = features.len(),
            "random forest assembled"
        );

        Ok(RandomForest {
            name: self.name,
            labels,
            trees: self.trees,
            feature_names: features.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use crate::tree::DecisionTreeBuilder;

    fn labels_ab() -> ClassLabelList {
        ClassLabelList::new(["A", "B"]).unwrap()
    }

    fn stump(feature: &str, threshold: f64) -> DecisionTree {
        let mut builder = DecisionTreeBuilder::new(2);
        let left = builder.leaf(vec![1.0, 0.0]).unwrap();
        let right = builder.leaf(vec![0.0, 1.0]).unwrap();
        let root = builder.split(feature, threshold, left, right).unwrap();
        builder.build(root).unwrap()
    }

    #[test]
    fn two_tree_average_ties_to_first_label() {
        let forest = RandomForestBuilder::new("pair")
            .with_labels(labels_ab())
            .with_trees([stump("x", 0.5), stump("x", 0.6)])
            .build()
            .unwrap();

        let v = FeatureVector::new().with("x", 0.55);
        assert_eq!(forest.predict_proba(&v).as_slice(), &[0.5, 0.5]);
        assert_eq!(forest.predict(&v).as_str(), "A");
    }

    #[test]
    fn feature_names_are_sorted_union() {
        let forest = RandomForestBuilder::new("f")
            .with_labels(labels_ab())
            .with_tree(stump("phylop", 0.1))
            .with_tree(stump("ese", 0.2))
            .with_tree(stump("phylop", 0.3))
            .build()
            .unwrap();
        assert_eq!(forest.feature_names(), &["ese".to_string(), "phylop".to_string()]);
        assert_eq!(forest.n_trees(), 3);
        assert_eq!(forest.n_classes(), 2);
        assert_eq!(forest.name(), "f");
    }

    #[test]
    fn empty_forest_rejected() {
        let err = RandomForestBuilder::new("empty")
            .with_labels(labels_ab())
            .build()
            .unwrap_err();
        assert!(matches!(err, ForestError::EmptyForest { .. }));
    }

    #[test]
    fn missing_labels_rejected() {
        let err = RandomForestBuilder::new("nolabels")
            .with_tree(stump("x", 0.5))
            .build()
            .unwrap_err();
        assert!(matches!(err, ForestError::MissingLabels { .. }));
    }

    #[test]
    fn class_count_mismatch_rejected() {
        let mut builder = DecisionTreeBuilder::new(3);
        let root = builder.leaf(vec![0.2, 0.3, 0.5]).unwrap();
        let three_class = builder.build(root).unwrap();

        let err = RandomForestBuilder::new("mixed")
            .with_labels(labels_ab())
            .with_tree(stump("x", 0.5))
            .with_tree(three_class)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ForestError::ClassCountMismatch { tree_index: 1, expected: 2, got: 3 }
        ));
    }

    #[test]
    fn tree_label_list_mismatch_rejected() {
        let mut builder = DecisionTreeBuilder::for_labels(ClassLabelList::new(["B", "A"]).unwrap());
        let root = builder.leaf(vec![1.0, 0.0]).unwrap();
        let reordered = builder.build(root).unwrap();

        let err = RandomForestBuilder::new("reordered")
            .with_labels(labels_ab())
            .with_tree(reordered)
            .build()
            .unwrap_err();
        assert!(matches!(err, ForestError::LabelListMismatch { tree_index: 0, .. }));
    }

    #[test]
    fn matching_tree_label_list_accepted() {
        let mut builder = DecisionTreeBuilder::for_labels(labels_ab());
        let root = builder.leaf(vec![1.0, 0.0]).unwrap();
        let forest = RandomForestBuilder::new("ok")
            .with_labels(labels_ab())
            .with_tree(builder.build(root).unwrap())
            .build()
            .unwrap();
        assert_eq!(forest.predict(&FeatureVector::new()).as_str(), "A");
    }
}
