use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::{
    ForestError,
    features::FeatureSource,
    labels::ClassLabelList,
    node::{FeatureIndex, Node, NodeIndex},
    predict::argmax,
};

/// Maximum allowed deviation of a leaf distribution's sum from 1.0.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Check that `distribution` is a valid probability vector over `n_classes` classes.
pub(crate) fn check_distribution(
    node: NodeIndex,
    distribution: &[f64],
    n_classes: usize,
) -> Result<(), ForestError> {
    if distribution.len() != n_classes {
        return Err(ForestError::DistributionLength {
            node,
            expected: n_classes,
            got: distribution.len(),
        });
    }
    for (class_index, &value) in distribution.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(ForestError::InvalidProbability {
                node,
                class_index,
                value,
            });
        }
    }
    let sum: f64 = distribution.iter().sum();
    if (sum - 1.0).abs() > DISTRIBUTION_TOLERANCE {
        return Err(ForestError::DistributionSum { node, sum });
    }
    Ok(())
}

/// Arena builder for a [`DecisionTree`].
///
/// Nodes are added bottom-up: leaves first, then splits that adopt already
/// created children. Each node can be adopted once, so the result is always
/// a strict binary tree.
///
/// ```
/// use sprig_rf::{DecisionTreeBuilder, FeatureVector};
///
/// let mut builder = DecisionTreeBuilder::new(2);
/// let left = builder.leaf(vec![1.0, 0.0]).unwrap();
/// let right = builder.leaf(vec![0.0, 1.0]).unwrap();
/// let root = builder.split("x", 0.5, left, right).unwrap();
/// let tree = builder.build(root).unwrap();
///
/// assert_eq!(tree.predict(&FeatureVector::new().with("x", 0.3)), 0);
/// ```
#[derive(Debug, Clone)]
pub struct DecisionTreeBuilder {
    name: Option<String>,
    n_classes: usize,
    labels: Option<ClassLabelList>,
    nodes: Vec<Node>,
    attached: Vec<bool>,
    feature_names: Vec<String>,
    feature_lookup: HashMap<String, FeatureIndex>,
}

impl DecisionTreeBuilder {
    /// Create a builder for a tree producing `n_classes` probabilities per leaf.
    #[must_use]
    pub fn new(n_classes: usize) -> Self {
        Self {
            name: None,
            n_classes,
            labels: None,
            nodes: Vec::new(),
            attached: Vec::new(),
            feature_names: Vec::new(),
            feature_lookup: HashMap::new(),
        }
    }

    /// Create a builder for a tree declared against `labels`.
    ///
    /// A forest will only accept the tree if it uses the same label list.
    #[must_use]
    pub fn for_labels(labels: ClassLabelList) -> Self {
        let mut builder = Self::new(labels.len());
        builder.labels = Some(labels);
        builder
    }

    /// Set a human-readable tree name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Return the number of classes every leaf must cover.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Add a leaf holding `distribution`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::DistributionLength`] | length differs from `n_classes` |
    /// | [`ForestError::InvalidProbability`] | a value is negative or non-finite |
    /// | [`ForestError::DistributionSum`] | values do not sum to 1.0 within [`DISTRIBUTION_TOLERANCE`] |
    pub fn leaf(&mut self, distribution: Vec<f64>) -> Result<NodeIndex, ForestError> {
        let node = NodeIndex::new(self.nodes.len());
        check_distribution(node, &distribution, self.n_classes)?;
        Ok(self.push(Node::Leaf { distribution }))
    }

    /// Add a split on `feature` adopting `left` and `right` as children.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::NonFiniteThreshold`] | `threshold` is NaN or infinite |
    /// | [`ForestError::DanglingReference`] | a child index was never created |
    /// | [`ForestError::SharedNode`] | a child already has a parent, or both children are the same node |
    pub fn split(
        &mut self,
        feature: &str,
        threshold: f64,
        left: NodeIndex,
        right: NodeIndex,
    ) -> Result<NodeIndex, ForestError> {
        let node = NodeIndex::new(self.nodes.len());
        if !threshold.is_finite() {
            return Err(ForestError::NonFiniteThreshold { node, threshold });
        }
        for child in [left, right] {
            if child.index() >= self.nodes.len() {
                return Err(ForestError::DanglingReference {
                    node,
                    what: "node",
                    index: child.index(),
                });
            }
            if self.attached[child.index()] {
                return Err(ForestError::SharedNode { node: child });
            }
        }
        if left == right {
            return Err(ForestError::SharedNode { node: left });
        }
        self.attached[left.index()] = true;
        self.attached[right.index()] = true;

        let feature = self.intern(feature);
        Ok(self.push(Node::Split {
            feature,
            threshold,
            left,
            right,
        }))
    }

    /// Finish the tree with `root` as its entry point.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::DanglingReference`] | `root` was never created |
    /// | [`ForestError::SharedNode`] | `root` is already a child of another split |
    /// | [`ForestError::UnreachableNode`] | some node is not a descendant of `root` |
    pub fn build(self, root: NodeIndex) -> Result<DecisionTree, ForestError> {
        if root.index() >= self.nodes.len() {
            return Err(ForestError::DanglingReference {
                node: root,
                what: "node",
                index: root.index(),
            });
        }
        if self.attached[root.index()] {
            return Err(ForestError::SharedNode { node: root });
        }
        // Children always precede their parent, so every adopted node leads
        // to the single unadopted one.
        if let Some(orphan) = (0..self.nodes.len()).find(|&i| i != root.index() && !self.attached[i]) {
            return Err(ForestError::UnreachableNode {
                node: NodeIndex::new(orphan),
            });
        }

        let tree = DecisionTree {
            name: self.name,
            nodes: self.nodes,
            root,
            feature_names: self.feature_names,
            n_classes: self.n_classes,
            labels: self.labels,
        };
        debug!(
            name = tree.name(),
            n_nodes = tree.n_nodes(),
            n_leaves = tree.n_leaves(),
            "decision tree built"
        );
        Ok(tree)
    }

    fn intern(&mut self, name: &str) -> FeatureIndex {
        if let Some(&index) = self.feature_lookup.get(name) {
            return index;
        }
        let index = FeatureIndex::new(self.feature_names.len());
        self.feature_names.push(name.to_string());
        self.feature_lookup.insert(name.to_string(), index);
        index
    }

    fn push(&mut self, node: Node) -> NodeIndex {
        let index = NodeIndex::new(self.nodes.len());
        self.nodes.push(node);
        self.attached.push(false);
        index
    }
}

/// An immutable binary decision tree over named features.
///
/// Stored as an arena-based `Vec<Node>` with index references. Leaf
/// distributions are indexed by the label positions of the forest the tree
/// belongs to.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    name: Option<String>,
    nodes: Vec<Node>,
    root: NodeIndex,
    feature_names: Vec<String>,
    n_classes: usize,
    labels: Option<ClassLabelList>,
}

impl DecisionTree {
    /// Return the class probability distribution for `source`.
    ///
    /// Traverses from the root: at each split, goes left when the feature
    /// value is `<= threshold`, right otherwise. A `NaN` or absent feature
    /// fails the test and goes right.
    pub fn predict_proba<S: FeatureSource + ?Sized>(&self, source: &S) -> &[f64] {
        let mut idx = self.root;
        loop {
            match &self.nodes[idx.index()] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = self.route(source, *feature, *threshold, *left, *right),
            }
        }
    }

    /// Predict the class index for `source`.
    ///
    /// Returns the argmax of the leaf distribution; ties go to the lowest index.
    pub fn predict<S: FeatureSource + ?Sized>(&self, source: &S) -> usize {
        argmax(self.predict_proba(source))
    }

    /// Return the arena indices visited from the root to the reached leaf.
    pub fn decision_path<S: FeatureSource + ?Sized>(&self, source: &S) -> Vec<NodeIndex> {
        let mut path = vec![self.root];
        let mut idx = self.root;
        while let Node::Split {
            feature,
            threshold,
            left,
            right,
        } = &self.nodes[idx.index()]
        {
            idx = self.route(source, *feature, *threshold, *left, *right);
            path.push(idx);
        }
        path
    }

    /// Return the tree's name, if it has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Return the number of classes in every leaf distribution.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the label list the tree was declared against, if any.
    #[must_use]
    pub fn labels(&self) -> Option<&ClassLabelList> {
        self.labels.as_ref()
    }

    /// Return the names of the features the tree splits on.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the root's arena index.
    #[must_use]
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Return the node at `index`.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index.index())
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        let mut queue = VecDeque::new();
        queue.push_back((self.root, 0usize));

        while let Some((idx, d)) = queue.pop_front() {
            match self.nodes[idx.index()].children() {
                None => max_depth = max_depth.max(d),
                Some((left, right)) => {
                    queue.push_back((left, d + 1));
                    queue.push_back((right, d + 1));
                }
            }
        }

        max_depth
    }

    /// Re-check every structural invariant.
    ///
    /// Trees from [`DecisionTreeBuilder`] already satisfy these; trees decoded
    /// from a snapshot are checked here before they become observable.
    pub(crate) fn validate(&self) -> Result<(), ForestError> {
        let n_nodes = self.nodes.len();
        if self.root.index() >= n_nodes {
            return Err(ForestError::DanglingReference {
                node: self.root,
                what: "node",
                index: self.root.index(),
            });
        }

        let mut has_parent = vec![false; n_nodes];
        for (i, node) in self.nodes.iter().enumerate() {
            let idx = NodeIndex::new(i);
            match node {
                Node::Leaf { distribution } => {
                    check_distribution(idx, distribution, self.n_classes)?;
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if !threshold.is_finite() {
                        return Err(ForestError::NonFiniteThreshold {
                            node: idx,
                            threshold: *threshold,
                        });
                    }
                    if feature.index() >= self.feature_names.len() {
                        return Err(ForestError::DanglingReference {
                            node: idx,
                            what: "feature",
                            index: feature.index(),
                        });
                    }
                    for child in [*left, *right] {
                        if child.index() >= n_nodes {
                            return Err(ForestError::DanglingReference {
                                node: idx,
                                what: "node",
                                index: child.index(),
                            });
                        }
                        if child == self.root || has_parent[child.index()] {
                            return Err(ForestError::SharedNode { node: child });
                        }
                        has_parent[child.index()] = true;
                    }
                }
            }
        }

        // With one parent per node and a parentless root, everything reachable
        // from the root forms a tree; detached cycles stay unvisited.
        let mut visited = vec![false; n_nodes];
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            visited[idx.index()] = true;
            if let Some((left, right)) = self.nodes[idx.index()].children() {
                stack.push(left);
                stack.push(right);
            }
        }
        if let Some(orphan) = visited.iter().position(|&v| !v) {
            return Err(ForestError::UnreachableNode {
                node: NodeIndex::new(orphan),
            });
        }

        Ok(())
    }

    fn route<S: FeatureSource + ?Sized>(
        &self,
        source: &S,
        feature: FeatureIndex,
        threshold: f64,
        left: NodeIndex,
        right: NodeIndex,
    ) -> NodeIndex {
        match source.feature(&self.feature_names[feature.index()]) {
            Some(value) if value <= threshold => left,
            _ => right,
        }
    }
}
