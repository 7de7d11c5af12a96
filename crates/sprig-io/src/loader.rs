//! Model loader: structured document to validated [`RandomForest`].
//!
//! Expected document shape:
//!
//! ```text
//! { "name": "...", "classes": [label, ...], "trees": [node, ...] }
//! node = { "feature": "...", "threshold": number, "left": node, "right": node }
//!      | { "distribution": { label: probability, ... } | [probability, ...] }
//! ```
//!
//! Labels are strings or integers. A tree's root node may carry an optional
//! `"name"`. Unknown fields are ignored.

use std::fmt;
use std::fs;
use std::path::Path;

use sprig_rf::{
    ClassLabelList, DISTRIBUTION_TOLERANCE, DecisionTree, DecisionTreeBuilder, NodeIndex,
    RandomForest, RandomForestBuilder,
};
use tracing::{debug, info, instrument};

use crate::document::Document;
use crate::error::{Corruption, LoadError};

/// Maximum number of split levels accepted in one tree.
pub const MAX_TREE_DEPTH: usize = 100;

const UNNAMED: &str = "<unnamed>";

/// Dotted path to a value inside a model document.
#[derive(Debug, Clone, Default)]
struct Location(String);

impl Location {
    fn key(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{name}", self.0))
        }
    }

    fn index(&self, i: usize) -> Self {
        Self(format!("{}[{i}]", self.0))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// A defect found before the model name is attached.
struct Fault {
    location: Location,
    reason: Corruption,
}

impl Fault {
    fn new(location: &Location, reason: Corruption) -> Self {
        Self {
            location: location.clone(),
            reason,
        }
    }

    fn into_error(self, model: &str) -> LoadError {
        LoadError::Corrupt {
            model: model.to_string(),
            location: self.location.to_string(),
            reason: self.reason,
        }
    }
}

fn field<'d>(doc: &'d Document, at: &Location, name: &'static str) -> Result<&'d Document, Fault> {
    doc.get(name)
        .ok_or_else(|| Fault::new(at, Corruption::MissingField { field: name }))
}

fn wrong_type(at: &Location, expected: &'static str, doc: &Document) -> Fault {
    Fault::new(
        at,
        Corruption::WrongType {
            expected,
            found: doc.kind(),
        },
    )
}

fn expect_str<'d>(doc: &'d Document, at: &Location) -> Result<&'d str, Fault> {
    doc.as_str().ok_or_else(|| wrong_type(at, "string", doc))
}

fn expect_number(doc: &Document, at: &Location) -> Result<f64, Fault> {
    doc.as_f64().ok_or_else(|| wrong_type(at, "number", doc))
}

fn expect_list<'d>(doc: &'d Document, at: &Location) -> Result<&'d [Document], Fault> {
    doc.as_list().ok_or_else(|| wrong_type(at, "list", doc))
}

/// 2^63: integral labels must lie in `[-2^63, 2^63)` so the `i64` cast is exact.
const INTEGER_LABEL_LIMIT: f64 = 9_223_372_036_854_775_808.0;

fn label(doc: &Document, at: &Location) -> Result<String, Fault> {
    match doc {
        Document::String(s) => Ok(s.clone()),
        Document::Number(n)
            if n.fract() == 0.0 && (-INTEGER_LABEL_LIMIT..INTEGER_LABEL_LIMIT).contains(n) =>
        {
            Ok(format!("{}", *n as i64))
        }
        Document::Number(n) => Err(Fault::new(at, Corruption::InvalidLabel { value: *n })),
        other => Err(wrong_type(at, "string or integer", other)),
    }
}

fn probability(doc: &Document, at: &Location, label: &str) -> Result<f64, Fault> {
    let value = expect_number(doc, at)?;
    if !value.is_finite() || value < 0.0 {
        return Err(Fault::new(
            at,
            Corruption::InvalidProbability {
                label: label.to_string(),
                value,
            },
        ));
    }
    Ok(value)
}

/// Align a leaf distribution with `classes` and check it is a probability vector.
fn leaf_distribution(
    doc: &Document,
    at: &Location,
    classes: &ClassLabelList,
) -> Result<Vec<f64>, Fault> {
    let probs = match doc {
        Document::Map(entries) => {
            let mut slots: Vec<Option<f64>> = vec![None; classes.len()];
            for (key, value) in entries {
                let entry_at = at.key(key);
                let Some(index) = classes.position(key) else {
                    return Err(Fault::new(
                        &entry_at,
                        Corruption::UnknownLabel { label: key.clone() },
                    ));
                };
                if slots[index].is_some() {
                    return Err(Fault::new(
                        &entry_at,
                        Corruption::RepeatedLabel { label: key.clone() },
                    ));
                }
                slots[index] = Some(probability(value, &entry_at, key)?);
            }
            slots
                .into_iter()
                .zip(classes.iter())
                .map(|(slot, label)| {
                    slot.ok_or_else(|| {
                        Fault::new(
                            at,
                            Corruption::MissingLabel {
                                label: label.to_string(),
                            },
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        Document::List(items) => {
            if items.len() != classes.len() {
                return Err(Fault::new(
                    at,
                    Corruption::DistributionLength {
                        expected: classes.len(),
                        got: items.len(),
                    },
                ));
            }
            items
                .iter()
                .zip(classes.iter())
                .enumerate()
                .map(|(i, (item, label))| probability(item, &at.index(i), label.as_str()))
                .collect::<Result<Vec<_>, _>>()?
        }
        other => return Err(wrong_type(at, "map or list", other)),
    };

    let sum: f64 = probs.iter().sum();
    if (sum - 1.0).abs() > DISTRIBUTION_TOLERANCE {
        return Err(Fault::new(at, Corruption::DistributionSum { sum }));
    }
    Ok(probs)
}

/// Converts model documents into validated forests.
///
/// Every check runs before a forest is assembled; on failure the error names
/// the model and the path to the offending value.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | max_depth | [`MAX_TREE_DEPTH`] |
#[derive(Debug, Clone, Copy)]
pub struct ModelLoader {
    max_depth: usize,
}

impl ModelLoader {
    /// Create a loader with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: MAX_TREE_DEPTH,
        }
    }

    /// Limit the number of split levels accepted per tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Load a forest from `document`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Corrupt`] for the first schema or invariant
    /// violation found. See [`Corruption`] for the possible reasons.
    #[instrument(skip_all)]
    pub fn load(&self, document: &Document) -> Result<RandomForest, LoadError> {
        let root = Location::default();
        if document.as_map().is_none() {
            return Err(wrong_type(&root, "map", document).into_error(UNNAMED));
        }
        let name = field(document, &root, "name")
            .and_then(|doc| expect_str(doc, &root.key("name")))
            .map_err(|fault| fault.into_error(UNNAMED))?;

        let forest = self
            .forest(document, name)
            .map_err(|fault| fault.into_error(name))?;
        info!(
            model = forest.name(),
            n_trees = forest.n_trees(),
            n_classes = forest.n_classes(),
            n_features = forest.feature_names().len(),
            "model loaded"
        );
        Ok(forest)
    }

    fn forest(&self, document: &Document, name: &str) -> Result<RandomForest, Fault> {
        let root = Location::default();

        let classes_at = root.key("classes");
        let items = expect_list(field(document, &root, "classes")?, &classes_at)?;
        if items.is_empty() {
            return Err(Fault::new(&classes_at, Corruption::NoClasses));
        }
        let mut labels: Vec<String> = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let at = classes_at.index(i);
            let label = label(item, &at)?;
            if labels.contains(&label) {
                return Err(Fault::new(&at, Corruption::DuplicateClass { label }));
            }
            labels.push(label);
        }
        let classes = ClassLabelList::new(labels)
            .map_err(|source| Fault::new(&classes_at, Corruption::Rejected { source }))?;

        let trees_at = root.key("trees");
        let items = expect_list(field(document, &root, "trees")?, &trees_at)?;
        if items.is_empty() {
            return Err(Fault::new(&trees_at, Corruption::NoTrees));
        }
        let trees = items
            .iter()
            .enumerate()
            .map(|(i, item)| self.tree(item, &trees_at.index(i), &classes))
            .collect::<Result<Vec<_>, _>>()?;

        RandomForestBuilder::new(name)
            .with_labels(classes)
            .with_trees(trees)
            .build()
            .map_err(|source| Fault::new(&root, Corruption::Rejected { source }))
    }

    fn tree(
        &self,
        doc: &Document,
        at: &Location,
        classes: &ClassLabelList,
    ) -> Result<DecisionTree, Fault> {
        let mut builder = DecisionTreeBuilder::for_labels(classes.clone());
        if let Some(name) = doc.get("name") {
            builder = builder.with_name(expect_str(name, &at.key("name"))?);
        }
        let root = self.node(doc, at, 0, classes, &mut builder)?;
        let tree = builder
            .build(root)
            .map_err(|source| Fault::new(at, Corruption::Rejected { source }))?;
        debug!(location = %at, n_nodes = tree.n_nodes(), depth = tree.depth(), "tree loaded");
        Ok(tree)
    }

    fn node(
        &self,
        doc: &Document,
        at: &Location,
        depth: usize,
        classes: &ClassLabelList,
        builder: &mut DecisionTreeBuilder,
    ) -> Result<NodeIndex, Fault> {
        if doc.as_map().is_none() {
            return Err(wrong_type(at, "map", doc));
        }
        match (doc.get("feature"), doc.get("distribution")) {
            (Some(_), Some(_)) => Err(Fault::new(at, Corruption::AmbiguousNode)),
            (None, None) => Err(Fault::new(at, Corruption::UnknownNode)),
            (None, Some(distribution)) => {
                let probs = leaf_distribution(distribution, &at.key("distribution"), classes)?;
                builder
                    .leaf(probs)
                    .map_err(|source| Fault::new(at, Corruption::Rejected { source }))
            }
            (Some(feature), None) => {
                if depth >= self.max_depth {
                    return Err(Fault::new(
                        at,
                        Corruption::TooDeep {
                            limit: self.max_depth,
                        },
                    ));
                }
                let feature = expect_str(feature, &at.key("feature"))?;
                if feature.is_empty() {
                    return Err(Fault::new(&at.key("feature"), Corruption::EmptyFeature));
                }
                let threshold_at = at.key("threshold");
                let threshold = expect_number(field(doc, at, "threshold")?, &threshold_at)?;
                if !threshold.is_finite() {
                    return Err(Fault::new(
                        &threshold_at,
                        Corruption::NonFiniteThreshold { threshold },
                    ));
                }
                let left = self.node(
                    field(doc, at, "left")?,
                    &at.key("left"),
                    depth + 1,
                    classes,
                    builder,
                )?;
                let right = self.node(
                    field(doc, at, "right")?,
                    &at.key("right"),
                    depth + 1,
                    classes,
                    builder,
                )?;
                builder
                    .split(feature, threshold, left, right)
                    .map_err(|source| Fault::new(at, Corruption::Rejected { source }))
            }
        }
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a JSON model file and load it with default limits.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`LoadError::Read`] | the file cannot be read |
/// | [`LoadError::Parse`] | the file is not valid JSON |
/// | [`LoadError::Corrupt`] | the document is not a valid model |
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_model_file(path: impl AsRef<Path>) -> Result<RandomForest, LoadError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    ModelLoader::new().load(&Document::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use sprig_rf::FeatureVector;

    fn load(value: Value) -> Result<RandomForest, LoadError> {
        ModelLoader::new().load(&Document::from(value))
    }

    fn corruption(value: Value) -> (String, Corruption) {
        match load(value) {
            Err(LoadError::Corrupt {
                location, reason, ..
            }) => (location, reason),
            other => panic!("expected corrupt model, got {other:?}"),
        }
    }

    fn stump(threshold: Value) -> Value {
        json!({
            "feature": "x",
            "threshold": threshold,
            "left": { "distribution": { "A": 1.0, "B": 0.0 } },
            "right": { "distribution": { "A": 0.0, "B": 1.0 } }
        })
    }

    fn model(trees: Value) -> Value {
        json!({ "name": "m", "classes": ["A", "B"], "trees": trees })
    }

    #[test]
    fn loads_single_split_model() {
        let forest = load(model(json!([stump(json!(0.5))]))).unwrap();
        assert_eq!(forest.name(), "m");
        assert_eq!(forest.n_trees(), 1);
        assert_eq!(forest.labels().to_strings(), vec!["A", "B"]);

        let at = |x: f64| forest.predict(&FeatureVector::new().with("x", x)).to_string();
        assert_eq!(at(0.3), "A");
        assert_eq!(at(0.5), "A");
        assert_eq!(at(0.7), "B");
        assert_eq!(at(f64::NAN), "B");
    }

    #[test]
    fn object_distribution_is_aligned_by_label() {
        let doc = model(json!([{ "distribution": { "B": 0.25, "A": 0.75 } }]));
        let forest = load(doc).unwrap();
        assert_eq!(
            forest.predict_proba(&FeatureVector::new()).as_slice(),
            &[0.75, 0.25]
        );
    }

    #[test]
    fn list_distribution_is_positional() {
        let doc = model(json!([{ "distribution": [0.75, 0.25] }]));
        let forest = load(doc).unwrap();
        assert_eq!(
            forest.predict_proba(&FeatureVector::new()).as_slice(),
            &[0.75, 0.25]
        );
    }

    #[test]
    fn integer_labels_are_accepted() {
        let doc = json!({
            "name": "ints",
            "classes": [0, 1],
            "trees": [{ "distribution": { "0": 0.4, "1": 0.6 } }]
        });
        let forest = load(doc).unwrap();
        assert_eq!(forest.labels().to_strings(), vec!["0", "1"]);
        assert_eq!(forest.predict(&FeatureVector::new()).as_str(), "1");
    }

    #[test]
    fn tree_name_is_kept() {
        let mut tree = stump(json!(0.5));
        tree["name"] = json!("first");
        let forest = load(model(json!([tree]))).unwrap();
        assert_eq!(forest.trees()[0].name(), Some("first"));
    }

    #[test]
    fn distribution_not_summing_to_one_is_corrupt() {
        let doc = model(json!([{ "distribution": { "A": 0.2, "B": 0.2 } }]));
        let (location, reason) = corruption(doc);
        assert_eq!(location, "trees[0].distribution");
        assert!(matches!(reason, Corruption::DistributionSum { sum } if (sum - 0.4).abs() < 1e-12));
    }

    #[test]
    fn location_names_nested_node() {
        let mut tree = stump(json!(0.5));
        tree["right"] = stump(json!(0.1));
        tree["right"]["left"] = json!({ "distribution": { "A": 1.5, "B": -0.5 } });
        let (location, reason) = corruption(model(json!([stump(json!(0.2)), tree])));
        assert_eq!(location, "trees[1].right.left.distribution.B");
        assert!(matches!(reason, Corruption::InvalidProbability { .. }));
    }

    #[test]
    fn label_set_must_match_classes() {
        let (_, reason) = corruption(model(json!([{ "distribution": { "A": 1.0 } }])));
        assert!(matches!(reason, Corruption::MissingLabel { ref label } if label == "B"));

        let (location, reason) =
            corruption(model(json!([{ "distribution": { "A": 0.5, "C": 0.5 } }])));
        assert_eq!(location, "trees[0].distribution.C");
        assert!(matches!(reason, Corruption::UnknownLabel { .. }));

        let (_, reason) = corruption(model(json!([{ "distribution": [1.0] }])));
        assert!(matches!(
            reason,
            Corruption::DistributionLength {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn threshold_must_be_a_number() {
        let (location, reason) = corruption(model(json!([stump(json!("0.5"))])));
        assert_eq!(location, "trees[0].threshold");
        assert!(matches!(
            reason,
            Corruption::WrongType {
                expected: "number",
                found: "string"
            }
        ));
    }

    #[test]
    fn non_finite_threshold_is_corrupt() {
        let doc = Document::Map(vec![
            ("name".into(), Document::String("m".into())),
            (
                "classes".into(),
                Document::List(vec![Document::String("A".into())]),
            ),
            (
                "trees".into(),
                Document::List(vec![Document::Map(vec![
                    ("feature".into(), Document::String("x".into())),
                    ("threshold".into(), Document::Number(f64::INFINITY)),
                    (
                        "left".into(),
                        Document::Map(vec![(
                            "distribution".into(),
                            Document::List(vec![Document::Number(1.0)]),
                        )]),
                    ),
                    (
                        "right".into(),
                        Document::Map(vec![(
                            "distribution".into(),
                            Document::List(vec![Document::Number(1.0)]),
                        )]),
                    ),
                ])]),
            ),
        ]);
        let err = ModelLoader::new().load(&doc).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Corrupt {
                reason: Corruption::NonFiniteThreshold { .. },
                ..
            }
        ));
    }

    #[test]
    fn missing_fields_are_reported() {
        let (location, reason) = corruption(json!({ "name": "m", "classes": ["A"] }));
        assert_eq!(location, "<root>");
        assert!(matches!(reason, Corruption::MissingField { field: "trees" }));

        let mut tree = stump(json!(0.5));
        tree.as_object_mut().unwrap().remove("left");
        let (location, reason) = corruption(model(json!([tree])));
        assert_eq!(location, "trees[0]");
        assert!(matches!(reason, Corruption::MissingField { field: "left" }));

        match load(json!({ "classes": ["A"], "trees": [] })) {
            Err(LoadError::Corrupt { model, reason, .. }) => {
                assert_eq!(model, UNNAMED);
                assert!(matches!(reason, Corruption::MissingField { field: "name" }));
            }
            other => panic!("expected corrupt model, got {other:?}"),
        }
    }

    #[test]
    fn empty_collections_are_corrupt() {
        let (_, reason) = corruption(model(json!([])));
        assert!(matches!(reason, Corruption::NoTrees));

        let (_, reason) = corruption(json!({ "name": "m", "classes": [], "trees": [] }));
        assert!(matches!(reason, Corruption::NoClasses));
    }

    #[test]
    fn duplicate_classes_are_corrupt() {
        let (location, reason) = corruption(json!({
            "name": "m",
            "classes": ["A", "A"],
            "trees": [{ "distribution": [0.5, 0.5] }]
        }));
        assert_eq!(location, "classes[1]");
        assert!(matches!(reason, Corruption::DuplicateClass { .. }));
    }

    #[test]
    fn node_kind_must_be_unambiguous() {
        let mut tree = stump(json!(0.5));
        tree["distribution"] = json!([1.0, 0.0]);
        let (_, reason) = corruption(model(json!([tree])));
        assert!(matches!(reason, Corruption::AmbiguousNode));

        let (_, reason) = corruption(model(json!([{ "name": "bare" }])));
        assert!(matches!(reason, Corruption::UnknownNode));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut tree = json!({ "distribution": [1.0, 0.0] });
        for _ in 0..3 {
            tree = json!({
                "feature": "x",
                "threshold": 0.0,
                "left": tree,
                "right": { "distribution": [0.0, 1.0] }
            });
        }
        let doc = Document::from(model(json!([tree])));

        assert!(ModelLoader::new().with_max_depth(3).load(&doc).is_ok());
        let err = ModelLoader::new().with_max_depth(2).load(&doc).unwrap_err();
        match err {
            LoadError::Corrupt {
                location, reason, ..
            } => {
                assert_eq!(location, "trees[0].left.left");
                assert!(matches!(reason, Corruption::TooDeep { limit: 2 }));
            }
            other => panic!("expected corrupt model, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_integer_label_is_corrupt() {
        let (location, reason) = corruption(json!({
            "name": "m",
            "classes": [1e20, 2e20],
            "trees": [{ "distribution": [0.5, 0.5] }]
        }));
        assert_eq!(location, "classes[0]");
        assert!(matches!(reason, Corruption::InvalidLabel { value } if value == 1e20));
    }

    #[test]
    fn large_integer_labels_stay_distinct() {
        let doc = json!({
            "name": "big",
            "classes": [4_000_000_000_000_000_000i64, -4_000_000_000_000_000_000i64],
            "trees": [{ "distribution": [0.25, 0.75] }]
        });
        let forest = load(doc).unwrap();
        assert_eq!(
            forest.labels().to_strings(),
            vec!["4000000000000000000", "-4000000000000000000"]
        );
    }

    #[test]
    fn fractional_label_is_corrupt() {
        let (location, reason) = corruption(json!({
            "name": "m",
            "classes": [0.5],
            "trees": [{ "distribution": [1.0] }]
        }));
        assert_eq!(location, "classes[0]");
        assert!(matches!(reason, Corruption::InvalidLabel { .. }));
    }
}
