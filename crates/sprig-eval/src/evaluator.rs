//! Evaluator façade: one shared pipeline, several classifier versions.

use std::collections::BTreeMap;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use sprig_pipeline::Pipeline;
use sprig_rf::{FeatureVector, RandomForest};
use tracing::{debug, info, instrument, warn};

use crate::error::EvalError;
use crate::prediction::Prediction;
use crate::version::{ClassifierVersion, PathogenicityRule, VersionId};

/// Per-version outcome of one [`Evaluator::evaluate`] call.
pub type Evaluation = BTreeMap<VersionId, Result<Prediction, EvalError>>;

/// Builder for an [`Evaluator`].
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | pipeline | empty (identity) |
/// | strict features | `false` |
#[derive(Debug)]
pub struct EvaluatorBuilder {
    pipeline: Pipeline,
    versions: Vec<(VersionId, RandomForest, PathogenicityRule)>,
    strict_features: bool,
}

impl EvaluatorBuilder {
    /// Create a builder with an empty pipeline and no versions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipeline: Pipeline::new(),
            versions: Vec::new(),
            strict_features: false,
        }
    }

    /// Set the pipeline shared by every version.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Register a classifier version.
    #[must_use]
    pub fn with_version(
        mut self,
        id: impl Into<VersionId>,
        forest: RandomForest,
        rule: PathogenicityRule,
    ) -> Self {
        self.versions.push((id.into(), forest, rule));
        self
    }

    /// Whether a version fails when its forest splits on a feature absent
    /// from the transformed vector.
    ///
    /// Off by default: absent features follow the trees' missing-value rule
    /// and route right.
    #[must_use]
    pub fn with_strict_features(mut self, strict: bool) -> Self {
        self.strict_features = strict;
        self
    }

    /// Resolve every version's rule and build the evaluator.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`EvalError::NoVersions`] | no version was registered |
    /// | [`EvalError::DuplicateVersion`] | two versions share an id |
    /// | [`EvalError::EmptyRule`] | a rule names no labels |
    /// | [`EvalError::UnknownLabel`] | a rule names a label the forest lacks |
    pub fn build(self) -> Result<Evaluator, EvalError> {
        if self.versions.is_empty() {
            return Err(EvalError::NoVersions);
        }
        let mut versions = BTreeMap::new();
        for (id, forest, rule) in self.versions {
            if versions.contains_key(&id) {
                return Err(EvalError::DuplicateVersion { version: id });
            }
            let version = ClassifierVersion::new(id.clone(), forest, &rule, self.strict_features)?;
            versions.insert(id, version);
        }
        debug!(
            n_versions = versions.len(),
            n_stages = self.pipeline.len(),
            "evaluator built"
        );
        Ok(Evaluator {
            pipeline: self.pipeline,
            versions,
        })
    }
}

impl Default for EvaluatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Scores feature vectors with every registered classifier version.
///
/// Immutable after construction and safe to share across threads.
#[derive(Debug)]
pub struct Evaluator {
    pipeline: Pipeline,
    versions: BTreeMap<VersionId, ClassifierVersion>,
}

impl Evaluator {
    /// Start building an evaluator.
    #[must_use]
    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::new()
    }

    /// Score one vector with every version.
    ///
    /// The pipeline runs once; each version then scores the transformed
    /// vector independently. A pipeline failure is reported for every
    /// version, and a failing version never hides another version's result.
    pub fn evaluate(&self, vector: impl Into<FeatureVector>) -> Evaluation {
        match self.pipeline.transform(vector.into()) {
            Ok(transformed) => self
                .versions
                .iter()
                .map(|(id, version)| {
                    let outcome = version.score(&transformed);
                    if let Err(e) = &outcome {
                        debug!(version = %id, error = %e, "version failed");
                    }
                    (id.clone(), outcome)
                })
                .collect(),
            Err(e) => {
                debug!(error = %e, "feature pipeline failed");
                self.versions
                    .keys()
                    .map(|id| (id.clone(), Err(EvalError::Transform(e.clone()))))
                    .collect()
            }
        }
    }

    /// Score many vectors in parallel, preserving input order.
    #[instrument(skip_all, fields(n_vectors = vectors.len(), n_versions = self.versions.len()))]
    pub fn evaluate_batch(&self, vectors: Vec<FeatureVector>) -> Vec<Evaluation> {
        let evaluations: Vec<Evaluation> = vectors
            .into_par_iter()
            .map(|vector| self.evaluate(vector))
            .collect();

        let n_failed = evaluations
            .iter()
            .flat_map(|e| e.values())
            .filter(|outcome| outcome.is_err())
            .count();
        if n_failed > 0 {
            warn!(n_failed, "some version evaluations failed");
        }
        info!(n_evaluated = evaluations.len(), "batch evaluated");

        evaluations
    }

    /// Return the shared pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Iterate over registered versions in identifier order.
    pub fn versions(&self) -> impl Iterator<Item = &ClassifierVersion> {
        self.versions.values()
    }

    /// Return the version registered under `id`.
    #[must_use]
    pub fn version(&self, id: &str) -> Option<&ClassifierVersion> {
        self.versions.get(id)
    }
}

#[cfg(test)]
mod tests {
    use sprig_pipeline::{Imputer, RequiredFeatures};
    use sprig_rf::{ClassLabelList, DecisionTreeBuilder, RandomForestBuilder};

    use super::*;

    fn stump_forest(feature: &str, threshold: f64) -> RandomForest {
        let mut builder = DecisionTreeBuilder::new(2);
        let left = builder.leaf(vec![0.9, 0.1]).unwrap();
        let right = builder.leaf(vec![0.2, 0.8]).unwrap();
        let root = builder.split(feature, threshold, left, right).unwrap();
        RandomForestBuilder::new(feature)
            .with_labels(ClassLabelList::new(["0", "1"]).unwrap())
            .with_tree(builder.build(root).unwrap())
            .build()
            .unwrap()
    }

    fn pathogenic() -> PathogenicityRule {
        PathogenicityRule::Label("1".to_string())
    }

    #[test]
    fn every_version_is_scored() {
        let evaluator = Evaluator::builder()
            .with_version("a", stump_forest("x", 0.5), pathogenic())
            .with_version("b", stump_forest("x", 0.1), pathogenic())
            .build()
            .unwrap();

        let result = evaluator.evaluate(FeatureVector::new().with("x", 0.3));
        assert_eq!(result.len(), 2);
        let a = result["a"].as_ref().unwrap();
        let b = result["b"].as_ref().unwrap();
        assert!((a.pathogenicity() - 0.1).abs() < 1e-12);
        assert!((b.pathogenicity() - 0.8).abs() < 1e-12);
        assert_eq!(a.predicted_label().as_str(), "0");
        assert_eq!(b.predicted_label().as_str(), "1");
    }

    #[test]
    fn shared_pipeline_runs_before_forests() {
        let evaluator = Evaluator::builder()
            .with_pipeline(Pipeline::new().with_stage(Imputer::new([("x", 0.0)]).unwrap()))
            .with_version("a", stump_forest("x", 0.5), pathogenic())
            .build()
            .unwrap();
        let result = evaluator.evaluate(FeatureVector::new().with_missing("x"));
        let a = result["a"].as_ref().unwrap();
        assert_eq!(a.distribution().as_slice(), &[0.9, 0.1]);
    }

    #[test]
    fn failing_version_does_not_hide_others() {
        let evaluator = Evaluator::builder()
            .with_version("needs_x", stump_forest("x", 0.5), pathogenic())
            .with_version("needs_y", stump_forest("y", 0.5), pathogenic())
            .with_strict_features(true)
            .build()
            .unwrap();

        let result = evaluator.evaluate(FeatureVector::new().with("x", 0.7));
        assert!(result["needs_x"].is_ok());
        assert!(matches!(
            result["needs_y"],
            Err(EvalError::FeatureNotSupplied { ref feature, .. }) if feature == "y"
        ));
    }

    #[test]
    fn absent_feature_routes_right_by_default() {
        let forest = stump_forest("y", 0.5);
        let direct = forest.predict_proba(&FeatureVector::new());
        let direct_label = forest.predict(&FeatureVector::new()).clone();
        let evaluator = Evaluator::builder()
            .with_version("needs_y", forest, pathogenic())
            .build()
            .unwrap();

        let result = evaluator.evaluate(FeatureVector::new());
        let p = result["needs_y"].as_ref().unwrap();
        assert_eq!(p.distribution().as_slice(), direct.as_slice());
        assert_eq!(p.distribution().as_slice(), &[0.2, 0.8]);
        assert_eq!(p.predicted_label(), &direct_label);
    }

    #[test]
    fn pipeline_failure_is_reported_per_version() {
        let evaluator = Evaluator::builder()
            .with_pipeline(Pipeline::new().with_stage(RequiredFeatures::new(["x"])))
            .with_version("a", stump_forest("x", 0.5), pathogenic())
            .with_version("b", stump_forest("x", 0.5), pathogenic())
            .build()
            .unwrap();
        let result = evaluator.evaluate(FeatureVector::new());
        assert_eq!(result.len(), 2);
        assert!(result.values().all(|r| matches!(r, Err(EvalError::Transform(_)))));
    }

    #[test]
    fn max_of_rule_takes_largest_probability() {
        let evaluator = Evaluator::builder()
            .with_version(
                "a",
                stump_forest("x", 0.5),
                PathogenicityRule::MaxOf(vec!["0".to_string(), "1".to_string()]),
            )
            .build()
            .unwrap();
        let result = evaluator.evaluate(FeatureVector::new().with("x", 0.9));
        assert!((result["a"].as_ref().unwrap().pathogenicity() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn unknown_rule_label_rejected() {
        let err = Evaluator::builder()
            .with_version("a", stump_forest("x", 0.5), PathogenicityRule::Label("2".into()))
            .build()
            .unwrap_err();
        assert!(matches!(err, EvalError::UnknownLabel { ref label, .. } if label == "2"));
    }

    #[test]
    fn empty_rule_rejected() {
        let err = Evaluator::builder()
            .with_version("a", stump_forest("x", 0.5), PathogenicityRule::MaxOf(Vec::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, EvalError::EmptyRule { .. }));
    }

    #[test]
    fn duplicate_version_rejected() {
        let err = Evaluator::builder()
            .with_version("a", stump_forest("x", 0.5), pathogenic())
            .with_version("a", stump_forest("x", 0.6), pathogenic())
            .build()
            .unwrap_err();
        assert!(matches!(err, EvalError::DuplicateVersion { .. }));
    }

    #[test]
    fn no_versions_rejected() {
        assert!(matches!(
            Evaluator::builder().build().unwrap_err(),
            EvalError::NoVersions
        ));
    }
}
