use std::fmt;
use std::sync::Arc;

use sprig_rf::{ClassLabelList, FeatureVector, RandomForest};

use crate::error::EvalError;
use crate::prediction::Prediction;

/// Identifier of a classifier version, e.g. `"v0.4.6"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionId(String);

impl VersionId {
    /// Create a version identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VersionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::borrow::Borrow<str> for VersionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// How a version derives its scalar pathogenicity from a class distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathogenicityRule {
    /// Probability of a single label.
    Label(String),
    /// Maximum probability over several labels.
    MaxOf(Vec<String>),
}

impl PathogenicityRule {
    fn labels(&self) -> Vec<&str> {
        match self {
            PathogenicityRule::Label(label) => vec![label.as_str()],
            PathogenicityRule::MaxOf(labels) => labels.iter().map(String::as_str).collect(),
        }
    }

    /// Resolve the rule's labels to positions in `labels`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`EvalError::EmptyRule`] | the rule names no labels |
    /// | [`EvalError::UnknownLabel`] | a named label is not in `labels` |
    pub fn resolve(
        &self,
        version: &VersionId,
        labels: &ClassLabelList,
    ) -> Result<Vec<usize>, EvalError> {
        let names = self.labels();
        if names.is_empty() {
            return Err(EvalError::EmptyRule {
                version: version.clone(),
            });
        }
        names
            .into_iter()
            .map(|name| {
                labels.position(name).ok_or_else(|| EvalError::UnknownLabel {
                    version: version.clone(),
                    label: name.to_string(),
                })
            })
            .collect()
    }
}

/// A registered classifier: one forest plus its resolved pathogenicity rule.
#[derive(Debug)]
pub struct ClassifierVersion {
    id: VersionId,
    forest: RandomForest,
    labels: Arc<ClassLabelList>,
    pathogenic: Vec<usize>,
    strict_features: bool,
}

impl ClassifierVersion {
    /// Resolve `rule` against the forest's labels.
    pub(crate) fn new(
        id: VersionId,
        forest: RandomForest,
        rule: &PathogenicityRule,
        strict_features: bool,
    ) -> Result<Self, EvalError> {
        let pathogenic = rule.resolve(&id, forest.labels())?;
        let labels = Arc::new(forest.labels().clone());
        Ok(Self {
            id,
            forest,
            labels,
            pathogenic,
            strict_features,
        })
    }

    /// Return the version identifier.
    #[must_use]
    pub fn id(&self) -> &VersionId {
        &self.id
    }

    /// Return the forest backing this version.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Return the labels whose probabilities feed the pathogenicity score.
    pub fn pathogenic_labels(&self) -> impl Iterator<Item = &str> {
        self.pathogenic
            .iter()
            .filter_map(|&i| self.labels.get(i).map(|l| l.as_str()))
    }

    /// Score an already transformed vector.
    pub(crate) fn score(&self, vector: &FeatureVector) -> Result<Prediction, EvalError> {
        if self.strict_features
            && let Some(feature) = self
                .forest
                .feature_names()
                .iter()
                .find(|name| !vector.contains(name))
        {
            return Err(EvalError::FeatureNotSupplied {
                version: self.id.clone(),
                feature: feature.clone(),
            });
        }

        let distribution = self.forest.predict_proba(vector);
        let pathogenicity = self
            .pathogenic
            .iter()
            .filter_map(|&i| distribution.probability(i))
            .fold(0.0f64, f64::max);

        Ok(Prediction::new(
            Arc::clone(&self.labels),
            distribution,
            pathogenicity,
        ))
    }
}
