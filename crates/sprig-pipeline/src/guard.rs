use std::collections::BTreeSet;

use sprig_rf::FeatureVector;

use crate::TransformError;
use crate::transformer::Transformer;

/// Fails when a vector does not carry a required feature at all.
///
/// A feature holding the missing sentinel is still carried and passes; the
/// guard only catches upstream stages that never produced the feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFeatures {
    names: BTreeSet<String>,
}

impl RequiredFeatures {
    /// Require every name in `names`.
    pub fn new<I, K>(names: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transformer for RequiredFeatures {
    fn name(&self) -> &str {
        "required-features"
    }

    fn used_feature_names(&self) -> BTreeSet<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    fn transform(&self, vector: FeatureVector) -> Result<FeatureVector, TransformError> {
        match self.names.iter().find(|name| !vector.contains(name)) {
            Some(feature) => Err(TransformError::MissingFeature {
                stage: self.name().to_string(),
                feature: feature.clone(),
            }),
            None => Ok(vector),
        }
    }
}
