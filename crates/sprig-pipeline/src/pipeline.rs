use std::collections::BTreeSet;

use sprig_rf::FeatureVector;
use tracing::trace;

use crate::TransformError;
use crate::transformer::Transformer;

/// An ordered sequence of [`Transformer`] stages.
///
/// Stages run strictly in insertion order and each one sees the output of
/// all earlier stages. An empty pipeline returns its input unchanged.
#[derive(Debug, Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Transformer>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Transformer + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append an already boxed stage.
    #[must_use]
    pub fn with_boxed_stage(mut self, stage: Box<dyn Transformer>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Return the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Return `true` if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Iterate over the stages in order.
    pub fn stages(&self) -> impl Iterator<Item = &dyn Transformer> {
        self.stages.iter().map(|s| s.as_ref())
    }

    /// Union of every stage's used feature names.
    #[must_use]
    pub fn used_feature_names(&self) -> BTreeSet<&str> {
        self.stages
            .iter()
            .flat_map(|s| s.used_feature_names())
            .collect()
    }

    /// Run every stage in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`TransformError`] raised by a stage; later stages
    /// do not run.
    pub fn transform(&self, vector: FeatureVector) -> Result<FeatureVector, TransformError> {
        self.stages.iter().try_fold(vector, |vector, stage| {
            trace!(stage = stage.name(), "applying stage");
            stage.transform(vector)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Imputer, RequiredFeatures};

    #[test]
    fn empty_pipeline_is_identity() {
        let v = FeatureVector::new().with("x", 1.0).with_missing("y");
        let out = Pipeline::new().transform(v.clone()).unwrap();
        assert_eq!(out.get("x"), Some(1.0));
        assert!(out.is_missing("y"));
        assert_eq!(out.len(), v.len());
    }

    #[test]
    fn later_stage_sees_earlier_output() {
        // The second imputer never fires for `x` because the first already filled it.
        let pipeline = Pipeline::new()
            .with_stage(Imputer::new([("x", 1.0)]).unwrap())
            .with_stage(Imputer::new([("x", 2.0), ("y", 3.0)]).unwrap());
        let v = FeatureVector::new().with_missing("x").with_missing("y");
        let out = pipeline.transform(v).unwrap();
        assert_eq!(out.get("x"), Some(1.0));
        assert_eq!(out.get("y"), Some(3.0));
    }

    #[test]
    fn failing_stage_stops_pipeline() {
        let pipeline = Pipeline::new()
            .with_stage(RequiredFeatures::new(["x"]))
            .with_stage(Imputer::new([("y", 0.0)]).unwrap());
        let err = pipeline
            .transform(FeatureVector::new().with_missing("y"))
            .unwrap_err();
        assert!(matches!(err, TransformError::MissingFeature { ref feature, .. } if feature == "x"));
    }

    #[test]
    fn used_feature_names_is_union() {
        let pipeline = Pipeline::new()
            .with_stage(RequiredFeatures::new(["a", "b"]))
            .with_stage(Imputer::new([("b", 0.0), ("c", 0.0)]).unwrap());
        let names: Vec<&str> = pipeline.used_feature_names().into_iter().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(pipeline.len(), 2);
        let stage_names: Vec<&str> = pipeline.stages().map(|s| s.name()).collect();
        assert_eq!(stage_names, vec!["required-features", "imputer"]);
    }
}
