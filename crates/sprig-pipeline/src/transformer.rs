use std::collections::BTreeSet;
use std::fmt;

use sprig_rf::FeatureVector;

use crate::TransformError;

/// A pure, immutable stage applied to a [`FeatureVector`] before classification.
///
/// A transform may fill in or overwrite the entries named by
/// [`used_feature_names`](Transformer::used_feature_names); it never removes
/// or renames entries.
pub trait Transformer: fmt::Debug + Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Feature names this stage reads or writes.
    fn used_feature_names(&self) -> BTreeSet<&str>;

    /// Apply the stage to `vector`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransformError`] when the vector is structurally unusable
    /// for this stage. Missing (`NaN`) values are never an error.
    fn transform(&self, vector: FeatureVector) -> Result<FeatureVector, TransformError>;
}
