use std::collections::{BTreeMap, BTreeSet};

use sprig_rf::FeatureVector;
use tracing::trace;

use crate::TransformError;
use crate::transformer::Transformer;

/// Replaces missing values of configured features with fixed defaults.
///
/// Only features present in the vector and holding the missing sentinel are
/// replaced. Absent features are not added, and features without a
/// configured default keep their missing sentinel for the trees to handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Imputer {
    defaults: BTreeMap<String, f64>,
}

impl Imputer {
    /// Create an imputer from `(feature, default)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::NonFiniteDefault`] if any default is NaN or infinite.
    pub fn new<I, K>(defaults: I) -> Result<Self, TransformError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let defaults: BTreeMap<String, f64> =
            defaults.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if let Some((feature, &value)) = defaults.iter().find(|(_, v)| !v.is_finite()) {
            return Err(TransformError::NonFiniteDefault {
                feature: feature.clone(),
                value,
            });
        }
        Ok(Self { defaults })
    }

    /// Return the configured default for `feature`.
    #[must_use]
    pub fn default_for(&self, feature: &str) -> Option<f64> {
        self.defaults.get(feature).copied()
    }

    /// Return the number of configured features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defaults.len()
    }

    /// Return `true` if no feature is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }
}

impl Transformer for Imputer {
    fn name(&self) -> &str {
        "imputer"
    }

    fn used_feature_names(&self) -> BTreeSet<&str> {
        self.defaults.keys().map(String::as_str).collect()
    }

    fn transform(&self, mut vector: FeatureVector) -> Result<FeatureVector, TransformError> {
        let mut filled = 0usize;
        for (feature, &default) in &self.defaults {
            if let Some(value) = vector.get_mut(feature)
                && value.is_nan()
            {
                *value = default;
                filled += 1;
            }
        }
        trace!(filled, "imputed missing values");
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imputer() -> Imputer {
        Imputer::new([("phylop", 0.12), ("donor_ic", -1.5)]).unwrap()
    }

    #[test]
    fn configured_missing_value_is_filled() {
        let v = FeatureVector::new()
            .with_missing("phylop")
            .with("donor_ic", 3.0);
        let out = imputer().transform(v).unwrap();
        assert_eq!(out.get("phylop"), Some(0.12));
        assert_eq!(out.get("donor_ic"), Some(3.0));
    }

    #[test]
    fn unconfigured_missing_value_is_left_alone() {
        let v = FeatureVector::new().with_missing("ese");
        let out = imputer().transform(v).unwrap();
        assert!(out.is_missing("ese"));
    }

    #[test]
    fn absent_feature_is_not_added() {
        let v = FeatureVector::new().with("ese", 0.5);
        let out = imputer().transform(v).unwrap();
        assert!(!out.contains("phylop"));
        assert!(!out.contains("donor_ic"));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn used_feature_names_are_configured_keys() {
        let imputer = imputer();
        let names: Vec<&str> = imputer.used_feature_names().into_iter().collect();
        assert_eq!(names, vec!["donor_ic", "phylop"]);
    }

    #[test]
    fn non_finite_default_rejected() {
        let err = Imputer::new([("phylop", f64::NAN)]).unwrap_err();
        assert!(matches!(err, TransformError::NonFiniteDefault { ref feature, .. } if feature == "phylop"));
    }

    #[test]
    fn lookup_default() {
        let imp = imputer();
        assert_eq!(imp.default_for("donor_ic"), Some(-1.5));
        assert_eq!(imp.default_for("ese"), None);
        assert_eq!(imp.len(), 2);
    }
}
