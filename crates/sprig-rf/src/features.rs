//! Named feature values consumed by trees and forests.

use std::collections::{BTreeMap, HashMap};

/// Anything that can answer "what is the value of feature `name`?".
///
/// Trees and forests score any `FeatureSource`. `None` means the feature is
/// absent; a present `NaN` means the value is unavailable. Both follow the
/// same missing-value rule during traversal.
pub trait FeatureSource {
    /// Return the value of the named feature, if present.
    fn feature(&self, name: &str) -> Option<f64>;
}

impl<T: FeatureSource + ?Sized> FeatureSource for &T {
    fn feature(&self, name: &str) -> Option<f64> {
        (**self).feature(name)
    }
}

impl FeatureSource for HashMap<String, f64> {
    fn feature(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl FeatureSource for BTreeMap<String, f64> {
    fn feature(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

/// A mutable mapping from feature name to value for one variant/transcript.
///
/// Unavailable values are stored as [`FeatureVector::MISSING`] (`NaN`).
/// Names are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    values: HashMap<String, f64>,
}

impl FeatureVector {
    /// Sentinel stored for a feature whose value is unavailable.
    pub const MISSING: f64 = f64::NAN;

    /// Create an empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(name.into(), value)
    }

    /// Insert a value and return the vector, for fluent construction.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert the missing sentinel for `name`.
    #[must_use]
    pub fn with_missing(self, name: impl Into<String>) -> Self {
        self.with(name, Self::MISSING)
    }

    /// Return the stored value, which may be the missing sentinel.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Return a mutable reference to the stored value.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut f64> {
        self.values.get_mut(name)
    }

    /// Return `true` if `name` is present as a key (missing sentinel included).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Return `true` if `name` is present and holds the missing sentinel.
    #[must_use]
    pub fn is_missing(&self, name: &str) -> bool {
        self.get(name).is_some_and(f64::is_nan)
    }

    /// Iterate over `(name, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Return the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return `true` if the vector has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FeatureSource for FeatureVector {
    fn feature(&self, name: &str) -> Option<f64> {
        self.get(name)
    }
}

impl From<HashMap<String, f64>> for FeatureVector {
    fn from(values: HashMap<String, f64>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl IntoIterator for FeatureVector {
    type Item = (String, f64);
    type IntoIter = std::collections::hash_map::IntoIter<String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
