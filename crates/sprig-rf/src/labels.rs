use std::collections::HashSet;
use std::fmt;

use crate::error::ForestError;

/// A class label, e.g. `"pathogenic"` or `"1"`.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct ClassLabel(String);

impl ClassLabel {
    /// Create a label from any string-like value.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Return the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for ClassLabel {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// An ordered list of unique class labels.
///
/// The position of a label is the index of its probability in every
/// distribution produced by a tree or forest built against this list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<ClassLabel>", into = "Vec<ClassLabel>")]
pub struct ClassLabelList {
    labels: Vec<ClassLabel>,
}

impl ClassLabelList {
    /// Create a label list, rejecting empty lists and duplicates.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::EmptyLabelList`] | no labels supplied |
    /// | [`ForestError::DuplicateLabel`] | a label appears twice |
    pub fn new<I, L>(labels: I) -> Result<Self, ForestError>
    where
        I: IntoIterator<Item = L>,
        L: Into<ClassLabel>,
    {
        let labels: Vec<ClassLabel> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(ForestError::EmptyLabelList);
        }
        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(ForestError::DuplicateLabel {
                    label: label.0.clone(),
                });
            }
        }
        Ok(Self { labels })
    }

    /// Return the number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// `false` for every constructed list, since construction rejects an empty one.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Return the position of `label`, if present.
    #[must_use]
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l.as_str() == label)
    }

    /// Return the label at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ClassLabel> {
        self.labels.get(index)
    }

    /// Iterate over labels in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ClassLabel> {
        self.labels.iter()
    }

    /// Return the labels as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[ClassLabel] {
        &self.labels
    }

    /// Return the labels as owned strings, in order.
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.0.clone()).collect()
    }
}

impl TryFrom<Vec<ClassLabel>> for ClassLabelList {
    type Error = ForestError;

    fn try_from(labels: Vec<ClassLabel>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl From<ClassLabelList> for Vec<ClassLabel> {
    fn from(list: ClassLabelList) -> Self {
        list.labels
    }
}

impl<'a> IntoIterator for &'a ClassLabelList {
    type Item = &'a ClassLabel;
    type IntoIter = std::slice::Iter<'a, ClassLabel>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}
