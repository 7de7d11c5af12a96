use std::sync::Arc;

use sprig_rf::{ClassDistribution, ClassLabel, ClassLabelList};

/// The outcome of scoring one vector with one classifier version.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    labels: Arc<ClassLabelList>,
    distribution: ClassDistribution,
    pathogenicity: f64,
}

impl Prediction {
    pub(crate) fn new(
        labels: Arc<ClassLabelList>,
        distribution: ClassDistribution,
        pathogenicity: f64,
    ) -> Self {
        Self {
            labels,
            distribution,
            pathogenicity,
        }
    }

    /// Return the full averaged class distribution.
    #[must_use]
    pub fn distribution(&self) -> &ClassDistribution {
        &self.distribution
    }

    /// Return the scalar pathogenicity derived by the version's rule.
    #[must_use]
    pub fn pathogenicity(&self) -> f64 {
        self.pathogenicity
    }

    /// Return the ordered class labels the distribution is indexed by.
    #[must_use]
    pub fn labels(&self) -> &ClassLabelList {
        &self.labels
    }

    /// Return the most probable label; ties go to the label declared first.
    #[must_use]
    pub fn predicted_label(&self) -> &ClassLabel {
        &self.labels.as_slice()[self.distribution.predicted_class()]
    }

    /// Return the probability assigned to `label`.
    #[must_use]
    pub fn probability_of(&self, label: &str) -> Option<f64> {
        self.labels
            .position(label)
            .and_then(|i| self.distribution.probability(i))
    }

    /// Iterate over `(label, probability)` pairs in label order.
    pub fn probabilities(&self) -> impl Iterator<Item = (&ClassLabel, f64)> {
        self.labels
            .iter()
            .zip(self.distribution.as_slice().iter().copied())
    }
}
