//! Prediction methods for the Random Forest ensemble.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::features::FeatureSource;
use crate::forest::RandomForest;
use crate::labels::ClassLabel;

/// Index of the largest probability; ties go to the lowest index.
pub(crate) fn argmax(probs: &[f64]) -> usize {
    let mut best = 0usize;
    for (idx, &p) in probs.iter().enumerate().skip(1) {
        if p > probs[best] {
            best = idx;
        }
    }
    best
}

/// Class probability distribution from a prediction.
///
/// Indexed by the positions of the forest's [`ClassLabelList`](crate::ClassLabelList).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDistribution {
    probs: Vec<f64>,
}

impl ClassDistribution {
    /// Create a new class distribution.
    pub(crate) fn new(probs: Vec<f64>) -> Self {
        Self { probs }
    }

    /// Return the predicted class (argmax of probabilities, first index on ties).
    #[must_use]
    pub fn predicted_class(&self) -> usize {
        argmax(&self.probs)
    }

    /// Return the probability of the class at `index`.
    #[must_use]
    pub fn probability(&self, index: usize) -> Option<f64> {
        self.probs.get(index).copied()
    }

    /// Return the top-k classes sorted by descending probability.
    ///
    /// Equal probabilities keep label order.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<(usize, f64)> {
        let mut indexed: Vec<(usize, f64)> = self.probs.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);
        indexed
    }

    /// Return the probability distribution as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }

    /// Return the number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.probs.len()
    }

    /// Return `true` if the distribution has no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }
}

impl RandomForest {
    /// Predict the class label for a single sample.
    ///
    /// Returns the argmax of the averaged probability distribution, with ties
    /// going to the label declared first.
    pub fn predict<S: FeatureSource + ?Sized>(&self, source: &S) -> &ClassLabel {
        let class = self.predict_proba(source).predicted_class();
        &self.labels.as_slice()[class]
    }

    /// Return the averaged class probability distribution for a single sample.
    ///
    /// Sums the leaf distributions of all trees in forest order, then divides
    /// by the tree count.
    pub fn predict_proba<S: FeatureSource + ?Sized>(&self, source: &S) -> ClassDistribution {
        let mut avg = vec![0.0f64; self.labels.len()];
        for tree in &self.trees {
            for (acc, p) in avg.iter_mut().zip(tree.predict_proba(source)) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        avg.iter_mut().for_each(|v| *v /= n);

        ClassDistribution::new(avg)
    }

    /// Predict class labels for a batch of samples in parallel.
    pub fn predict_batch<S: FeatureSource + Sync>(&self, sources: &[S]) -> Vec<&ClassLabel> {
        sources
            .par_iter()
            .map(|source| self.predict(source))
            .collect()
    }

    /// Return probability distributions for a batch of samples in parallel.
    pub fn predict_proba_batch<S: FeatureSource + Sync>(
        &self,
        sources: &[S],
    ) -> Vec<ClassDistribution> {
        sources
            .par_iter()
            .map(|source| self.predict_proba(source))
            .collect()
    }
}
