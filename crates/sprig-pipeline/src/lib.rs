//! Feature transformation stages applied before classification.
//!
//! A [`Pipeline`] runs [`Transformer`] stages in order over a
//! [`FeatureVector`](sprig_rf::FeatureVector). The [`Imputer`] fills missing
//! values with fixed defaults; [`RequiredFeatures`] rejects vectors that
//! never carried a feature.

mod error;
mod guard;
mod imputer;
mod pipeline;
mod transformer;

pub use error::TransformError;
pub use guard::RequiredFeatures;
pub use imputer::Imputer;
pub use pipeline::Pipeline;
pub use transformer::Transformer;
