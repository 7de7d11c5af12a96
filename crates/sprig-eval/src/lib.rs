//! Evaluator façade for splice-variant pathogenicity scoring.
//!
//! An [`Evaluator`] binds one feature [`Pipeline`](sprig_pipeline::Pipeline)
//! to any number of named classifier versions and returns a per-version
//! [`Prediction`] or error for every vector it scores.

mod error;
mod evaluator;
mod prediction;
mod version;

pub use error::EvalError;
pub use evaluator::{Evaluation, Evaluator, EvaluatorBuilder};
pub use prediction::Prediction;
pub use version::{ClassifierVersion, PathogenicityRule, VersionId};
