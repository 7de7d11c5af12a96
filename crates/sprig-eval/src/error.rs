use sprig_pipeline::TransformError;

use crate::version::VersionId;

/// Errors from assembling an [`Evaluator`](crate::Evaluator) or scoring one
/// vector with one classifier version.
///
/// Evaluation errors are reported per version inside an
/// [`Evaluation`](crate::Evaluation); they never abort the whole call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// Returned when the shared feature pipeline rejects the vector.
    #[error("feature pipeline failed")]
    Transform(#[from] TransformError),

    /// Returned, with strict feature checking enabled, when the transformed
    /// vector lacks a feature the version's forest splits on.
    #[error("version {version}: feature \"{feature}\" was not supplied")]
    FeatureNotSupplied {
        /// The version being evaluated.
        version: VersionId,
        /// The absent feature.
        feature: String,
    },

    /// Returned when an evaluator is built without any classifier version.
    #[error("evaluator has no classifier versions")]
    NoVersions,

    /// Returned when two classifier versions share an identifier.
    #[error("classifier version {version} registered twice")]
    DuplicateVersion {
        /// The repeated identifier.
        version: VersionId,
    },

    /// Returned when a pathogenicity rule names a label the forest does not declare.
    #[error("version {version}: pathogenicity label \"{label}\" is not a class of the forest")]
    UnknownLabel {
        /// The version being registered.
        version: VersionId,
        /// The unknown label.
        label: String,
    },

    /// Returned when a pathogenicity rule names no labels.
    #[error("version {version}: pathogenicity rule names no labels")]
    EmptyRule {
        /// The version being registered.
        version: VersionId,
    },
}
