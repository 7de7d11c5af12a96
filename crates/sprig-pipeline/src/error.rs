/// Errors from constructing or applying feature transformers.
///
/// Missing values are not errors; these variants cover vectors a stage
/// cannot work with at all and stages configured with unusable constants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    /// Returned when a required feature is not present as a key in the vector.
    #[error("stage \"{stage}\" requires feature \"{feature}\", which the vector does not carry")]
    MissingFeature {
        /// Name of the stage that raised the error.
        stage: String,
        /// The feature that was expected.
        feature: String,
    },

    /// Returned when an imputer is configured with a NaN or infinite default.
    #[error("default for feature \"{feature}\" is not finite: {value}")]
    NonFiniteDefault {
        /// The feature whose default is unusable.
        feature: String,
        /// The configured default.
        value: f64,
    },
}
