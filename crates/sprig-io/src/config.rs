//! JSON scoring configuration: pipeline settings plus classifier versions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sprig_eval::{Evaluator, PathogenicityRule, VersionId};
use sprig_pipeline::{Imputer, Pipeline, RequiredFeatures};
use tracing::{info, instrument, warn};

use crate::error::{IoError, VersionError};
use crate::loader::load_model_file;
use crate::writer::error_chain;

/// Scoring configuration as written on disk.
///
/// ```json
/// {
///   "imputer": { "phylop": 0.0 },
///   "required_features": ["phylop"],
///   "versions": [
///     { "id": "v1", "model": "models/v1.json", "pathogenic": "pathogenic" }
///   ]
/// }
/// ```
///
/// Relative model paths resolve against the configuration file's directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Defaults filled in for missing feature values.
    #[serde(default)]
    pub imputer: BTreeMap<String, f64>,
    /// Features every input vector must carry.
    #[serde(default)]
    pub required_features: Vec<String>,
    /// Fail a version when its forest splits on a feature the vector lacks.
    #[serde(default = "default_strict_features")]
    pub strict_features: bool,
    /// Classifier versions to load.
    pub versions: Vec<VersionConfig>,
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_strict_features() -> bool {
    false
}

/// One classifier version entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionConfig {
    /// Version identifier.
    pub id: String,
    /// Path to the JSON model document.
    pub model: PathBuf,
    /// Label, or labels, whose probability is reported as pathogenicity.
    pub pathogenic: PathogenicLabels,
}

/// `"label"` or `["label", ...]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PathogenicLabels {
    One(String),
    Many(Vec<String>),
}

impl From<PathogenicLabels> for PathogenicityRule {
    fn from(labels: PathogenicLabels) -> Self {
        match labels {
            PathogenicLabels::One(label) => PathogenicityRule::Label(label),
            PathogenicLabels::Many(labels) => PathogenicityRule::MaxOf(labels),
        }
    }
}

/// A configured version that could not be served.
#[derive(Debug)]
pub struct VersionFailure {
    /// The version that was skipped.
    pub version: VersionId,
    /// Why its model or its pathogenicity rule was rejected.
    pub error: VersionError,
}

/// An evaluator assembled from a [`ScoringConfig`], plus the versions left out.
#[derive(Debug)]
pub struct ScoringSetup {
    /// Evaluator over every version that loaded.
    pub evaluator: Evaluator,
    /// Versions whose models or rules were rejected.
    pub failures: Vec<VersionFailure>,
}

impl ScoringConfig {
    /// Parse a configuration from JSON text, resolving models against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the text does not match the schema.
    pub fn from_json(text: &str, base_dir: &Path) -> Result<Self, serde_json::Error> {
        let mut config: ScoringConfig = serde_json::from_str(text)?;
        config.base_dir = base_dir.to_path_buf();
        Ok(config)
    }

    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::FileNotFound`] | file doesn't exist or is unreadable |
    /// | [`IoError::ConfigParse`] | invalid JSON or schema mismatch |
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn from_file(path: &Path) -> Result<Self, IoError> {
        let text = fs::read_to_string(path).map_err(|e| IoError::FileNotFound {
            path: path.to_path_buf(),
            source: e,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&text, base_dir).map_err(|e| IoError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Resolve a version's model path.
    #[must_use]
    pub fn model_path(&self, version: &VersionConfig) -> PathBuf {
        self.base_dir.join(&version.model)
    }

    /// Build the feature pipeline: the required-feature guard, then the imputer.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Imputer`] if an imputer default is not finite.
    pub fn pipeline(&self) -> Result<Pipeline, IoError> {
        let mut pipeline = Pipeline::new();
        if !self.required_features.is_empty() {
            pipeline = pipeline.with_stage(RequiredFeatures::new(self.required_features.iter().cloned()));
        }
        if !self.imputer.is_empty() {
            let imputer = Imputer::new(self.imputer.iter().map(|(k, &v)| (k.clone(), v)))
                .map_err(|source| IoError::Imputer { source })?;
            pipeline = pipeline.with_stage(imputer);
        }
        Ok(pipeline)
    }

    /// Load every version's model and assemble an evaluator.
    ///
    /// A version whose model fails to load, or whose pathogenic labels are
    /// not classes of its model, is left out and reported in
    /// [`ScoringSetup::failures`]; no partially loaded forest is kept.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Imputer`] | an imputer default is not finite |
    /// | [`IoError::Evaluator`] | no version could be served, or ids repeat |
    #[instrument(skip_all, fields(n_versions = self.versions.len()))]
    pub fn build(&self) -> Result<ScoringSetup, IoError> {
        let mut builder = Evaluator::builder()
            .with_pipeline(self.pipeline()?)
            .with_strict_features(self.strict_features);
        let mut failures = Vec::new();

        for version in &self.versions {
            let id = VersionId::new(version.id.as_str());
            let path = self.model_path(version);
            let rule = PathogenicityRule::from(version.pathogenic.clone());
            let loaded = load_model_file(&path)
                .map_err(VersionError::from)
                .and_then(|forest| {
                    rule.resolve(&id, forest.labels())?;
                    Ok(forest)
                });
            match loaded {
                Ok(forest) => {
                    builder = builder.with_version(id, forest, rule);
                }
                Err(error) => {
                    warn!(version = %id, path = %path.display(), error = %error_chain(&error), "version excluded");
                    failures.push(VersionFailure { version: id, error });
                }
            }
        }

        let evaluator = builder
            .build()
            .map_err(|source| IoError::Evaluator { source })?;
        info!(
            n_loaded = evaluator.versions().count(),
            n_failed = failures.len(),
            "scoring setup ready"
        );
        Ok(ScoringSetup {
            evaluator,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_multiple_pathogenic_labels() {
        let config = ScoringConfig::from_json(
            r#"{
                "imputer": { "phylop": 0.5 },
                "versions": [
                    { "id": "a", "model": "a.json", "pathogenic": "P" },
                    { "id": "b", "model": "/abs/b.json", "pathogenic": ["P", "LP"] }
                ]
            }"#,
            Path::new("/configs"),
        )
        .unwrap();

        assert!(!config.strict_features);
        assert!(config.required_features.is_empty());
        assert_eq!(config.imputer.get("phylop"), Some(&0.5));
        assert_eq!(
            PathogenicityRule::from(config.versions[0].pathogenic.clone()),
            PathogenicityRule::Label("P".into())
        );
        assert_eq!(
            PathogenicityRule::from(config.versions[1].pathogenic.clone()),
            PathogenicityRule::MaxOf(vec!["P".into(), "LP".into()])
        );
        assert_eq!(
            config.model_path(&config.versions[0]),
            PathBuf::from("/configs/a.json")
        );
        assert_eq!(
            config.model_path(&config.versions[1]),
            PathBuf::from("/abs/b.json")
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = ScoringConfig::from_json(
            r#"{ "versions": [], "imputr": {} }"#,
            Path::new("."),
        );
        assert!(result.is_err());
    }

    #[test]
    fn pipeline_orders_guard_before_imputer() {
        let config = ScoringConfig::from_json(
            r#"{ "imputer": { "x": 0.0 }, "required_features": ["x"], "versions": [] }"#,
            Path::new("."),
        )
        .unwrap();
        let pipeline = config.pipeline().unwrap();
        let names: Vec<&str> = pipeline.stages().map(|s| s.name()).collect();
        assert_eq!(names, vec!["required-features", "imputer"]);
    }

    #[test]
    fn unknown_pathogenic_label_disables_only_that_version() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("model.json"),
            r#"{
                "name": "m",
                "classes": ["A", "B"],
                "trees": [{
                    "feature": "x", "threshold": 0.5,
                    "left": { "distribution": [1.0, 0.0] },
                    "right": { "distribution": [0.0, 1.0] }
                }]
            }"#,
        )
        .unwrap();
        let config = ScoringConfig::from_json(
            r#"{ "versions": [
                { "id": "good", "model": "model.json", "pathogenic": "B" },
                { "id": "bad", "model": "model.json", "pathogenic": ["B", "Z"] }
            ] }"#,
            dir.path(),
        )
        .unwrap();

        let setup = config.build().unwrap();
        let loaded: Vec<&str> = setup.evaluator.versions().map(|v| v.id().as_str()).collect();
        assert_eq!(loaded, vec!["good"]);
        assert_eq!(setup.failures.len(), 1);
        assert_eq!(setup.failures[0].version.as_str(), "bad");
        assert!(matches!(
            &setup.failures[0].error,
            VersionError::Rule(sprig_eval::EvalError::UnknownLabel { label, .. }) if label == "Z"
        ));
    }

    #[test]
    fn empty_settings_give_identity_pipeline() {
        let config = ScoringConfig::from_json(r#"{ "versions": [] }"#, Path::new(".")).unwrap();
        assert!(config.pipeline().unwrap().is_empty());
        assert!(matches!(
            config.build(),
            Err(IoError::Evaluator { .. })
        ));
    }
}
