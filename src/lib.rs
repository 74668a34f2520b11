//! Programming problem difficulty prediction
//!
//! Fuses TF-IDF text features with standardized handcrafted statistics and
//! trains two random forests over the same feature space: a classifier for
//! `problem_class` and a regressor for `problem_score`.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::MaxFeatures;

/// The free-text part of a problem, everything a feature producer may look at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemStatement {
    pub title: String,
    pub description: String,
    pub input_description: String,
    pub output_description: String,
    pub sample_io: String,
}

/// A labeled problem as loaded from the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub statement: ProblemStatement,
    pub problem_class: String,
    pub problem_score: f64,
}

/// Prediction for a single problem statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub title: String,
    pub problem_class: String,
    pub problem_score: f64,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Schema error on line {line}, field `{field}`: {message}")]
    DataSchema {
        line: usize,
        field: String,
        message: String,
    },

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Training failed: {0}")]
    TrainingFailure(String),

    #[error("Cannot partition {records} records with holdout fraction {holdout_fraction}")]
    InvalidPartition {
        records: usize,
        holdout_fraction: f64,
    },

    #[error("No trained model `{0}` in store - run `autojudge train` first")]
    NoModel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, JudgeError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub classifier: ForestConfig,
    pub regressor: ForestConfig,
    pub data: DataConfig,
}

/// Row normalization applied after TF-IDF weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextNorm {
    None,
    L2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Vocabulary cap for the text block
    pub max_features: usize,
    pub norm: TextNorm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub holdout_fraction: f64,
    pub seed: u64,
    /// Worker threads for tree construction; rayon's global pool when unset
    #[serde(default)]
    pub threads: Option<usize>,
}

/// Random forest hyperparameters, one section per task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_features: MaxFeatures,
    pub min_samples_leaf: usize,
    #[serde(default)]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub dataset_path: String,
    pub store_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            features: FeatureConfig {
                max_features: 3000,
                norm: TextNorm::L2,
            },
            training: TrainingConfig {
                holdout_fraction: 0.2,
                seed: 42,
                threads: None,
            },
            classifier: ForestConfig {
                n_trees: 200,
                max_features: MaxFeatures::Sqrt,
                min_samples_leaf: 1,
                max_depth: None,
            },
            regressor: ForestConfig {
                n_trees: 200,
                max_features: MaxFeatures::Third,
                min_samples_leaf: 1,
                max_depth: None,
            },
            data: DataConfig {
                dataset_path: "data/problems.jsonl".to_string(),
                store_path: "models/autojudge.db".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            JudgeError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| JudgeError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| JudgeError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let fraction = self.training.holdout_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(JudgeError::Config(format!(
                "training.holdout_fraction must be in (0, 1), got {}",
                fraction
            )));
        }
        if self.features.max_features == 0 {
            return Err(JudgeError::Config(
                "features.max_features must be at least 1".to_string(),
            ));
        }
        for (name, forest) in [("classifier", &self.classifier), ("regressor", &self.regressor)] {
            if forest.n_trees == 0 {
                return Err(JudgeError::Config(format!("{}.n_trees must be at least 1", name)));
            }
            if forest.min_samples_leaf == 0 {
                return Err(JudgeError::Config(format!(
                    "{}.min_samples_leaf must be at least 1",
                    name
                )));
            }
        }
        if self.training.threads == Some(0) {
            return Err(JudgeError::Config("training.threads must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_toml_round_trip() {
        let mut config = Config::default();
        config.training.threads = Some(4);
        config.regressor.max_depth = Some(12);

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_optional_fields_default_to_none() {
        let text = r#"
            [features]
            max_features = 500
            norm = "none"

            [training]
            holdout_fraction = 0.25
            seed = 7

            [classifier]
            n_trees = 10
            max_features = "log2"
            min_samples_leaf = 2

            [regressor]
            n_trees = 10
            max_features = "all"
            min_samples_leaf = 3

            [data]
            dataset_path = "problems.jsonl"
            store_path = "store.db"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.training.threads, None);
        assert_eq!(config.classifier.max_depth, None);
        assert_eq!(config.features.norm, TextNorm::None);
        assert_eq!(config.regressor.max_features, MaxFeatures::All);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.training.holdout_fraction = 1.0;
        assert!(matches!(config.validate(), Err(JudgeError::Config(_))));

        let mut config = Config::default();
        config.classifier.n_trees = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.features.max_features = 0;
        assert!(config.validate().is_err());
    }
}
