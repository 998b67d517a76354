//! Configuration management
//!
//! Storage locations, training hyper-parameters, retraining policy and
//! server settings, persisted as TOML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::{ClassifierParams, TrainerParams, VectorizerParams};
use crate::orchestrator::RetrainOptions;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where models and feedback live
    #[serde(default)]
    pub storage: StorageConfig,
    /// Base training corpus
    #[serde(default)]
    pub corpus: CorpusConfig,
    /// Hyper-parameters and retraining policy
    #[serde(default)]
    pub training: TrainingConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Feedback log backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackBackend {
    #[default]
    Jsonl,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Overrides the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub feedback_backend: FeedbackBackend,
    /// Model versions kept in memory
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_cache_capacity() -> usize {
    4
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            feedback_backend: FeedbackBackend::default(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// JSON-lines corpus; defaults to `corpus.jsonl` in the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_feedback_weight")]
    pub feedback_weight: f64,
    #[serde(default = "default_holdout_fraction")]
    pub holdout_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,
    #[serde(default = "default_min_df")]
    pub min_df: usize,
    #[serde(default = "default_max_df")]
    pub max_df: f64,
    /// Inverse regularization strength C
    #[serde(default = "default_regularization")]
    pub regularization: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub allow_reduced_label_space: bool,
    #[serde(default)]
    pub auto_promote: bool,
}

fn default_feedback_weight() -> f64 {
    1.0
}

fn default_holdout_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_max_features() -> usize {
    10_000
}

fn default_ngram_max() -> usize {
    2
}

fn default_min_df() -> usize {
    2
}

fn default_max_df() -> f64 {
    0.95
}

fn default_regularization() -> f64 {
    1.0
}

fn default_max_iter() -> usize {
    1000
}

fn default_tolerance() -> f64 {
    1e-6
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            feedback_weight: default_feedback_weight(),
            holdout_fraction: default_holdout_fraction(),
            seed: default_seed(),
            max_features: default_max_features(),
            ngram_max: default_ngram_max(),
            min_df: default_min_df(),
            max_df: default_max_df(),
            regularization: default_regularization(),
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
            allow_reduced_label_space: false,
            auto_promote: false,
        }
    }
}

impl TrainingConfig {
    pub fn trainer_params(&self) -> TrainerParams {
        TrainerParams {
            vectorizer: VectorizerParams {
                max_features: self.max_features,
                ngram_max: self.ngram_max,
                min_df: self.min_df,
                max_df: self.max_df,
            },
            classifier: ClassifierParams {
                regularization: self.regularization,
                max_iter: self.max_iter,
                tolerance: self.tolerance,
            },
        }
    }

    pub fn retrain_options(&self) -> RetrainOptions {
        RetrainOptions {
            feedback_weight: self.feedback_weight,
            holdout_fraction: self.holdout_fraction,
            seed: self.seed,
            allow_reduced_label_space: self.allow_reduced_label_space,
            auto_promote: self.auto_promote,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from the platform config path, writing defaults if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load configuration from `path`, writing defaults if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().context("Config path has no parent")?;
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Root directory for models and feedback
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => data_dir(),
        }
    }

    pub fn models_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("models"))
    }

    pub fn feedback_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("feedback"))
    }

    pub fn corpus_path(&self) -> Result<PathBuf> {
        match &self.corpus.path {
            Some(path) => Ok(path.clone()),
            None => Ok(self.data_dir()?.join("corpus.jsonl")),
        }
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "humanloop", "humanloop")
        .context("Failed to get project directories")
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[training]\nfeedback_weight = 2.0\n\n[storage]\nfeedback_backend = \"sqlite\"\n",
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.training.feedback_weight, 2.0);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.storage.feedback_backend, FeedbackBackend::Sqlite);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_training_config_maps_to_params() {
        let training = TrainingConfig::default();
        assert_eq!(training.trainer_params(), TrainerParams::default());
        assert_eq!(training.retrain_options(), RetrainOptions::default());
    }

    #[test]
    fn test_paths_follow_data_dir_override() {
        let mut config = Config::default();
        config.storage.data_dir = Some(PathBuf::from("/srv/humanloop"));
        assert_eq!(config.models_dir().unwrap(), PathBuf::from("/srv/humanloop/models"));
        assert_eq!(config.corpus_path().unwrap(), PathBuf::from("/srv/humanloop/corpus.jsonl"));
    }

    #[test]
    fn test_default_toml_parses() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
