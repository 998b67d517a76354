//! Application wiring - builds the stores, registry and services from config

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, FeedbackBackend};
use crate::corpus::{CorpusLoader, JsonlCorpus};
use crate::feedback::{FeedbackStore, JsonlFeedbackStore, SqliteFeedbackStore};
use crate::model::Trainer;
use crate::orchestrator::Orchestrator;
use crate::prediction::PredictionService;
use crate::registry::ModelRegistry;

/// Shared handles to every core component
pub struct App {
    pub registry: Arc<ModelRegistry>,
    pub feedback: Arc<dyn FeedbackStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub predictor: PredictionService,
}

impl App {
    /// Open the on-disk stores named by `config`
    pub fn open(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        info!("Using data directory {}", data_dir.display());

        let registry = ModelRegistry::open(config.models_dir()?, config.storage.cache_capacity)
            .context("Failed to open model registry")?;

        let feedback_dir = config.feedback_dir()?;
        let feedback: Arc<dyn FeedbackStore> = match config.storage.feedback_backend {
            FeedbackBackend::Jsonl => Arc::new(
                JsonlFeedbackStore::open(&feedback_dir).context("Failed to open feedback log")?,
            ),
            FeedbackBackend::Sqlite => Arc::new(
                SqliteFeedbackStore::open(&feedback_dir).context("Failed to open feedback database")?,
            ),
        };

        let corpus: Arc<dyn CorpusLoader> = Arc::new(JsonlCorpus::new(config.corpus_path()?));
        Ok(Self::from_parts(
            corpus,
            feedback,
            Arc::new(registry),
            Trainer::new(config.training.trainer_params()),
            config.training.retrain_options(),
        ))
    }

    /// Assemble from already-built components
    pub fn from_parts(
        corpus: Arc<dyn CorpusLoader>,
        feedback: Arc<dyn FeedbackStore>,
        registry: Arc<ModelRegistry>,
        trainer: Trainer,
        options: crate::orchestrator::RetrainOptions,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            corpus,
            Arc::clone(&feedback),
            Arc::clone(&registry),
            trainer,
            options,
        );
        Self {
            predictor: PredictionService::new(Arc::clone(&registry)),
            registry,
            feedback,
            orchestrator: Arc::new(orchestrator),
        }
    }
}
