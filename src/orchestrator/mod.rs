//! Retraining Orchestrator - all-or-nothing production of a new model version
//!
//! A run moves `Idle -> Running -> Committed | Failed`. It loads the base
//! corpus and the feedback log, holds out a stratified slice of the base
//! corpus, fits on the rest plus weighted feedback, evaluates, and commits.
//! Any failure before the commit leaves the registry untouched. At most one
//! run is in flight at a time.

pub mod split;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, TryLockError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::corpus::CorpusLoader;
use crate::error::{Error, Result};
use crate::evaluation::{self, MetricsReport};
use crate::feedback::FeedbackStore;
use crate::model::{trainer, Trainer};
use crate::registry::ModelRegistry;
use crate::types::{Example, Label, LabelSpace};

pub use split::stratified_split;

/// Run-level policy knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainOptions {
    /// Weight of each feedback-derived example
    pub feedback_weight: f64,
    /// Share of each label's base examples held out for evaluation
    pub holdout_fraction: f64,
    pub seed: u64,
    /// Continue with the labels that have data instead of failing
    pub allow_reduced_label_space: bool,
    /// Make each committed version current
    pub auto_promote: bool,
}

impl Default for RetrainOptions {
    fn default() -> Self {
        Self {
            feedback_weight: 1.0,
            holdout_fraction: 0.2,
            seed: 42,
            allow_reduced_label_space: false,
            auto_promote: false,
        }
    }
}

/// Lifecycle of the most recent run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running { run_id: Uuid },
    Committed { run_id: Uuid, version: u32 },
    Failed { run_id: Uuid, kind: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Base corpus only
    Baseline,
    /// Base corpus plus the feedback log
    Retrain,
}

/// Example counts for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunCounts {
    pub base: usize,
    pub feedback: usize,
    pub corrections: usize,
    pub training: usize,
    pub held_out: usize,
}

/// Metric change relative to version 1
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsDelta {
    pub accuracy: f64,
    pub f1_macro: f64,
}

/// Outcome of a committed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub kind: RunKind,
    pub version: u32,
    pub label_space: Vec<Label>,
    pub feedback_weight: f64,
    pub counts: RunCounts,
    pub metrics: MetricsReport,
    pub promoted: bool,
    pub delta_vs_baseline: Option<MetricsDelta>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct Orchestrator {
    corpus: Arc<dyn CorpusLoader>,
    feedback: Arc<dyn FeedbackStore>,
    registry: Arc<ModelRegistry>,
    trainer: Trainer,
    options: RetrainOptions,
    run_lock: Mutex<()>,
    state: Mutex<RunState>,
}

impl Orchestrator {
    pub fn new(
        corpus: Arc<dyn CorpusLoader>,
        feedback: Arc<dyn FeedbackStore>,
        registry: Arc<ModelRegistry>,
        trainer: Trainer,
        options: RetrainOptions,
    ) -> Self {
        Self {
            corpus,
            feedback,
            registry,
            trainer,
            options,
            run_lock: Mutex::new(()),
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn options(&self) -> &RetrainOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// State of the most recent run
    pub fn state(&self) -> RunState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Train on the base corpus alone
    pub fn run_baseline(&self) -> Result<RunReport> {
        self.run(RunKind::Baseline, self.options.feedback_weight)
    }

    /// Train on the base corpus plus every feedback record.
    ///
    /// `feedback_weight` overrides the configured weight for this run only.
    /// Requires a baseline version to exist.
    pub fn retrain(&self, feedback_weight: Option<f64>) -> Result<RunReport> {
        let weight = feedback_weight.unwrap_or(self.options.feedback_weight);
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidInput(format!(
                "feedback weight must be a finite number >= 0, got {}",
                weight
            )));
        }
        if self.registry.latest()?.is_none() {
            return Err(Error::ModelNotLoaded);
        }
        self.run(RunKind::Retrain, weight)
    }

    fn run(&self, kind: RunKind, weight: f64) -> Result<RunReport> {
        let _guard = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(Error::RetrainInProgress),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.set_state(RunState::Running { run_id });
        info!("Run {} ({:?}) started with feedback weight {}", run_id, kind, weight);

        match self.execute(run_id, kind, weight, started_at) {
            Ok(report) => {
                self.set_state(RunState::Committed {
                    run_id,
                    version: report.version,
                });
                Ok(report)
            }
            Err(e) => {
                warn!("Run {} failed: {}", run_id, e);
                self.set_state(RunState::Failed {
                    run_id,
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        run_id: Uuid,
        kind: RunKind,
        weight: f64,
        started_at: DateTime<Utc>,
    ) -> Result<RunReport> {
        let base = self.corpus.load()?;
        let records = match kind {
            RunKind::Baseline => Vec::new(),
            RunKind::Retrain => self.feedback.load_all()?,
        };

        let (mut training, held_out) =
            split::stratified_split(&base, self.options.holdout_fraction, self.options.seed);
        if held_out.is_empty() {
            return Err(Error::InvalidInput(format!(
                "held-out slice is empty ({} base examples, fraction {})",
                base.len(),
                self.options.holdout_fraction
            )));
        }
        let base_training = training.len();
        for record in &records {
            training.push(record.to_example(weight)?);
        }

        let label_space = self.label_space_for(&training)?;
        let (vectorizer, classifier) = self.trainer.fit(&training, &label_space)?;
        let metrics = evaluation::evaluate(&vectorizer, &classifier, &label_space, &held_out)?;

        let committed = self
            .registry
            .commit(vectorizer, classifier, label_space.clone(), metrics)?;
        let version = committed.version;

        if self.options.auto_promote {
            if let Err(e) = self.registry.set_current(version) {
                warn!("Committed v{} but could not promote it: {}", version, e);
            }
        }
        let promoted = matches!(self.registry.current_version(), Ok(Some(v)) if v == version);

        let delta_vs_baseline = if version > 1 {
            match self.registry.get(Some(1)) {
                Ok(baseline) => Some(MetricsDelta {
                    accuracy: committed.metrics.accuracy - baseline.metrics.accuracy,
                    f1_macro: committed.metrics.f1_macro - baseline.metrics.f1_macro,
                }),
                Err(e) => {
                    warn!("Could not load v1 for comparison: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let counts = RunCounts {
            base: base.len(),
            feedback: records.len(),
            corrections: records.iter().filter(|r| r.is_correction()).count(),
            training: base_training + records.len(),
            held_out: held_out.len(),
        };
        info!(
            "Run {} committed v{}: accuracy {:.4}, {} training / {} held-out examples",
            run_id, version, committed.metrics.accuracy, counts.training, counts.held_out
        );

        Ok(RunReport {
            run_id,
            kind,
            version,
            label_space: label_space.labels().to_vec(),
            feedback_weight: weight,
            counts,
            metrics: committed.metrics.clone(),
            promoted,
            delta_vs_baseline,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn label_space_for(&self, training: &[Example]) -> Result<LabelSpace> {
        let full = LabelSpace::full();
        let missing = trainer::missing_labels(training, &full);
        if missing.is_empty() {
            return Ok(full);
        }
        if !self.options.allow_reduced_label_space {
            return Err(Error::InsufficientData { missing });
        }

        let reduced = LabelSpace::new(full.labels().iter().copied().filter(|l| !missing.contains(l)));
        if reduced.len() < 2 {
            return Err(Error::InsufficientData { missing });
        }
        warn!(
            "Training without {} (no examples)",
            missing.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(", ")
        );
        Ok(reduced)
    }

    fn set_state(&self, state: RunState) {
        match self.state.lock() {
            Ok(mut current) => *current = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}
