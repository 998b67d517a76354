//! Error taxonomy for the training, registry and serving core

use std::path::PathBuf;

use crate::types::Label;

/// Result alias used throughout the core
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the feedback store, trainer, registry and prediction service
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Feedback or model artifact I/O failure
    #[error("storage error at {path}: {message}")]
    Storage { path: PathBuf, message: String },

    /// A label in the requested label space has no training examples
    #[error("insufficient training data: no examples for {}", format_labels(.missing))]
    InsufficientData { missing: Vec<Label> },

    /// Requested model version does not exist
    #[error("model version v{0} not found")]
    VersionNotFound(u32),

    /// Prediction attempted before any version was committed
    #[error("no model loaded: train a baseline model first")]
    ModelNotLoaded,

    /// Caller supplied something the core refuses to act on
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A second retraining run was started while one is in flight
    #[error("a retraining run is already in progress")]
    RetrainInProgress,

    /// Persisted artifact does not match its recorded checksum
    #[error("artifact v{version} is corrupted: expected checksum {expected}, found {actual}")]
    Corrupted {
        version: u32,
        expected: String,
        actual: String,
    },
}

impl Error {
    pub fn storage(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Error::Storage {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Stable identifier for the error condition
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Storage { .. } => "storage_error",
            Error::InsufficientData { .. } => "insufficient_data",
            Error::VersionNotFound(_) => "version_not_found",
            Error::ModelNotLoaded => "model_not_loaded",
            Error::InvalidInput(_) => "invalid_input",
            Error::RetrainInProgress => "retrain_in_progress",
            Error::Corrupted { .. } => "corrupted_artifact",
        }
    }
}

fn format_labels(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
