//! Prediction Service - single-text inference against the registry
//!
//! Holds no model state of its own: every call resolves the version through
//! the registry, so a repoint of "current" takes effect on the next request.

use serde::Serialize;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::registry::ModelRegistry;
use crate::types::Label;

/// Answer to one prediction request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: Label,
    pub confidence: f64,
    pub version: u32,
}

#[derive(Clone)]
pub struct PredictionService {
    registry: Arc<ModelRegistry>,
}

impl PredictionService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Classify with the current version
    pub fn predict(&self, text: &str) -> Result<Prediction> {
        self.predict_with_version(text, None)
    }

    /// Classify with an explicit version, or the current one when `None`
    pub fn predict_with_version(&self, text: &str, version: Option<u32>) -> Result<Prediction> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("text must not be empty".to_string()));
        }
        let model = self.registry.get(version)?;
        let (label, confidence) = model.classify(text)?;
        Ok(Prediction {
            label,
            confidence,
            version: model.version,
        })
    }
}
