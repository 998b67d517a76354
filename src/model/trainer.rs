//! Model Trainer - fits vectorizer and classifier on a weighted example set

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::classifier::{ClassifierParams, LogisticRegression, TrainingSet};
use super::vectorizer::{TfidfVectorizer, VectorizerParams};
use crate::error::{Error, Result};
use crate::types::{Example, Label, LabelSpace};

/// Hyper-parameters for one fit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerParams {
    pub vectorizer: VectorizerParams,
    pub classifier: ClassifierParams,
}

/// Fits a fresh vectorizer and classifier on every call
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    params: TrainerParams,
}

impl Trainer {
    pub fn new(params: TrainerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrainerParams {
        &self.params
    }

    /// Fit on `examples` over `label_space`.
    ///
    /// Every label in the space needs at least one example with a positive
    /// weight, otherwise `InsufficientData` lists the missing labels.
    /// Examples whose label lies outside the space are skipped.
    pub fn fit(
        &self,
        examples: &[Example],
        label_space: &LabelSpace,
    ) -> Result<(TfidfVectorizer, LogisticRegression)> {
        if label_space.is_empty() {
            return Err(Error::InvalidInput("label space is empty".to_string()));
        }

        let missing = missing_labels(examples, label_space);
        if !missing.is_empty() {
            return Err(Error::InsufficientData { missing });
        }

        let usable: Vec<&Example> = examples
            .iter()
            .filter(|e| label_space.contains(e.label))
            .collect();
        if usable.len() < examples.len() {
            debug!(
                "Skipping {} examples outside the label space",
                examples.len() - usable.len()
            );
        }

        let texts: Vec<&str> = usable.iter().map(|e| e.text.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(&texts, self.params.vectorizer.clone());
        let features = vectorizer.transform_all(&texts);

        let mut targets = Vec::with_capacity(usable.len());
        for example in &usable {
            // Filtered above, so the lookup cannot miss
            if let Some(idx) = label_space.index_of(example.label) {
                targets.push(idx);
            }
        }
        let weights: Vec<f64> = usable.iter().map(|e| e.weight).collect();

        let data = TrainingSet {
            features: &features,
            targets: &targets,
            weights: &weights,
        };
        let classifier = LogisticRegression::fit(
            &data,
            vectorizer.n_features(),
            label_space.len(),
            &self.params.classifier,
        );

        info!(
            "Trained classifier on {} examples ({} features, {} classes, {} iterations)",
            usable.len(),
            vectorizer.n_features(),
            label_space.len(),
            classifier.n_iter()
        );
        Ok((vectorizer, classifier))
    }
}

/// Labels of `label_space` with no positively weighted example
pub fn missing_labels(examples: &[Example], label_space: &LabelSpace) -> Vec<Label> {
    label_space
        .labels()
        .iter()
        .filter(|label| !examples.iter().any(|e| e.label == **label && e.weight > 0.0))
        .copied()
        .collect()
}
