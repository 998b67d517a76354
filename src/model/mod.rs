//! Text classification model
//!
//! A model is a fitted TF-IDF vectorizer plus a multinomial logistic
//! regression over an ordered label space.

pub mod classifier;
pub mod trainer;
pub mod vectorizer;

use crate::error::{Error, Result};
use crate::types::{Label, LabelSpace};

pub use classifier::{ClassifierParams, LogisticRegression};
pub use trainer::{Trainer, TrainerParams};
pub use vectorizer::{Features, TfidfVectorizer, VectorizerParams};

/// Predicted label for `text` with its probability and the full distribution
pub fn classify(
    vectorizer: &TfidfVectorizer,
    classifier: &LogisticRegression,
    label_space: &LabelSpace,
    text: &str,
) -> Result<(Label, f64, Vec<f64>)> {
    let row = vectorizer.transform(text);
    let proba = classifier.predict_proba(&row);
    let (idx, confidence) = classifier::argmax(&proba);
    let label = label_space.labels().get(idx).copied().ok_or_else(|| {
        Error::InvalidInput(format!(
            "classifier has {} outputs but the label space has {} labels",
            classifier.n_classes(),
            label_space.len()
        ))
    })?;
    Ok((label, confidence, proba))
}
