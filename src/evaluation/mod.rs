//! Evaluator - held-out metrics for a fitted model
//!
//! Evaluation is a pure function of the model and the test examples: the
//! same inputs always produce bit-identical reports.

pub mod metrics;

use tracing::info;

use crate::error::{Error, Result};
use crate::model::{self, LogisticRegression, TfidfVectorizer};
use crate::types::{Example, Label, LabelSpace};

pub use metrics::{compare, ClassMetrics, MetricsReport, VersionComparison};

/// Score a model against `test_examples`.
///
/// The report covers every label of the model's space plus any label that
/// occurs in the test set, so rows for labels the model cannot predict still
/// show up in the confusion matrix.
pub fn evaluate(
    vectorizer: &TfidfVectorizer,
    classifier: &LogisticRegression,
    label_space: &LabelSpace,
    test_examples: &[Example],
) -> Result<MetricsReport> {
    if test_examples.is_empty() {
        return Err(Error::InvalidInput("cannot evaluate on an empty test set".to_string()));
    }

    let mut y_true: Vec<Label> = Vec::with_capacity(test_examples.len());
    let mut y_pred: Vec<Label> = Vec::with_capacity(test_examples.len());
    for example in test_examples {
        let (predicted, _, _) = model::classify(vectorizer, classifier, label_space, &example.text)?;
        y_true.push(example.label);
        y_pred.push(predicted);
    }

    let labels = LabelSpace::new(label_space.labels().iter().copied().chain(y_true.iter().copied()));
    let report = MetricsReport::from_predictions(&y_true, &y_pred, labels.labels());

    info!(
        "Evaluated on {} examples: accuracy {:.4}, F1 (macro) {:.4}",
        test_examples.len(),
        report.accuracy,
        report.f1_macro
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Trainer, TrainerParams, VectorizerParams};

    fn fitted() -> (TfidfVectorizer, LogisticRegression) {
        let train = vec![
            Example::new("parliament votes on new election law", Label::World),
            Example::new("goalkeeper saves penalty in cup match", Label::Sports),
            Example::new("bank profits rise as shares climb", Label::Business),
            Example::new("software update improves chip security", Label::SciTech),
        ];
        let params = TrainerParams {
            vectorizer: VectorizerParams { min_df: 1, max_df: 1.0, ..Default::default() },
            ..Default::default()
        };
        Trainer::new(params).fit(&train, &LabelSpace::full()).unwrap()
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let (vectorizer, classifier) = fitted();
        let test = vec![
            Example::new("election law passes parliament", Label::World),
            Example::new("penalty saved in the cup", Label::Sports),
            Example::new("shares climb on bank profits", Label::Business),
            Example::new("chip security update", Label::SciTech),
            Example::new("cup match shares", Label::Business),
        ];
        let space = LabelSpace::full();
        let a = evaluate(&vectorizer, &classifier, &space, &test).unwrap();
        let b = evaluate(&vectorizer, &classifier, &space, &test).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.accuracy.to_bits(), b.accuracy.to_bits());
        assert_eq!(a.support_total(), 5);
    }

    #[test]
    fn test_empty_test_set_is_rejected() {
        let (vectorizer, classifier) = fitted();
        let err = evaluate(&vectorizer, &classifier, &LabelSpace::full(), &[]).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
