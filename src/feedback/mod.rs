//! Feedback Store - append-only log of human corrections
//!
//! Every submitted correction becomes one immutable `FeedbackRecord`. The log
//! has no update or delete operation; a bad record is corrected by appending
//! a new one. Records are returned in insertion order.

pub mod sqlite;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{Example, Label};

pub use sqlite::SqliteFeedbackStore;
pub use store::JsonlFeedbackStore;

/// A single human correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub text: String,
    pub model_prediction: Label,
    pub human_label: Label,
    pub timestamp: DateTime<Utc>,
    pub model_version: u32,
}

impl FeedbackRecord {
    /// Create a record stamped with the current time
    pub fn new(
        text: impl Into<String>,
        model_prediction: Label,
        human_label: Label,
        model_version: u32,
    ) -> Self {
        Self {
            text: text.into(),
            model_prediction,
            human_label,
            timestamp: Utc::now(),
            model_version,
        }
    }

    /// True when the human disagreed with the model
    pub fn is_correction(&self) -> bool {
        self.human_label != self.model_prediction
    }

    /// Training example using the human label as ground truth
    pub fn to_example(&self, weight: f64) -> Result<Example> {
        Example::weighted(self.text.clone(), self.human_label, weight)
    }
}

/// Persistence contract for the feedback log
pub trait FeedbackStore: Send + Sync {
    /// Durably append one record; an `Err` means the record was not stored
    fn append(&self, record: &FeedbackRecord) -> Result<()>;

    /// Every record ever appended, in append order
    fn load_all(&self) -> Result<Vec<FeedbackRecord>>;
}

/// Aggregate view of a feedback log
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackSummary {
    pub total: usize,
    pub corrections: usize,
    pub by_human_label: BTreeMap<Label, usize>,
}

impl FeedbackSummary {
    pub fn from_records(records: &[FeedbackRecord]) -> Self {
        let mut summary = FeedbackSummary {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            if record.is_correction() {
                summary.corrections += 1;
            }
            *summary.by_human_label.entry(record.human_label).or_insert(0) += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correction_detection() {
        let agree = FeedbackRecord::new("a", Label::Sports, Label::Sports, 1);
        let disagree = FeedbackRecord::new("b", Label::Sports, Label::Business, 1);
        assert!(!agree.is_correction());
        assert!(disagree.is_correction());
    }

    #[test]
    fn test_to_example_uses_human_label() {
        let record = FeedbackRecord::new("oil prices", Label::Sports, Label::Business, 1);
        let example = record.to_example(2.0).unwrap();
        assert_eq!(example.label, Label::Business);
        assert_eq!(example.weight, 2.0);
        assert_eq!(example.text, "oil prices");
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            FeedbackRecord::new("a", Label::Sports, Label::Sports, 1),
            FeedbackRecord::new("b", Label::Sports, Label::Business, 1),
            FeedbackRecord::new("c", Label::World, Label::Business, 2),
        ];
        let summary = FeedbackSummary::from_records(&records);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.corrections, 2);
        assert_eq!(summary.by_human_label.get(&Label::Business), Some(&2));
        assert_eq!(summary.by_human_label.get(&Label::World), None);
    }
}
