//! Shared types used across modules
//!
//! Labels and labeled examples are consumed by the corpus loader, the
//! feedback store, the trainer and the evaluator alike.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// AG News topic label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    World,
    Sports,
    Business,
    #[serde(rename = "Sci/Tech")]
    SciTech,
}

impl Label {
    /// All labels in canonical order (matches the AG News class ids)
    pub const ALL: [Label; 4] = [Label::World, Label::Sports, Label::Business, Label::SciTech];

    /// Human-readable label name
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::World => "World",
            Label::Sports => "Sports",
            Label::Business => "Business",
            Label::SciTech => "Sci/Tech",
        }
    }

    /// Map an AG News class id (0..=3) to a label
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// AG News class id
    pub fn id(&self) -> u8 {
        match self {
            Label::World => 0,
            Label::Sports => 1,
            Label::Business => 2,
            Label::SciTech => 3,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "world" => Ok(Label::World),
            "sports" => Ok(Label::Sports),
            "business" => Ok(Label::Business),
            "sci/tech" | "scitech" | "sci_tech" => Ok(Label::SciTech),
            other => Err(Error::InvalidInput(format!(
                "unknown label '{}' (expected one of: World, Sports, Business, Sci/Tech)",
                other
            ))),
        }
    }
}

/// A labeled training instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub text: String,
    pub label: Label,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Example {
    /// Example with the default weight of 1.0
    pub fn new(text: impl Into<String>, label: Label) -> Self {
        Self {
            text: text.into(),
            label,
            weight: default_weight(),
        }
    }

    /// Example with an explicit training weight
    pub fn weighted(text: impl Into<String>, label: Label, weight: f64) -> Result<Self> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidInput(format!(
                "example weight must be a finite number >= 0, got {}",
                weight
            )));
        }
        Ok(Self {
            text: text.into(),
            label,
            weight,
        })
    }
}

/// Ordered set of labels a model can predict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSpace(Vec<Label>);

impl LabelSpace {
    /// Build a label space; duplicates are removed and canonical order is kept
    pub fn new(labels: impl IntoIterator<Item = Label>) -> Self {
        let mut labels: Vec<Label> = labels.into_iter().collect();
        labels.sort();
        labels.dedup();
        Self(labels)
    }

    /// All four topic labels
    pub fn full() -> Self {
        Self(Label::ALL.to_vec())
    }

    pub fn labels(&self) -> &[Label] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of a label in this space
    pub fn index_of(&self, label: Label) -> Option<usize> {
        self.0.iter().position(|l| *l == label)
    }

    pub fn contains(&self, label: Label) -> bool {
        self.index_of(label).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse_and_display() {
        assert_eq!("sports".parse::<Label>().unwrap(), Label::Sports);
        assert_eq!("Sci/Tech".parse::<Label>().unwrap(), Label::SciTech);
        assert_eq!(Label::SciTech.to_string(), "Sci/Tech");
        assert!("weather".parse::<Label>().is_err());
    }

    #[test]
    fn test_label_ids_follow_ag_news() {
        for (i, label) in Label::ALL.iter().enumerate() {
            assert_eq!(label.id() as usize, i);
            assert_eq!(Label::from_id(i as u8), Some(*label));
        }
        assert_eq!(Label::from_id(4), None);
    }

    #[test]
    fn test_label_serde_uses_display_names() {
        let json = serde_json::to_string(&Label::SciTech).unwrap();
        assert_eq!(json, "\"Sci/Tech\"");
        let back: Label = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Label::SciTech);
    }

    #[test]
    fn test_negative_weight_rejected() {
        assert!(Example::weighted("text", Label::World, -1.0).is_err());
        assert!(Example::weighted("text", Label::World, f64::NAN).is_err());
        assert_eq!(Example::weighted("text", Label::World, 0.0).unwrap().weight, 0.0);
    }

    #[test]
    fn test_label_space_is_canonical() {
        let space = LabelSpace::new([Label::SciTech, Label::World, Label::SciTech]);
        assert_eq!(space.labels(), &[Label::World, Label::SciTech]);
        assert_eq!(space.index_of(Label::SciTech), Some(1));
        assert!(!space.contains(Label::Sports));
    }
}
