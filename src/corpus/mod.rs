//! Corpus Loader - the fixed base training set
//!
//! The base corpus is read from a JSON-lines file where each line is
//! `{"text": "...", "label": "Sports"}`. Labels may also be given as the
//! AG News integer class id (0 = World .. 3 = Sci/Tech).

use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Example, Label};

/// Source of the immutable base-training examples
pub trait CorpusLoader: Send + Sync {
    /// Load every base example; repeated calls return the same sequence
    fn load(&self) -> Result<Vec<Example>>;
}

/// Corpus held in memory, used for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    examples: Vec<Example>,
}

impl InMemoryCorpus {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }
}

impl CorpusLoader for InMemoryCorpus {
    fn load(&self) -> Result<Vec<Example>> {
        Ok(self.examples.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Id(u8),
    Name(String),
}

#[derive(Debug, Deserialize)]
struct RawExample {
    text: String,
    label: RawLabel,
}

/// Corpus backed by a JSON-lines file
#[derive(Debug, Clone)]
pub struct JsonlCorpus {
    path: PathBuf,
}

impl JsonlCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_line(&self, line_no: usize, line: &str) -> Result<Example> {
        let raw: RawExample = serde_json::from_str(line).map_err(|e| {
            Error::storage(&self.path, format!("line {}: {}", line_no, e))
        })?;
        let label = match raw.label {
            RawLabel::Id(id) => Label::from_id(id).ok_or_else(|| {
                Error::InvalidInput(format!("line {}: unknown class id {}", line_no, id))
            })?,
            RawLabel::Name(name) => name.parse()?,
        };
        Ok(Example::new(raw.text, label))
    }
}

impl CorpusLoader for JsonlCorpus {
    fn load(&self) -> Result<Vec<Example>> {
        let file = std::fs::File::open(&self.path).map_err(|e| Error::storage(&self.path, e))?;
        let reader = BufReader::new(file);

        let mut examples = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| Error::storage(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            examples.push(self.parse_line(idx + 1, &line)?);
        }

        info!("Loaded {} base examples from {}", examples.len(), self.path.display());
        debug!("Corpus label counts: {:?}", label_counts(&examples));
        Ok(examples)
    }
}

/// Number of examples per label, in canonical label order
pub fn label_counts(examples: &[Example]) -> Vec<(Label, usize)> {
    Label::ALL
        .iter()
        .map(|label| (*label, examples.iter().filter(|e| e.label == *label).count()))
        .collect()
}
