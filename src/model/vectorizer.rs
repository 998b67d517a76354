//! TF-IDF text vectorizer
//!
//! Refit from scratch on every training corpus; never updated incrementally.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Sparse feature row: (feature index, value) pairs sorted by index
pub type Features = Vec<(usize, f64)>;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    // Two or more word characters
    Regex::new(r"(?u)\b\w\w+\b").unwrap()
});

/// Vectorizer hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerParams {
    pub max_features: usize,
    pub ngram_max: usize,
    pub min_df: usize,
    pub max_df: f64,
}

impl Default for VectorizerParams {
    fn default() -> Self {
        Self {
            max_features: 10_000,
            ngram_max: 2,
            min_df: 2,
            max_df: 0.95,
        }
    }
}

/// Fitted TF-IDF transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    params: VectorizerParams,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn vocabulary and inverse document frequencies from `documents`
    pub fn fit<S: AsRef<str>>(documents: &[S], params: VectorizerParams) -> Self {
        let n_docs = documents.len();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut corpus_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let terms = extract_terms(doc.as_ref(), params.ngram_max);
            let unique: HashSet<&String> = terms.iter().collect();
            for term in unique {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            for term in terms {
                *corpus_freq.entry(term).or_insert(0) += 1;
            }
        }

        let max_doc_count = (params.max_df * n_docs as f64).floor() as usize;
        let mut kept: Vec<(String, usize)> = corpus_freq
            .into_iter()
            .filter(|(term, _)| {
                let df = doc_freq.get(term).copied().unwrap_or(0);
                df >= params.min_df && df <= max_doc_count
            })
            .collect();

        // Most frequent first, ties by term so the cut is deterministic
        kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        kept.truncate(params.max_features);

        let mut terms: Vec<String> = kept.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        let idf = terms
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term, idx))
            .collect::<BTreeMap<_, _>>();

        debug!("Fitted vectorizer: {} documents, {} features", n_docs, vocabulary.len());
        Self {
            params,
            vocabulary,
            idf,
        }
    }

    /// Number of output features
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    pub fn params(&self) -> &VectorizerParams {
        &self.params
    }

    /// L2-normalized TF-IDF row for one text
    pub fn transform(&self, text: &str) -> Features {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in extract_terms(text, self.params.ngram_max) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut row: Features = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();

        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut row {
                *v /= norm;
            }
        }
        row
    }

    pub fn transform_all<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Features> {
        texts.iter().map(|t| self.transform(t.as_ref())).collect()
    }
}

/// Lowercased word n-grams of order 1..=ngram_max
fn extract_terms(text: &str, ngram_max: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = TOKEN_RE.find_iter(&lowered).map(|m| m.as_str()).collect();

    let mut terms = Vec::with_capacity(tokens.len() * ngram_max.max(1));
    for n in 1..=ngram_max.max(1) {
        if tokens.len() < n {
            break;
        }
        for window in tokens.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}
