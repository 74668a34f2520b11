//! TF-IDF vectorization with a capped vocabulary
//!
//! The vocabulary is fit once on training text and frozen. Transforming
//! held-out text reuses it unchanged; unknown terms contribute nothing.

use crate::TextNorm;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"))
}

/// Lowercased tokens of two or more word characters
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    token_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn term_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

/// Sparse row, indices strictly increasing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Value at `index`, zero when absent
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }
}

/// Fits a [`Vocabulary`] from training text
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    max_features: usize,
    norm: TextNorm,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize, norm: TextNorm) -> Self {
        TfidfVectorizer { max_features, norm }
    }

    /// Build the vocabulary from the fit corpus only
    ///
    /// Terms are ranked by aggregate weight over the corpus (count × idf),
    /// ties broken by the term itself, and the top `max_features` kept.
    /// Retained terms get columns in lexical order.
    pub fn fit(&self, texts: &[String]) -> Vocabulary {
        let n_docs = texts.len();
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let mut total_count: HashMap<String, usize> = HashMap::new();

        for text in texts {
            for (term, count) in term_counts(text) {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
                *total_count.entry(term).or_insert(0) += count;
            }
        }

        let mut ranked: Vec<(String, f64, f64)> = document_frequency
            .into_iter()
            .map(|(term, df)| {
                let idf = inverse_document_frequency(n_docs, df);
                let weight = total_count[&term] as f64 * idf;
                (term, idf, weight)
            })
            .collect();
        ranked.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

        let distinct = ranked.len();
        ranked.truncate(self.max_features);
        if distinct > ranked.len() {
            log::debug!(
                "Vocabulary capped at {} of {} distinct terms",
                ranked.len(),
                distinct
            );
        }
        ranked.sort_by(|a, b| a.0.cmp(&b.0));

        let mut columns = BTreeMap::new();
        let mut idf = Vec::with_capacity(ranked.len());
        for (column, (term, term_idf, _)) in ranked.into_iter().enumerate() {
            columns.insert(term, column);
            idf.push(term_idf);
        }

        if columns.is_empty() {
            log::warn!(
                "Empty vocabulary from {} documents; text block has no columns",
                n_docs
            );
        }

        Vocabulary {
            columns,
            idf,
            norm: self.norm,
        }
    }
}

/// ln(N / df) with df floored at one
fn inverse_document_frequency(n_docs: usize, df: usize) -> f64 {
    (n_docs.max(1) as f64 / df.max(1) as f64).ln()
}

/// Frozen term → column mapping with per-term idf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    columns: BTreeMap<String, usize>,
    idf: Vec<f64>,
    norm: TextNorm,
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        self.idf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    pub fn column(&self, term: &str) -> Option<usize> {
        self.columns.get(term).copied()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.columns.contains_key(term)
    }

    pub fn idf(&self, column: usize) -> Option<f64> {
        self.idf.get(column).copied()
    }

    /// Terms in column order
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|t| t.as_str())
    }

    pub fn transform(&self, texts: &[String]) -> Vec<SparseVector> {
        texts.iter().map(|t| self.transform_one(t)).collect()
    }

    pub fn transform_one(&self, text: &str) -> SparseVector {
        let mut entries: Vec<(usize, f64)> = term_counts(text)
            .into_iter()
            .filter_map(|(term, count)| {
                let column = self.column(&term)?;
                Some((column, count as f64 * self.idf[column]))
            })
            .filter(|(_, weight)| *weight != 0.0)
            .collect();
        entries.sort_by_key(|(column, _)| *column);

        if self.norm == TextNorm::L2 {
            let length = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if length > 0.0 {
                for (_, w) in entries.iter_mut() {
                    *w /= length;
                }
            }
        }

        let (indices, values) = entries.into_iter().unzip();
        SparseVector { indices, values }
    }
}
