//! Feature fusion
//!
//! Joins the TF-IDF text block and the standardized numeric block into one
//! row per record. Text columns come first, numeric columns follow, and the
//! layout is fixed by the fitted artifacts so train and held-out matrices
//! always line up.

use super::producers::{NumericProducer, StatementStatistics, StatementText, TextProducer};
use super::scaling::{sanitize, Standardization};
use super::tfidf::{SparseVector, TfidfVectorizer, Vocabulary};
use crate::{FeatureConfig, JudgeError, ProblemStatement, Result};
use serde::{Deserialize, Serialize};

/// One fused feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct FusedRow {
    pub text: SparseVector,
    pub numeric: Vec<f64>,
}

/// Row-aligned fused features for a set of records
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    text_dim: usize,
    numeric_dim: usize,
    rows: Vec<FusedRow>,
}

impl FeatureMatrix {
    /// Concatenate the two branches row by row
    pub fn fuse(
        text_dim: usize,
        text: Vec<SparseVector>,
        numeric_dim: usize,
        numeric: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if text.len() != numeric.len() {
            return Err(JudgeError::ShapeMismatch {
                context: "feature fusion (text rows vs numeric rows)".to_string(),
                expected: text.len(),
                actual: numeric.len(),
            });
        }
        if let Some(row) = numeric.iter().find(|r| r.len() != numeric_dim) {
            return Err(JudgeError::ShapeMismatch {
                context: "feature fusion (numeric width)".to_string(),
                expected: numeric_dim,
                actual: row.len(),
            });
        }
        if let Some(&col) = text.iter().filter_map(|r| r.indices.last()).find(|&&c| c >= text_dim) {
            return Err(JudgeError::ShapeMismatch {
                context: "feature fusion (text column out of range)".to_string(),
                expected: text_dim,
                actual: col + 1,
            });
        }

        let rows = text
            .into_iter()
            .zip(numeric)
            .map(|(text, numeric)| FusedRow { text, numeric })
            .collect();

        Ok(FeatureMatrix {
            text_dim,
            numeric_dim,
            rows,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.text_dim + self.numeric_dim
    }

    pub fn text_dim(&self) -> usize {
        self.text_dim
    }

    pub fn numeric_dim(&self) -> usize {
        self.numeric_dim
    }

    pub fn row(&self, index: usize) -> &FusedRow {
        &self.rows[index]
    }

    /// Value at (`row`, `col`) in the fused column layout
    pub fn value(&self, row: usize, col: usize) -> f64 {
        let row = &self.rows[row];
        if col < self.text_dim {
            row.text.get(col)
        } else {
            row.numeric[col - self.text_dim]
        }
    }

    /// Dense copy of a row, mostly for inspection
    pub fn dense_row(&self, row: usize) -> Vec<f64> {
        (0..self.n_cols()).map(|c| self.value(row, c)).collect()
    }
}

/// Vocabulary and standardization parameters, fit once on training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedFeatures {
    pub vocabulary: Vocabulary,
    pub standardization: Standardization,
}

impl FittedFeatures {
    pub fn n_cols(&self) -> usize {
        self.vocabulary.len() + self.standardization.dim()
    }
}

/// Text and numeric branches with the vectorizer that fits the text branch
pub struct FeaturePipeline<T, N> {
    text: T,
    numeric: N,
    vectorizer: TfidfVectorizer,
}

impl FeaturePipeline<StatementText, StatementStatistics> {
    /// Default producers with the configured vectorizer
    pub fn standard(config: &FeatureConfig) -> Self {
        Self::new(StatementText, StatementStatistics::new(), config)
    }
}

impl<T: TextProducer, N: NumericProducer> FeaturePipeline<T, N> {
    pub fn new(text: T, numeric: N, config: &FeatureConfig) -> Self {
        FeaturePipeline {
            text,
            numeric,
            vectorizer: TfidfVectorizer::new(config.max_features, config.norm),
        }
    }

    /// Fit vocabulary and standardization on training statements only
    pub fn fit(&self, statements: &[&ProblemStatement]) -> Result<FittedFeatures> {
        let texts = self.extract_text(statements);
        let vocabulary = self.vectorizer.fit(&texts);

        let numeric = self.extract_numeric(statements)?;
        let standardization = Standardization::fit(&numeric, self.numeric.dim())?;

        log::info!(
            "Fitted features on {} records: {} text columns + {} numeric columns",
            statements.len(),
            vocabulary.len(),
            standardization.dim()
        );

        Ok(FittedFeatures {
            vocabulary,
            standardization,
        })
    }

    /// Produce fused rows with frozen artifacts, never refitting
    pub fn transform(
        &self,
        fitted: &FittedFeatures,
        statements: &[&ProblemStatement],
    ) -> Result<FeatureMatrix> {
        let texts = self.extract_text(statements);
        let text = fitted.vocabulary.transform(&texts);

        let numeric = self.extract_numeric(statements)?;
        let numeric = fitted.standardization.transform(&numeric)?;

        FeatureMatrix::fuse(
            fitted.vocabulary.len(),
            text,
            fitted.standardization.dim(),
            numeric,
        )
    }

    fn extract_text(&self, statements: &[&ProblemStatement]) -> Vec<String> {
        statements.iter().map(|s| self.text.extract(s)).collect()
    }

    fn extract_numeric(&self, statements: &[&ProblemStatement]) -> Result<Vec<Vec<f64>>> {
        let dim = self.numeric.dim();
        let mut replaced = 0;
        let mut rows = Vec::with_capacity(statements.len());
        for statement in statements {
            let mut row = self.numeric.extract(statement);
            if row.len() != dim {
                return Err(JudgeError::ShapeMismatch {
                    context: "handcrafted feature producer output".to_string(),
                    expected: dim,
                    actual: row.len(),
                });
            }
            replaced += sanitize(&mut row);
            rows.push(row);
        }
        if replaced > 0 {
            log::warn!("Replaced {} non-finite handcrafted feature values with 0", replaced);
        }
        Ok(rows)
    }
}
