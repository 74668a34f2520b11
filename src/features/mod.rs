//! Feature extraction and fusion
//!
//! Turns problem statements into fused TF-IDF + standardized numeric rows.

pub mod fusion;
pub mod producers;
pub mod scaling;
pub mod tfidf;

pub use fusion::{FeatureMatrix, FeaturePipeline, FittedFeatures, FusedRow};
pub use producers::{NumericProducer, StatementStatistics, StatementText, TextProducer};
pub use scaling::Standardization;
pub use tfidf::{SparseVector, TfidfVectorizer, Vocabulary};
