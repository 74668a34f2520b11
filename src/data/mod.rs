//! Data ingestion and storage
//!
//! JSON-lines corpus loading and SQLite model persistence.

pub mod dataset;
pub mod store;

pub use dataset::ProblemDataset;
pub use store::{ModelStore, CLASSIFIER_ID, REGRESSOR_ID};
