//! Prediction and inference
//!
//! Load trained pipelines and score new problem statements.

pub mod inference;

pub use inference::{format_csv, format_predictions, Predictor};
