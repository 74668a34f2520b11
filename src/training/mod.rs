//! Model training
//!
//! Seeded partitioning, the dual-head training run, and held-out metrics.

pub mod metrics;
pub mod partition;
pub mod trainer;

pub use metrics::{
    evaluate_classifier, evaluate_regressor, ClassificationMetrics, ConfusionMatrix,
    EvaluationReport, RegressionMetrics,
};
pub use partition::{split, Partition};
pub use trainer::{TrainedPipelines, Trainer};
