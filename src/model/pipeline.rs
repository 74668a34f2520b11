//! Persistable end-to-end pipelines
//!
//! Each pipeline carries the frozen vocabulary and standardization next to
//! its forest, so a restored pipeline transforms raw statements exactly as
//! during training.

use super::forest::{ForestClassifier, ForestRegressor};
use crate::features::{FeaturePipeline, FittedFeatures, NumericProducer, TextProducer};
use crate::{ProblemStatement, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierPipeline {
    pub features: FittedFeatures,
    pub model: ForestClassifier,
    pub trained_at: DateTime<Utc>,
}

impl ClassifierPipeline {
    pub fn predict<T, N>(
        &self,
        producers: &FeaturePipeline<T, N>,
        statements: &[&ProblemStatement],
    ) -> Result<Vec<String>>
    where
        T: TextProducer,
        N: NumericProducer,
    {
        let x = producers.transform(&self.features, statements)?;
        self.model.predict(&x)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorPipeline {
    pub features: FittedFeatures,
    pub model: ForestRegressor,
    pub trained_at: DateTime<Utc>,
}

impl RegressorPipeline {
    pub fn predict<T, N>(
        &self,
        producers: &FeaturePipeline<T, N>,
        statements: &[&ProblemStatement],
    ) -> Result<Vec<f64>>
    where
        T: TextProducer,
        N: NumericProducer,
    {
        let x = producers.transform(&self.features, statements)?;
        self.model.predict(&x)
    }
}
