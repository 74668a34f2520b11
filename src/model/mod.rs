//! Tree ensembles
//!
//! - Criterion: Gini and variance split bookkeeping
//! - Tree: CART growth over fused feature rows
//! - Forest: bagged classifier and regressor
//! - Pipeline: fitted features bundled with a forest for persistence

pub mod criterion;
pub mod forest;
pub mod pipeline;
pub mod tree;

pub use forest::{ForestClassifier, ForestParams, ForestRegressor};
pub use pipeline::{ClassifierPipeline, RegressorPipeline};
pub use tree::DecisionTree;

use serde::{Deserialize, Serialize};

/// How many feature dimensions each node draws as split candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    /// floor(sqrt(d))
    Sqrt,
    /// floor(log2(d))
    Log2,
    /// floor(d / 3)
    Third,
    /// every dimension
    All,
}

impl MaxFeatures {
    /// Candidate count for `n_features` dimensions, at least one when any exist
    pub fn resolve(&self, n_features: usize) -> usize {
        if n_features == 0 {
            return 0;
        }
        let d = n_features as f64;
        let k = match self {
            MaxFeatures::Sqrt => d.sqrt().floor() as usize,
            MaxFeatures::Log2 => d.log2().floor() as usize,
            MaxFeatures::Third => n_features / 3,
            MaxFeatures::All => n_features,
        };
        k.clamp(1, n_features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_max_features() {
        assert_eq!(MaxFeatures::Sqrt.resolve(3009), 54);
        assert_eq!(MaxFeatures::Third.resolve(3009), 1003);
        assert_eq!(MaxFeatures::Log2.resolve(1024), 10);
        assert_eq!(MaxFeatures::All.resolve(7), 7);
        assert_eq!(MaxFeatures::Third.resolve(2), 1);
        assert_eq!(MaxFeatures::Sqrt.resolve(0), 0);
    }
}
