//! Bagged random forests for classification and regression
//!
//! Tree `i` draws its bootstrap sample and split candidates from an RNG seeded
//! with `seed + i`. Trees are grown on a rayon pool and collected in index
//! order, so any thread count yields the same forest.

use super::criterion::{Criterion, Gini, Variance};
use super::tree::{DecisionTree, TreeParams};
use super::MaxFeatures;
use crate::features::FeatureMatrix;
use crate::{ForestConfig, JudgeError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ensemble training settings
#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_features: MaxFeatures,
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
    pub seed: u64,
    /// Dedicated pool size; rayon's global pool when `None`
    pub threads: Option<usize>,
}

impl ForestParams {
    pub fn from_config(config: &ForestConfig, seed: u64, threads: Option<usize>) -> Self {
        ForestParams {
            n_trees: config.n_trees,
            max_features: config.max_features,
            min_samples_leaf: config.min_samples_leaf,
            max_depth: config.max_depth,
            seed,
            threads,
        }
    }
}

fn check_training_set(
    features: &FeatureMatrix,
    n_labels: usize,
    params: &ForestParams,
) -> Result<()> {
    if n_labels != features.n_rows() {
        return Err(JudgeError::ShapeMismatch {
            context: "training labels vs feature rows".to_string(),
            expected: features.n_rows(),
            actual: n_labels,
        });
    }
    if features.n_rows() == 0 {
        return Err(JudgeError::TrainingFailure("empty training set".to_string()));
    }
    if params.n_trees == 0 {
        return Err(JudgeError::TrainingFailure("forest needs at least one tree".to_string()));
    }
    Ok(())
}

fn check_columns(features: &FeatureMatrix, expected: usize) -> Result<()> {
    if features.n_cols() != expected {
        return Err(JudgeError::ShapeMismatch {
            context: "prediction feature columns".to_string(),
            expected,
            actual: features.n_cols(),
        });
    }
    Ok(())
}

fn grow_forest<C>(
    features: &FeatureMatrix,
    criterion: &C,
    params: &ForestParams,
) -> Result<Vec<DecisionTree<C::Leaf>>>
where
    C: Criterion,
    C::Leaf: Send,
{
    let n = features.n_rows();
    let tree_params = TreeParams {
        max_features: params.max_features.resolve(features.n_cols()),
        min_samples_leaf: params.min_samples_leaf,
        max_depth: params.max_depth,
    };

    let grow = |index: usize| {
        let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(index as u64));
        let samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
        DecisionTree::grow(features, criterion, samples, &tree_params, &mut rng)
    };

    let trees: Vec<DecisionTree<C::Leaf>> = match params.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| JudgeError::TrainingFailure(format!("thread pool: {}", e)))?;
            pool.install(|| (0..params.n_trees).into_par_iter().map(grow).collect())
        }
        None => (0..params.n_trees).into_par_iter().map(grow).collect(),
    };
    Ok(trees)
}

/// Random forest over string class labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestClassifier {
    /// Class alphabet, sorted; leaves store indices into it
    classes: Vec<String>,
    trees: Vec<DecisionTree<usize>>,
    n_features: usize,
    degenerate: bool,
}

impl ForestClassifier {
    pub fn train(
        features: &FeatureMatrix,
        labels: &[String],
        params: &ForestParams,
    ) -> Result<Self> {
        check_training_set(features, labels.len(), params)?;

        let classes: Vec<String> = labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let encoded: Vec<usize> = labels
            .iter()
            .map(|l| classes.binary_search(l).unwrap_or_default())
            .collect();

        log::info!(
            "Training classifier: {} trees, {} rows, {} features, {} classes",
            params.n_trees,
            features.n_rows(),
            features.n_cols(),
            classes.len()
        );

        let gini = Gini::new(&encoded, classes.len());
        let trees = grow_forest(features, &gini, params)?;

        let degenerate = trees.iter().all(|t| t.is_stump());
        if degenerate {
            log::warn!(
                "Classifier training failure: no tree found a valid split ({} classes); predictions are constant",
                classes.len()
            );
        }

        Ok(ForestClassifier {
            classes,
            trees,
            n_features: features.n_cols(),
            degenerate,
        })
    }

    /// Class index with the most tree votes, lowest index on ties
    fn vote(&self, features: &FeatureMatrix, row: usize) -> usize {
        let mut votes = vec![0usize; self.classes.len()];
        for tree in &self.trees {
            votes[*tree.predict(features, row)] += 1;
        }
        let mut best = 0;
        for (class, &count) in votes.iter().enumerate() {
            if count > votes[best] {
                best = class;
            }
        }
        best
    }

    pub fn predict(&self, features: &FeatureMatrix) -> Result<Vec<String>> {
        check_columns(features, self.n_features)?;
        Ok((0..features.n_rows())
            .map(|row| self.classes[self.vote(features, row)].clone())
            .collect())
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Whether every tree is a single leaf
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }
}

/// Random forest over real-valued targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestRegressor {
    trees: Vec<DecisionTree<f64>>,
    n_features: usize,
    degenerate: bool,
}

impl ForestRegressor {
    pub fn train(
        features: &FeatureMatrix,
        targets: &[f64],
        params: &ForestParams,
    ) -> Result<Self> {
        check_training_set(features, targets.len(), params)?;
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(JudgeError::TrainingFailure(
                "regression targets must be finite".to_string(),
            ));
        }

        log::info!(
            "Training regressor: {} trees, {} rows, {} features",
            params.n_trees,
            features.n_rows(),
            features.n_cols()
        );

        let variance = Variance::new(targets);
        let trees = grow_forest(features, &variance, params)?;

        let degenerate = trees.iter().all(|t| t.is_stump());
        if degenerate {
            log::warn!(
                "Regressor training failure: no tree found a valid split; predictions are constant per tree"
            );
        }

        Ok(ForestRegressor {
            trees,
            n_features: features.n_cols(),
            degenerate,
        })
    }

    fn mean_prediction(&self, features: &FeatureMatrix, row: usize) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| *t.predict(features, row)).sum();
        sum / self.trees.len() as f64
    }

    pub fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        check_columns(features, self.n_features)?;
        Ok((0..features.n_rows())
            .map(|row| self.mean_prediction(features, row))
            .collect())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::SparseVector;

    fn params(n_trees: usize, seed: u64, threads: Option<usize>) -> ForestParams {
        ForestParams {
            n_trees,
            max_features: MaxFeatures::Sqrt,
            min_samples_leaf: 1,
            max_depth: None,
            seed,
            threads,
        }
    }

    fn all_features(n_trees: usize) -> ForestParams {
        ForestParams {
            max_features: MaxFeatures::All,
            ..params(n_trees, 42, None)
        }
    }

    /// A sparse text column, an informative numeric column and a noise column
    fn dataset() -> (FeatureMatrix, Vec<String>, Vec<f64>) {
        let mut text = Vec::new();
        let mut numeric = Vec::new();
        let mut labels = Vec::new();
        let mut scores = Vec::new();
        for i in 0..40 {
            let hard = i % 2 == 0;
            let x = i as f64 / 10.0;
            text.push(if hard {
                SparseVector {
                    indices: vec![0],
                    values: vec![1.0],
                }
            } else {
                SparseVector::default()
            });
            numeric.push(vec![if hard { 5.0 + x } else { x }, (i % 7) as f64]);
            labels.push(if hard { "hard" } else { "easy" }.to_string());
            scores.push(if hard { 8.0 + x } else { 2.0 + x });
        }
        let matrix = FeatureMatrix::fuse(1, text, 2, numeric).unwrap();
        (matrix, labels, scores)
    }

    #[test]
    fn test_classifier_fits_training_data() {
        let (x, labels, _) = dataset();
        let model = ForestClassifier::train(&x, &labels, &all_features(25)).unwrap();
        assert_eq!(model.classes(), &["easy".to_string(), "hard".to_string()]);
        assert_eq!(model.n_trees(), 25);
        assert!(!model.is_degenerate());
        assert_eq!(model.predict(&x).unwrap(), labels);
    }

    #[test]
    fn test_regressor_tracks_targets() {
        let (x, _, scores) = dataset();
        let model = ForestRegressor::train(&x, &scores, &all_features(25)).unwrap();
        let predictions = model.predict(&x).unwrap();
        let mae: f64 = predictions
            .iter()
            .zip(&scores)
            .map(|(p, y)| (p - y).abs())
            .sum::<f64>()
            / scores.len() as f64;
        assert!(mae < 1.0, "mae {}", mae);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, labels, scores) = dataset();
        let a = ForestClassifier::train(&x, &labels, &params(10, 7, None)).unwrap();
        let b = ForestClassifier::train(&x, &labels, &params(10, 7, None)).unwrap();
        assert_eq!(a, b);

        let a = ForestRegressor::train(&x, &scores, &params(10, 7, None)).unwrap();
        let b = ForestRegressor::train(&x, &scores, &params(10, 7, None)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_thread_count_does_not_change_forest() {
        let (x, labels, scores) = dataset();
        let single = ForestClassifier::train(&x, &labels, &params(12, 3, Some(1))).unwrap();
        let many = ForestClassifier::train(&x, &labels, &params(12, 3, Some(4))).unwrap();
        assert_eq!(single, many);

        let single = ForestRegressor::train(&x, &scores, &params(12, 3, Some(1))).unwrap();
        let many = ForestRegressor::train(&x, &scores, &params(12, 3, Some(4))).unwrap();
        assert_eq!(single, many);
    }

    #[test]
    fn test_single_class_gives_constant_model() {
        let (x, _, _) = dataset();
        let labels = vec!["medium".to_string(); x.n_rows()];
        let model = ForestClassifier::train(&x, &labels, &params(5, 1, None)).unwrap();
        assert!(model.is_degenerate());
        assert!(model.predict(&x).unwrap().iter().all(|p| p == "medium"));
    }

    #[test]
    fn test_constant_targets_give_degenerate_regressor() {
        let (x, _, _) = dataset();
        for c in [7.7, 0.1, 1.0 / 3.0, 123.456, 1e6 + 0.1] {
            let targets = vec![c; x.n_rows()];
            let model = ForestRegressor::train(&x, &targets, &all_features(5)).unwrap();
            assert!(model.is_degenerate(), "target {}", c);
            let tolerance = 1e-9 * c.abs().max(1.0);
            assert!(model.predict(&x).unwrap().iter().all(|p| (p - c).abs() < tolerance));
        }
    }

    #[test]
    fn test_label_count_mismatch() {
        let (x, labels, _) = dataset();
        let err = ForestClassifier::train(&x, &labels[..10], &params(5, 1, None)).unwrap_err();
        assert!(matches!(err, JudgeError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_zero_trees_rejected() {
        let (x, _, scores) = dataset();
        let err = ForestRegressor::train(&x, &scores, &params(0, 1, None)).unwrap_err();
        assert!(matches!(err, JudgeError::TrainingFailure(_)));
    }

    #[test]
    fn test_predict_checks_columns() {
        let (x, labels, _) = dataset();
        let model = ForestClassifier::train(&x, &labels, &params(3, 1, None)).unwrap();
        let narrow =
            FeatureMatrix::fuse(0, vec![SparseVector::default()], 1, vec![vec![0.0]]).unwrap();
        assert!(matches!(model.predict(&narrow), Err(JudgeError::ShapeMismatch { .. })));
    }
}
