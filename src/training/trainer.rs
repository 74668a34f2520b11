//! End-to-end training run
//!
//! One run computes the partition once, fits the feature artifacts on the
//! training rows, trains both forests on the same fused matrix and scores
//! them on the held-out rows.

use crate::data::ProblemDataset;
use crate::features::{
    FeaturePipeline, NumericProducer, StatementStatistics, StatementText, TextProducer,
};
use crate::model::{
    ClassifierPipeline, ForestClassifier, ForestParams, ForestRegressor, RegressorPipeline,
};
use crate::training::metrics::{evaluate_classifier, evaluate_regressor, EvaluationReport};
use crate::training::partition::{self, Partition};
use crate::{Config, Result};
use chrono::Utc;

/// Output of a successful run, ready to be persisted
#[derive(Debug, Clone)]
pub struct TrainedPipelines {
    pub classifier: ClassifierPipeline,
    pub regressor: RegressorPipeline,
    pub partition: Partition,
    pub report: EvaluationReport,
}

/// Trains the classification and regression heads together
pub struct Trainer<T, N> {
    features: FeaturePipeline<T, N>,
    config: Config,
}

impl Trainer<StatementText, StatementStatistics> {
    pub fn new(config: Config) -> Self {
        Trainer {
            features: FeaturePipeline::standard(&config.features),
            config,
        }
    }
}

impl<T: TextProducer, N: NumericProducer> Trainer<T, N> {
    /// Use custom feature producers
    pub fn with_features(features: FeaturePipeline<T, N>, config: Config) -> Self {
        Trainer { features, config }
    }

    pub fn features(&self) -> &FeaturePipeline<T, N> {
        &self.features
    }

    pub fn run(&self, dataset: &ProblemDataset) -> Result<TrainedPipelines> {
        let training = &self.config.training;
        let partition = partition::split(dataset.len(), training.holdout_fraction, training.seed)?;

        let train_statements = dataset.statements(&partition.train);
        let test_statements = dataset.statements(&partition.test);

        let fitted = self.features.fit(&train_statements)?;
        let x_train = self.features.transform(&fitted, &train_statements)?;
        let x_test = self.features.transform(&fitted, &test_statements)?;

        let classifier = ForestClassifier::train(
            &x_train,
            &dataset.class_labels(&partition.train),
            &ForestParams::from_config(&self.config.classifier, training.seed, training.threads),
        )?;

        let regressor = ForestRegressor::train(
            &x_train,
            &dataset.scores(&partition.train),
            &ForestParams::from_config(&self.config.regressor, training.seed, training.threads),
        )?;

        let classification =
            evaluate_classifier(&classifier, &x_test, &dataset.class_labels(&partition.test))?;
        let regression =
            evaluate_regressor(&regressor, &x_test, &dataset.scores(&partition.test))?;

        log::info!(
            "Held-out accuracy {:.4}, MAE {:.4}, RMSE {:.4}",
            classification.accuracy,
            regression.mean_absolute_error,
            regression.root_mean_squared_error
        );

        let trained_at = Utc::now();
        let report = EvaluationReport {
            created_at: trained_at,
            seed: training.seed,
            train_records: partition.train.len(),
            test_records: partition.test.len(),
            test_indices: partition.sorted_test(),
            text_features: x_train.text_dim(),
            numeric_features: x_train.numeric_dim(),
            classification,
            regression,
        };

        Ok(TrainedPipelines {
            classifier: ClassifierPipeline {
                features: fitted.clone(),
                model: classifier,
                trained_at,
            },
            regressor: RegressorPipeline {
                features: fitted,
                model: regressor,
                trained_at,
            },
            partition,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JudgeError, ProblemRecord, ProblemStatement};

    /// Reads the record index back out of the title
    struct TitleNumber;

    impl NumericProducer for TitleNumber {
        fn dim(&self) -> usize {
            1
        }

        fn extract(&self, statement: &ProblemStatement) -> Vec<f64> {
            vec![statement.title.parse().unwrap_or(0.0)]
        }
    }

    struct Constant;

    impl NumericProducer for Constant {
        fn dim(&self) -> usize {
            1
        }

        fn extract(&self, _statement: &ProblemStatement) -> Vec<f64> {
            vec![7.0]
        }
    }

    fn description_only(s: &ProblemStatement) -> String {
        s.description.clone()
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.classifier.n_trees = 15;
        config.regressor.n_trees = 15;
        config
    }

    /// Ten records, five per class, with class-specific vocabulary
    fn two_class_dataset() -> ProblemDataset {
        let records = (0..10)
            .map(|i| {
                let (class, words, score) = if i % 2 == 0 {
                    ("A", "array prefix sum loop", 2.0 + i as f64 * 0.1)
                } else {
                    ("B", "segment tree lazy propagation", 8.0 + i as f64 * 0.1)
                };
                ProblemRecord {
                    statement: ProblemStatement {
                        title: i.to_string(),
                        description: format!("{} uniq{}", words, i),
                        ..Default::default()
                    },
                    problem_class: class.to_string(),
                    problem_score: score,
                }
            })
            .collect();
        ProblemDataset::from_records(records)
    }

    #[test]
    fn test_two_class_scenario() {
        let dataset = two_class_dataset();
        let trained = Trainer::new(small_config()).run(&dataset).unwrap();

        assert_eq!(trained.partition.test.len(), 2);
        assert_eq!(trained.partition.train.len(), 8);
        assert_eq!(trained.report.test_records, 2);

        let cm = &trained.report.classification.confusion_matrix;
        assert_eq!(cm.total(), 2);
        assert_eq!(cm.labels, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(cm.counts.len(), 2);
        assert!(cm.counts.iter().all(|row| row.len() == 2));
        let held_out = dataset.class_labels(&trained.partition.test);
        for (row, label) in cm.labels.iter().enumerate() {
            let expected = held_out.iter().filter(|l| *l == label).count();
            assert_eq!(cm.row_total(row), expected);
        }
        assert_eq!(trained.report.regression.count, 2);

        let accuracy = trained.report.classification.accuracy;
        assert!((0.0..=1.0).contains(&accuracy));
        assert!(trained.report.regression.mean_absolute_error >= 0.0);
        assert!(trained.report.regression.root_mean_squared_error >= 0.0);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let dataset = two_class_dataset();
        let trainer = Trainer::new(small_config());
        let a = trainer.run(&dataset).unwrap();
        let b = trainer.run(&dataset).unwrap();

        assert_eq!(a.partition, b.partition);
        assert_eq!(a.classifier.features, b.classifier.features);
        assert_eq!(a.classifier.model, b.classifier.model);
        assert_eq!(a.regressor.model, b.regressor.model);
        assert_eq!(a.report.classification, b.report.classification);
        assert_eq!(a.report.regression, b.report.regression);
    }

    #[test]
    fn test_both_heads_share_partition_and_features() {
        let dataset = two_class_dataset();
        let trained = Trainer::new(small_config()).run(&dataset).unwrap();

        assert_eq!(trained.classifier.features, trained.regressor.features);
        assert_eq!(trained.report.test_indices, trained.partition.sorted_test());
        assert_eq!(
            trained.report.classification.count,
            trained.report.regression.count
        );
        assert_eq!(
            trained.classifier.model.n_features(),
            trained.regressor.model.n_features()
        );
    }

    #[test]
    fn test_features_fit_on_training_rows_only() {
        let dataset = two_class_dataset();
        let pipeline = FeaturePipeline::new(
            description_only,
            TitleNumber,
            &small_config().features,
        );
        let trained = Trainer::with_features(pipeline, small_config())
            .run(&dataset)
            .unwrap();

        let fitted = &trained.classifier.features;
        for &i in &trained.partition.test {
            assert!(!fitted.vocabulary.contains(&format!("uniq{}", i)));
        }
        for &i in &trained.partition.train {
            assert!(fitted.vocabulary.contains(&format!("uniq{}", i)));
        }

        let train = &trained.partition.train;
        let expected = train.iter().map(|&i| i as f64).sum::<f64>() / train.len() as f64;
        assert!((fitted.standardization.mean[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_constant_feature_trains() {
        let dataset = two_class_dataset();
        let pipeline = FeaturePipeline::new(description_only, Constant, &small_config().features);
        let trainer = Trainer::with_features(pipeline, small_config());
        let trained = trainer.run(&dataset).unwrap();

        let fitted = &trained.regressor.features;
        assert!(fitted.standardization.is_constant(0));

        let statements = dataset.statements(&[0, 1, 2]);
        let x = trainer.features().transform(fitted, &statements).unwrap();
        for row in 0..x.n_rows() {
            assert!(x.dense_row(row).iter().all(|v| v.is_finite()));
        }
        assert_eq!(x.value(0, x.text_dim()), 0.0);
    }

    #[test]
    fn test_too_few_records() {
        let mut records = two_class_dataset().records().to_vec();
        records.truncate(1);
        let dataset = ProblemDataset::from_records(records);
        let err = Trainer::new(small_config()).run(&dataset).unwrap_err();
        assert!(matches!(err, JudgeError::InvalidPartition { .. }));
    }
}
