//! Scoring unseen problem statements with the persisted pipelines

use crate::data::{ModelStore, CLASSIFIER_ID, REGRESSOR_ID};
use crate::features::{
    FeaturePipeline, NumericProducer, StatementStatistics, StatementText, TextProducer,
};
use crate::model::{ClassifierPipeline, RegressorPipeline};
use crate::{FeatureConfig, Prediction, ProblemStatement, Result};

/// Predictor holding both trained heads
pub struct Predictor<T, N> {
    classifier: ClassifierPipeline,
    regressor: RegressorPipeline,
    features: FeaturePipeline<T, N>,
}

impl Predictor<StatementText, StatementStatistics> {
    /// Load both pipelines from the store with the default producers
    pub fn load(store: &ModelStore, config: &FeatureConfig) -> Result<Self> {
        let classifier = store.load(CLASSIFIER_ID)?;
        let regressor = store.load(REGRESSOR_ID)?;
        Ok(Self::new(
            classifier,
            regressor,
            FeaturePipeline::standard(config),
        ))
    }
}

impl<T: TextProducer, N: NumericProducer> Predictor<T, N> {
    pub fn new(
        classifier: ClassifierPipeline,
        regressor: RegressorPipeline,
        features: FeaturePipeline<T, N>,
    ) -> Self {
        Predictor {
            classifier,
            regressor,
            features,
        }
    }

    /// Predict class and score for each statement, in input order
    pub fn predict(&self, statements: &[ProblemStatement]) -> Result<Vec<Prediction>> {
        let refs: Vec<&ProblemStatement> = statements.iter().collect();
        let classes = self.classifier.predict(&self.features, &refs)?;
        let scores = self.regressor.predict(&self.features, &refs)?;

        Ok(statements
            .iter()
            .zip(classes)
            .zip(scores)
            .map(|((statement, problem_class), problem_score)| Prediction {
                title: statement.title.clone(),
                problem_class,
                problem_score,
            })
            .collect())
    }
}

/// Format predictions as a table for display
pub fn format_predictions(predictions: &[Prediction]) -> String {
    let title_width = predictions
        .iter()
        .map(|p| p.title.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(5, 48);
    let class_width = predictions
        .iter()
        .map(|p| p.problem_class.chars().count())
        .max()
        .unwrap_or(0)
        .max(5);

    let mut out = format!(
        "{:<tw$}  {:<cw$}  {:>8}\n",
        "Title",
        "Class",
        "Score",
        tw = title_width,
        cw = class_width
    );
    out.push_str(&"─".repeat(title_width + class_width + 12));
    out.push('\n');
    for p in predictions {
        out.push_str(&format!(
            "{:<tw$}  {:<cw$}  {:>8.3}\n",
            truncate(&p.title, title_width),
            p.problem_class,
            p.problem_score,
            tw = title_width,
            cw = class_width
        ));
    }
    out
}

/// Format predictions as CSV with a header row
pub fn format_csv(predictions: &[Prediction]) -> String {
    let mut out = String::from("title,problem_class,problem_score\n");
    for p in predictions {
        out.push_str(&format!(
            "{},{},{}\n",
            csv_field(&p.title),
            csv_field(&p.problem_class),
            p.problem_score
        ));
    }
    out
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut t: String = s.chars().take(width.saturating_sub(1)).collect();
    t.push('…');
    t
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
