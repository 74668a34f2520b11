//! Per-record feature producers
//!
//! Producers are pure functions of a single statement, so they can be applied
//! row by row without reordering. The pipeline only relies on the trait
//! contracts; the concrete producers here are the defaults used by the CLI.

use crate::ProblemStatement;
use regex::Regex;

/// Maps a statement to the text that gets vectorized
pub trait TextProducer: Send + Sync {
    fn extract(&self, statement: &ProblemStatement) -> String;
}

impl<F> TextProducer for F
where
    F: Fn(&ProblemStatement) -> String + Send + Sync,
{
    fn extract(&self, statement: &ProblemStatement) -> String {
        self(statement)
    }
}

/// Maps a statement to a fixed-length vector of handcrafted statistics
pub trait NumericProducer: Send + Sync {
    /// Length of every vector returned by [`NumericProducer::extract`]
    fn dim(&self) -> usize;

    fn extract(&self, statement: &ProblemStatement) -> Vec<f64>;
}

/// All five text fields joined with newlines
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementText;

impl TextProducer for StatementText {
    fn extract(&self, statement: &ProblemStatement) -> String {
        [
            statement.title.as_str(),
            statement.description.as_str(),
            statement.input_description.as_str(),
            statement.output_description.as_str(),
            statement.sample_io.as_str(),
        ]
        .join("\n")
    }
}

/// Length, numeric-literal and notation statistics of a statement
#[derive(Debug, Clone)]
pub struct StatementStatistics {
    number: Regex,
    power: Regex,
}

impl StatementStatistics {
    pub const DIM: usize = 9;

    pub const NAMES: [&'static str; Self::DIM] = [
        "description_chars_log",
        "description_words_log",
        "input_chars_log",
        "output_chars_log",
        "sample_io_chars_log",
        "sample_io_lines",
        "numeric_literals",
        "max_magnitude_log10",
        "math_symbols",
    ];

    pub fn new() -> Self {
        StatementStatistics {
            number: Regex::new(r"\d+(?:\.\d+)?").expect("number pattern is valid"),
            power: Regex::new(r"(\d+)\s*\^\s*\{?\s*(\d+)").expect("power pattern is valid"),
        }
    }

    /// log10 of the largest quantity mentioned, reading `10^5` as 1e5
    fn max_magnitude(&self, text: &str) -> f64 {
        let mut best = 0.0f64;
        for m in self.number.find_iter(text) {
            if let Ok(v) = m.as_str().parse::<f64>() {
                best = best.max((1.0 + v).log10());
            }
        }
        for caps in self.power.captures_iter(text) {
            let base = caps[1].parse::<f64>().unwrap_or(0.0);
            let exp = caps[2].parse::<f64>().unwrap_or(0.0);
            if base > 0.0 {
                best = best.max(exp * base.log10());
            }
        }
        best
    }
}

impl Default for StatementStatistics {
    fn default() -> Self {
        Self::new()
    }
}

fn ln_len(text: &str) -> f64 {
    (1.0 + text.chars().count() as f64).ln()
}

impl NumericProducer for StatementStatistics {
    fn dim(&self) -> usize {
        Self::DIM
    }

    fn extract(&self, statement: &ProblemStatement) -> Vec<f64> {
        let all_text = StatementText.extract(statement);
        let words = statement.description.split_whitespace().count();
        let sample_lines = statement.sample_io.lines().filter(|l| !l.trim().is_empty()).count();
        let literals = self.number.find_iter(&all_text).count();
        let symbols = all_text
            .chars()
            .filter(|c| {
                matches!(c, '$' | '^' | '≤' | '≥' | '<' | '>' | '=' | '+' | '*' | '%' | '\\')
            })
            .count();

        vec![
            ln_len(&statement.description),
            (1.0 + words as f64).ln(),
            ln_len(&statement.input_description),
            ln_len(&statement.output_description),
            ln_len(&statement.sample_io),
            sample_lines as f64,
            literals as f64,
            self.max_magnitude(&all_text),
            symbols as f64,
        ]
    }
}
