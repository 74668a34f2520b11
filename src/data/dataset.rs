//! Problem corpus loading
//!
//! Reads JSON-lines records and validates every field before any feature
//! work starts. A record that is missing a field or carries an unparseable
//! label aborts the load with [`JudgeError::DataSchema`].

use crate::{JudgeError, ProblemRecord, ProblemStatement, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Text fields every record must carry, in statement order
pub const TEXT_FIELDS: [&str; 5] = [
    "title",
    "description",
    "input_description",
    "output_description",
    "sample_io",
];

pub const CLASS_FIELD: &str = "problem_class";
pub const SCORE_FIELD: &str = "problem_score";

/// Labeled problem corpus, row position is record identity
#[derive(Debug, Clone, Default)]
pub struct ProblemDataset {
    records: Vec<ProblemRecord>,
}

impl ProblemDataset {
    pub fn from_records(records: Vec<ProblemRecord>) -> Self {
        ProblemDataset { records }
    }

    /// Load a JSONL corpus from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            JudgeError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open dataset {}: {}", path.display(), e),
            ))
        })?;
        let dataset = Self::from_reader(BufReader::new(file))?;
        log::info!("Loaded {} records from {}", dataset.len(), path.display());
        Ok(dataset)
    }

    /// Parse labeled records from any line-oriented reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut records = Vec::new();
        for_each_object(reader, |line, object| {
            records.push(parse_record(object, line)?);
            Ok(())
        })?;
        Ok(ProblemDataset { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ProblemRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&ProblemRecord> {
        self.records.get(index)
    }

    /// Statements of the given rows, in the given order
    pub fn statements(&self, indices: &[usize]) -> Vec<&ProblemStatement> {
        indices.iter().map(|&i| &self.records[i].statement).collect()
    }

    /// Class labels of the given rows, in the given order
    pub fn class_labels(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .map(|&i| self.records[i].problem_class.clone())
            .collect()
    }

    /// Score labels of the given rows, in the given order
    pub fn scores(&self, indices: &[usize]) -> Vec<f64> {
        indices.iter().map(|&i| self.records[i].problem_score).collect()
    }

    /// Record count per class label
    pub fn class_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.problem_class.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Minimum, maximum and mean of `problem_score`
    pub fn score_summary(&self) -> Option<(f64, f64, f64)> {
        if self.records.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for record in &self.records {
            min = min.min(record.problem_score);
            max = max.max(record.problem_score);
            sum += record.problem_score;
        }
        Some((min, max, sum / self.records.len() as f64))
    }
}

/// Parse unlabeled statements, e.g. problems to score with a trained model
pub fn read_statements<R: BufRead>(reader: R) -> Result<Vec<ProblemStatement>> {
    let mut statements = Vec::new();
    for_each_object(reader, |line, object| {
        statements.push(parse_statement(object, line)?);
        Ok(())
    })?;
    Ok(statements)
}

fn for_each_object<R, F>(reader: R, mut handle: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(usize, &Map<String, Value>) -> Result<()>,
{
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(trimmed).map_err(|e| JudgeError::DataSchema {
            line: line_no,
            field: "<record>".to_string(),
            message: format!("invalid JSON: {}", e),
        })?;
        let object = value.as_object().ok_or_else(|| JudgeError::DataSchema {
            line: line_no,
            field: "<record>".to_string(),
            message: "expected a JSON object".to_string(),
        })?;
        handle(line_no, object)?;
    }
    Ok(())
}

fn schema_error(line: usize, field: &str, message: impl Into<String>) -> JudgeError {
    JudgeError::DataSchema {
        line,
        field: field.to_string(),
        message: message.into(),
    }
}

fn text_field(object: &Map<String, Value>, field: &str, line: usize) -> Result<String> {
    match object.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(schema_error(
            line,
            field,
            format!("expected a string, found {}", json_type(other)),
        )),
        None => Err(schema_error(line, field, "missing field")),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse the five text fields of a record
pub fn parse_statement(object: &Map<String, Value>, line: usize) -> Result<ProblemStatement> {
    Ok(ProblemStatement {
        title: text_field(object, TEXT_FIELDS[0], line)?,
        description: text_field(object, TEXT_FIELDS[1], line)?,
        input_description: text_field(object, TEXT_FIELDS[2], line)?,
        output_description: text_field(object, TEXT_FIELDS[3], line)?,
        sample_io: text_field(object, TEXT_FIELDS[4], line)?,
    })
}

/// Parse a full labeled record
pub fn parse_record(object: &Map<String, Value>, line: usize) -> Result<ProblemRecord> {
    let statement = parse_statement(object, line)?;

    let problem_class = match object.get(CLASS_FIELD) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) => return Err(schema_error(line, CLASS_FIELD, "empty label")),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        Some(other) => {
            return Err(schema_error(
                line,
                CLASS_FIELD,
                format!("expected a string or integer label, found {}", json_type(other)),
            ))
        }
        None => return Err(schema_error(line, CLASS_FIELD, "missing field")),
    };

    let problem_score = match object.get(SCORE_FIELD) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(other) => {
            return Err(schema_error(
                line,
                SCORE_FIELD,
                format!("expected a number, found {}", json_type(other)),
            ))
        }
        None => return Err(schema_error(line, SCORE_FIELD, "missing field")),
    };
    let problem_score = problem_score
        .filter(|v| v.is_finite())
        .ok_or_else(|| schema_error(line, SCORE_FIELD, "not a finite number"))?;

    Ok(ProblemRecord {
        statement,
        problem_class,
        problem_score,
    })
}
