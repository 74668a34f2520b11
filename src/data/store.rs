//! SQLite model store
//!
//! Pipelines are stored as JSON payloads keyed by identifier, next to a log of
//! evaluation reports.

use crate::training::{EvaluationReport, TrainedPipelines};
use crate::{JudgeError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Identifier of the persisted classification pipeline
pub const CLASSIFIER_ID: &str = "classifier";
/// Identifier of the persisted regression pipeline
pub const REGRESSOR_ID: &str = "regressor";

/// Store connection and operations
pub struct ModelStore {
    conn: Connection,
}

impl ModelStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = ModelStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = ModelStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS models (
                identifier TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS evaluations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                report TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_evaluations_created ON evaluations(created_at);
            "#,
        )?;
        Ok(())
    }

    // ==================== Models ====================

    /// Insert or replace the payload stored under `identifier`
    pub fn save<T: Serialize>(&self, identifier: &str, model: &T) -> Result<()> {
        let payload = serde_json::to_string(model)?;
        Self::write_model(&self.conn, identifier, &payload)?;
        log::debug!("Saved `{}` ({} bytes)", identifier, payload.len());
        Ok(())
    }

    /// Load the payload stored under `identifier`
    pub fn load<T: DeserializeOwned>(&self, identifier: &str) -> Result<T> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM models WHERE identifier = ?1",
                params![identifier],
                |row| row.get(0),
            )
            .optional()?;

        let payload = payload.ok_or_else(|| JudgeError::NoModel(identifier.to_string()))?;
        Ok(serde_json::from_str(&payload)?)
    }

    pub fn contains(&self, identifier: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM models WHERE identifier = ?1",
            params![identifier],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Stored models, ordered by identifier
    pub fn list(&self) -> Result<Vec<StoredModel>> {
        let mut stmt = self.conn.prepare(
            "SELECT identifier, created_at, LENGTH(payload) FROM models ORDER BY identifier",
        )?;

        let models = stmt
            .query_map([], |row| {
                let identifier: String = row.get(0)?;
                let created_at: String = row.get(1)?;
                let size: i64 = row.get(2)?;
                Ok(StoredModel {
                    identifier,
                    created_at: parse_timestamp(&created_at),
                    payload_bytes: size as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(models)
    }

    /// Persist both pipelines and their report atomically
    pub fn save_pipelines(&self, trained: &TrainedPipelines) -> Result<()> {
        let classifier = serde_json::to_string(&trained.classifier)?;
        let regressor = serde_json::to_string(&trained.regressor)?;
        let report = serde_json::to_string(&trained.report)?;

        let tx = self.conn.unchecked_transaction()?;
        Self::write_model(&tx, CLASSIFIER_ID, &classifier)?;
        Self::write_model(&tx, REGRESSOR_ID, &regressor)?;
        Self::write_report(&tx, &trained.report.created_at, &report)?;
        tx.commit()?;

        log::info!(
            "Saved `{}` and `{}` pipelines ({} + {} bytes)",
            CLASSIFIER_ID,
            REGRESSOR_ID,
            classifier.len(),
            regressor.len()
        );
        Ok(())
    }

    fn write_model(conn: &Connection, identifier: &str, payload: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO models (identifier, payload, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(identifier) DO UPDATE SET
                payload = excluded.payload,
                created_at = excluded.created_at",
            params![identifier, payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ==================== Evaluations ====================

    fn write_report(conn: &Connection, created_at: &DateTime<Utc>, json: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO evaluations (created_at, report) VALUES (?1, ?2)",
            params![created_at.to_rfc3339(), json],
        )?;
        Ok(())
    }

    /// Most recently recorded evaluation report
    pub fn latest_report(&self) -> Result<Option<EvaluationReport>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT report FROM evaluations ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    // ==================== Statistics ====================

    pub fn get_stats(&self) -> Result<StoreStats> {
        let model_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM models", [], |row| row.get(0))?;

        let evaluation_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM evaluations", [], |row| row.get(0))?;

        let last_trained: Option<String> = self
            .conn
            .query_row("SELECT MAX(created_at) FROM models", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(StoreStats {
            model_count: model_count as usize,
            evaluation_count: evaluation_count as usize,
            last_trained: last_trained.as_deref().and_then(parse_timestamp),
        })
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Summary row of a stored model
#[derive(Debug, Clone)]
pub struct StoredModel {
    pub identifier: String,
    pub created_at: Option<DateTime<Utc>>,
    pub payload_bytes: usize,
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub model_count: usize,
    pub evaluation_count: usize,
    pub last_trained: Option<DateTime<Utc>>,
}
