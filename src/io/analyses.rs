//! Saved-analyses persistence.
//!
//! An analysis is a dataset source plus the ordered list of executed
//! operations that produced its current frame. Saving serializes the
//! operations to JSON inside a small sqlite database; loading re-reads the
//! source and replays the operations in order, re-resolving any join
//! right-hand sources along the way.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::config;
use crate::core::{Dataset, ExecutionMode};
use crate::errors::{Error, Result};
use crate::io::loader::{self, LoadContext};
use crate::ops::{Operation, TransformStep};

/// Row-level metadata for a saved analysis.
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub modified_at: String,
    pub operation_count: usize,
    pub dataset_path: String,
}

/// Sqlite-backed store of saved analyses, keyed by unique name.
pub struct AnalysisStore {
    conn: Connection,
}

impl AnalysisStore {
    /// Open (creating if needed) a store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS analyses (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL UNIQUE,
                description     TEXT NOT NULL DEFAULT '',
                created_at      TEXT NOT NULL,
                modified_at     TEXT NOT NULL,
                operation_count INTEGER NOT NULL,
                dataset_path    TEXT NOT NULL,
                operations      TEXT NOT NULL
            )",
        )?;
        Ok(Self { conn })
    }

    /// Open the store at its fixed user-scoped location.
    pub fn open_default() -> Result<Self> {
        Self::open(&config::analyses_db_path())
    }

    /// Save (or overwrite by name) the dataset's executed pipeline.
    pub fn save(&self, name: &str, description: &str, dataset: &Dataset) -> Result<i64> {
        let operations = serde_json::to_string(&dataset.executed_operations)?;
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO analyses
                (name, description, created_at, modified_at,
                 operation_count, dataset_path, operations)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                description = ?2,
                modified_at = ?3,
                operation_count = ?4,
                dataset_path = ?5,
                operations = ?6",
            params![
                name,
                description,
                now,
                dataset.executed_operations.len(),
                dataset.source,
                operations,
            ],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM analyses WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        info!(%name, ops = dataset.executed_operations.len(), "saved analysis");
        Ok(id)
    }

    /// All saved analyses, most recently modified first.
    pub fn list(&self) -> Result<Vec<AnalysisSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, created_at, modified_at,
                    operation_count, dataset_path
             FROM analyses ORDER BY modified_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AnalysisSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                created_at: row.get(3)?,
                modified_at: row.get(4)?,
                operation_count: row.get::<_, i64>(5)? as usize,
                dataset_path: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Reload a saved analysis: read the source again, then replay its
    /// operations in order. Replay runs eagerly so a saved pipeline is fully
    /// materialized on return; the loaded dataset keeps eager mode.
    pub fn load(&self, name: &str, ctx: &LoadContext) -> Result<Dataset> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT dataset_path, operations FROM analyses WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((dataset_path, operations)) = row else {
            return Err(Error::AnalysisNotFound(name.to_string()));
        };

        let mut operations: Vec<Operation> = serde_json::from_str(&operations)?;
        let mut dataset = loader::load_dataset(&dataset_path, ctx)?
            .with_execution_mode(ExecutionMode::Eager);
        let total = operations.len().max(1);
        for (i, mut op) in operations.drain(..).enumerate() {
            resolve_join_frame(&mut op.step, ctx)?;
            ctx.report(
                i as f64 / total as f64,
                &format!("Replaying {}", op.display),
            );
            dataset.apply_operation(op)?;
        }
        info!(%name, rows = dataset.current().height(), "loaded analysis");
        Ok(dataset)
    }

    /// Remove a saved analysis by name.
    pub fn delete(&self, name: &str) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM analyses WHERE name = ?1", params![name])?;
        if removed == 0 {
            return Err(Error::AnalysisNotFound(name.to_string()));
        }
        Ok(())
    }
}

/// Join steps serialize their right-hand source path but not the frame;
/// reload it before replay.
fn resolve_join_frame(step: &mut TransformStep, ctx: &LoadContext) -> Result<()> {
    if let TransformStep::Join {
        right_source,
        right,
        ..
    } = step
        && right.is_none()
    {
        let right_dataset = loader::load_dataset(right_source, ctx)?;
        *right = Some(right_dataset.current());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::ops::{FilterParams, build_filter};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_csv(dir: &Path) -> PathBuf {
        let path = dir.join("people.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "age,city").unwrap();
        writeln!(file, "20,austin").unwrap();
        writeln!(file, "30,boston").unwrap();
        writeln!(file, "40,denver").unwrap();
        path
    }

    fn filter_op(column: &str, operator: &str, value: &str) -> Operation {
        build_filter(&FilterParams {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        })
        .unwrap()
    }

    #[test]
    fn test_save_list_load_delete_cycle() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(dir.path());
        let settings = Settings::default();
        let ctx = LoadContext::new(&settings);

        let mut dataset = loader::load_dataset(csv.to_str().unwrap(), &ctx)
            .unwrap()
            .with_execution_mode(ExecutionMode::Eager);
        dataset.apply_operation(filter_op("age", ">", "20")).unwrap();
        dataset.apply_operation(filter_op("age", "<", "40")).unwrap();
        assert_eq!(dataset.current().height(), 1);

        let store = AnalysisStore::open(&dir.path().join("analyses.db")).unwrap();
        store.save("boston only", "mid-range ages", &dataset).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "boston only");
        assert_eq!(listed[0].operation_count, 2);
        assert_eq!(listed[0].dataset_path, csv.to_str().unwrap());

        let reloaded = store.load("boston only", &ctx).unwrap();
        assert_eq!(reloaded.current().height(), 1);
        assert_eq!(reloaded.executed_operations.len(), 2);
        assert_eq!(
            reloaded.current().as_ref(),
            dataset.current().as_ref(),
            "reloaded frame must match the frame that was saved"
        );

        store.delete("boston only").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_save_same_name_overwrites() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(dir.path());
        let settings = Settings::default();
        let ctx = LoadContext::new(&settings);
        let store = AnalysisStore::open(&dir.path().join("analyses.db")).unwrap();

        let mut dataset = loader::load_dataset(csv.to_str().unwrap(), &ctx)
            .unwrap()
            .with_execution_mode(ExecutionMode::Eager);
        let first = store.save("a", "", &dataset).unwrap();

        dataset.apply_operation(filter_op("age", ">", "20")).unwrap();
        let second = store.save("a", "updated", &dataset).unwrap();

        assert_eq!(first, second);
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].operation_count, 1);
        assert_eq!(listed[0].description, "updated");
    }

    #[test]
    fn test_unknown_name_errors() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::default();
        let ctx = LoadContext::new(&settings);
        let store = AnalysisStore::open(&dir.path().join("analyses.db")).unwrap();
        assert!(matches!(
            store.load("missing", &ctx).unwrap_err(),
            Error::AnalysisNotFound(_)
        ));
        assert!(matches!(
            store.delete("missing").unwrap_err(),
            Error::AnalysisNotFound(_)
        ));
    }

    #[test]
    fn test_load_replays_join_against_reloaded_right_source() {
        let dir = TempDir::new().unwrap();
        let left_csv = write_csv(dir.path());
        let right_csv = dir.path().join("cities.csv");
        {
            let mut file = std::fs::File::create(&right_csv).unwrap();
            writeln!(file, "city,state").unwrap();
            writeln!(file, "austin,TX").unwrap();
            writeln!(file, "boston,MA").unwrap();
        }
        let settings = Settings::default();
        let ctx = LoadContext::new(&settings);

        let mut dataset = loader::load_dataset(left_csv.to_str().unwrap(), &ctx)
            .unwrap()
            .with_execution_mode(ExecutionMode::Eager);
        let right = loader::load_dataset(right_csv.to_str().unwrap(), &ctx).unwrap();
        let join = crate::ops::build_join(
            &crate::ops::JoinParams {
                right_source: right_csv.to_str().unwrap().to_string(),
                left_on: vec!["city".into()],
                right_on: vec!["city".into()],
                how: "inner".into(),
            },
            &dataset.schema,
            &right.schema,
            right.current(),
        )
        .unwrap();
        dataset.apply_operation(join).unwrap();
        assert_eq!(dataset.current().height(), 2);

        let store = AnalysisStore::open(&dir.path().join("analyses.db")).unwrap();
        store.save("joined", "", &dataset).unwrap();

        let reloaded = store.load("joined", &ctx).unwrap();
        assert_eq!(reloaded.current().height(), 2);
        assert!(reloaded.current().column("state").is_ok());
    }
}
