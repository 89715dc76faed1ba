//! Backend adapter: loads raw sources into the columnar frame a `Dataset`
//! consumes.
//!
//! Dispatches on the source suffix (`.csv`, `.parquet`, `.json`, `.xlsx`,
//! `.xls`, `.db`) and on `http(s)://` URLs, which are downloaded to the
//! cache directory first. Large CSV files go through the lazy scan path.
//! Every major phase reports progress and honors the cancellation predicate.

use std::fs::File;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use polars::prelude::*;
use tracing::{info, warn};

use crate::config::Settings;
use crate::core::{Dataset, SourceType};
use crate::errors::{Error, Result};
use crate::io::download;

/// Progress/cancellation context threaded through a load.
///
/// The progress callback receives `(fraction in [0,1], message)`. The cancel
/// predicate is checked before each major phase and periodically during
/// download; a positive check aborts the load with [`Error::Cancelled`].
#[derive(Clone, Copy)]
pub struct LoadContext<'a> {
    pub settings: &'a Settings,
    progress: Option<&'a dyn Fn(f64, &str)>,
    cancel: Option<&'a dyn Fn() -> bool>,
}

impl<'a> LoadContext<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            progress: None,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn Fn(f64, &str)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a dyn Fn() -> bool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn report(&self, fraction: f64, message: &str) {
        if let Some(progress) = self.progress {
            progress(fraction.clamp(0.0, 1.0), message);
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.map(|c| c()).unwrap_or(false)
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Load a source path or URL into a fresh [`Dataset`].
pub fn load_dataset(source: &str, ctx: &LoadContext) -> Result<Dataset> {
    ctx.check_cancelled()?;
    if source.starts_with("http://") || source.starts_with("https://") {
        let local = download::fetch_to_cache(source, ctx)?;
        ctx.check_cancelled()?;
        let frame = read_file(&local, ctx)?;
        return Ok(Dataset::new(dataset_name(&local), source, frame));
    }

    let path = PathBuf::from(source);
    if !path.exists() {
        return Err(Error::SourceNotFound { path });
    }
    let frame = read_file(&path, ctx)?;
    Ok(Dataset::new(dataset_name(&path), source, frame))
}

fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn read_file(path: &Path, ctx: &LoadContext) -> Result<DataFrame> {
    ctx.check_cancelled()?;
    let extension = extension_of(path);
    let source_type = SourceType::from_extension(&extension).ok_or_else(|| {
        Error::UnsupportedFormat {
            extension: extension.clone(),
            source_name: path.display().to_string(),
        }
    })?;
    ctx.report(0.1, &format!("Reading {} as {source_type}", path.display()));

    let frame = match source_type {
        SourceType::Csv => read_csv(path, ctx)?,
        SourceType::Parquet => read_parquet(path)?,
        SourceType::Json => read_json(path)?,
        SourceType::Excel => read_excel(path)?,
        SourceType::Sqlite => read_sqlite(path)?,
        // URLs are resolved to a local file before dispatch
        SourceType::Http => unreachable!("http sources are downloaded first"),
    };

    info!(
        path = %path.display(),
        rows = frame.height(),
        columns = frame.width(),
        "loaded source"
    );
    ctx.report(1.0, "Load complete");
    Ok(frame)
}

fn is_large_file(path: &Path, threshold: u64) -> bool {
    std::fs::metadata(path)
        .map(|m| m.len() > threshold)
        .unwrap_or(false)
}

fn read_csv(path: &Path, ctx: &LoadContext) -> Result<DataFrame> {
    let separator = if extension_of(path) == "tsv" { b'\t' } else { b',' };
    if is_large_file(path, ctx.settings.large_file_threshold_bytes()) {
        warn!(path = %path.display(), "large file, using lazy CSV scan");
        let lf = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_separator(separator)
            .with_infer_schema_length(Some(1000))
            .finish()?;
        return Ok(lf.collect()?);
    }
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .with_parse_options(CsvParseOptions::default().with_separator(separator))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)?;
    Ok(ParquetReader::new(file).finish()?)
}

fn read_json(path: &Path) -> Result<DataFrame> {
    // records array first, NDJSON as fallback
    let file = File::open(path)?;
    match JsonReader::new(file)
        .with_json_format(JsonFormat::Json)
        .finish()
    {
        Ok(df) => Ok(df),
        Err(_) => {
            let file = File::open(path)?;
            Ok(JsonReader::new(file)
                .with_json_format(JsonFormat::JsonLines)
                .finish()?)
        }
    }
}

fn excel_cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Error(_) => None,
    }
}

/// Build a column from string cells, inferring Float64 when every non-null
/// cell parses as a number.
fn column_from_strings(name: &str, cells: Vec<Option<String>>) -> Column {
    let all_numeric = cells
        .iter()
        .flatten()
        .all(|v| v.trim().parse::<f64>().is_ok())
        && cells.iter().any(|v| v.is_some());
    if all_numeric {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|v| v.as_ref().and_then(|s| s.trim().parse::<f64>().ok()))
            .collect();
        Series::new(name.into(), values).into_column()
    } else {
        Series::new(name.into(), cells).into_column()
    }
}

fn read_excel(path: &Path) -> Result<DataFrame> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| Error::Excel(e.to_string()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::Excel("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| Error::Excel(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Err(Error::Excel(format!("sheet '{sheet}' is empty")));
    };
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            excel_cell_to_string(cell).unwrap_or_else(|| format!("column_{i}"))
        })
        .collect();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(row.get(i).and_then(excel_cell_to_string));
        }
    }

    let columns: Vec<Column> = headers
        .iter()
        .zip(cells)
        .map(|(name, values)| column_from_strings(name, values))
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Value lattice for sqlite column type inference: Integer widens to Float,
/// anything mixed with Text becomes Text.
#[derive(Clone, Copy, PartialEq)]
enum SqliteColumnKind {
    Unknown,
    Integer,
    Float,
    Text,
}

impl SqliteColumnKind {
    fn widen(self, other: SqliteColumnKind) -> SqliteColumnKind {
        use SqliteColumnKind::*;
        match (self, other) {
            (Unknown, k) | (k, Unknown) => k,
            (Integer, Integer) => Integer,
            (Integer, Float) | (Float, Integer) | (Float, Float) => Float,
            _ => Text,
        }
    }
}

fn read_sqlite(path: &Path) -> Result<DataFrame> {
    let conn = rusqlite::Connection::open_with_flags(
        path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )?;
    let table: String = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name LIMIT 1",
            [],
            |row| row.get(0),
        )
        .map_err(|_| Error::validation("sqlite database", "contains no tables"))?;
    info!(table = %table, path = %path.display(), "reading first sqlite table");

    let mut stmt = conn.prepare(&format!("SELECT * FROM \"{table}\""))?;
    let names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let width = names.len();

    let mut kinds = vec![SqliteColumnKind::Unknown; width];
    let mut values: Vec<Vec<rusqlite::types::Value>> = vec![Vec::new(); width];
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        for i in 0..width {
            let value = row.get::<_, rusqlite::types::Value>(i)?;
            kinds[i] = kinds[i].widen(match &value {
                rusqlite::types::Value::Null => SqliteColumnKind::Unknown,
                rusqlite::types::Value::Integer(_) => SqliteColumnKind::Integer,
                rusqlite::types::Value::Real(_) => SqliteColumnKind::Float,
                _ => SqliteColumnKind::Text,
            });
            values[i].push(value);
        }
    }

    let columns: Vec<Column> = names
        .iter()
        .zip(values)
        .zip(kinds)
        .map(|((name, cells), kind)| sqlite_column(name, cells, kind))
        .collect();
    Ok(DataFrame::new(columns)?)
}

fn sqlite_column(
    name: &str,
    cells: Vec<rusqlite::types::Value>,
    kind: SqliteColumnKind,
) -> Column {
    use rusqlite::types::Value;
    match kind {
        SqliteColumnKind::Integer => {
            let values: Vec<Option<i64>> = cells
                .into_iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(i),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values).into_column()
        }
        SqliteColumnKind::Float => {
            let values: Vec<Option<f64>> = cells
                .into_iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(i as f64),
                    Value::Real(f) => Some(f),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values).into_column()
        }
        _ => {
            let values: Vec<Option<String>> = cells
                .into_iter()
                .map(|v| match v {
                    Value::Null => None,
                    Value::Integer(i) => Some(i.to_string()),
                    Value::Real(f) => Some(f.to_string()),
                    Value::Text(s) => Some(s),
                    Value::Blob(b) => Some(format!("<blob {} bytes>", b.len())),
                })
                .collect();
            Series::new(name.into(), values).into_column()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn settings() -> Settings {
        Settings::default()
    }

    fn write_csv(dir: &Path) -> PathBuf {
        let path = dir.join("people.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "id,name,score").unwrap();
        writeln!(file, "1,Alice,90.5").unwrap();
        writeln!(file, "2,Bob,80.0").unwrap();
        writeln!(file, "3,Charlie,70.5").unwrap();
        path
    }

    #[test]
    fn test_load_csv_populates_dataset() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path());
        let settings = settings();
        let ctx = LoadContext::new(&settings);

        let dataset = load_dataset(path.to_str().unwrap(), &ctx).unwrap();
        assert_eq!(dataset.name, "people");
        assert_eq!(dataset.row_count, 3);
        assert_eq!(dataset.schema.len(), 3);
        assert_eq!(dataset.current().as_ref(), dataset.original().as_ref());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let settings = settings();
        let ctx = LoadContext::new(&settings);
        let err = load_dataset("/nonexistent/data.csv", &ctx).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn test_unsupported_suffix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.xyz");
        File::create(&path).unwrap();
        let settings = settings();
        let ctx = LoadContext::new(&settings);
        let err = load_dataset(path.to_str().unwrap(), &ctx).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_load_json_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"[{"a": 1, "b": "x"}, {"a": 2, "b": "y"}]"#,
        )
        .unwrap();
        let settings = settings();
        let ctx = LoadContext::new(&settings);
        let dataset = load_dataset(path.to_str().unwrap(), &ctx).unwrap();
        assert_eq!(dataset.row_count, 2);
    }

    #[test]
    fn test_load_ndjson_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.jsonl");
        std::fs::write(&path, "{\"a\": 1}\n{\"a\": 2}\n{\"a\": 3}\n").unwrap();
        let settings = settings();
        let ctx = LoadContext::new(&settings);
        let dataset = load_dataset(path.to_str().unwrap(), &ctx).unwrap();
        assert_eq!(dataset.row_count, 3);
    }

    #[test]
    fn test_load_sqlite_first_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE users (id INTEGER, name TEXT, score REAL);
                 INSERT INTO users VALUES (1, 'Alice', 90.5), (2, 'Bob', NULL), (3, NULL, 70.0);",
            )
            .unwrap();
        }
        let settings = settings();
        let ctx = LoadContext::new(&settings);
        let dataset = load_dataset(path.to_str().unwrap(), &ctx).unwrap();
        assert_eq!(dataset.row_count, 3);
        let frame = dataset.current();
        assert_eq!(frame.column("id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(frame.column("score").unwrap().dtype(), &DataType::Float64);
        assert_eq!(frame.column("name").unwrap().null_count(), 1);
    }

    #[test]
    fn test_sqlite_without_tables_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.db");
        {
            rusqlite::Connection::open(&path).unwrap();
        }
        let settings = settings();
        let ctx = LoadContext::new(&settings);
        assert!(load_dataset(path.to_str().unwrap(), &ctx).is_err());
    }

    #[test]
    fn test_progress_reported_and_cancel_honored() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path());
        let settings = settings();

        let reports = std::sync::Mutex::new(Vec::new());
        let progress = |fraction: f64, message: &str| {
            reports.lock().unwrap().push((fraction, message.to_string()));
        };
        let ctx = LoadContext::new(&settings).with_progress(&progress);
        load_dataset(path.to_str().unwrap(), &ctx).unwrap();
        let reports = reports.into_inner().unwrap();
        assert!(!reports.is_empty());
        assert!(reports.iter().all(|(f, _)| (0.0..=1.0).contains(f)));

        let cancel = || true;
        let ctx = LoadContext::new(&settings).with_cancel(&cancel);
        let err = load_dataset(path.to_str().unwrap(), &ctx).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_column_inference_from_strings() {
        let col = column_from_strings("x", vec![Some("1.5".into()), None, Some("2".into())]);
        assert_eq!(col.dtype(), &DataType::Float64);
        let col = column_from_strings("x", vec![Some("1.5".into()), Some("abc".into())]);
        assert_eq!(col.dtype(), &DataType::String);
    }
}
