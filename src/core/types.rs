use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for datasets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(Uuid);

impl DatasetId {
    /// Create a new unique dataset ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the ID as a string
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for DatasetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s).map_err(|e| e.to_string())?))
    }
}

/// Source type for loaded data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Csv,
    Parquet,
    Json,
    Excel,
    Sqlite,
    Http,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
            Self::Json => "json",
            Self::Excel => "excel",
            Self::Sqlite => "sqlite",
            Self::Http => "http",
        }
    }

    /// Map a lowercase file suffix to a source type, if supported.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "csv" | "tsv" => Some(Self::Csv),
            "parquet" => Some(Self::Parquet),
            "json" | "jsonl" | "ndjson" => Some(Self::Json),
            "xlsx" | "xls" => Some(Self::Excel),
            "db" | "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            "json" => Ok(Self::Json),
            "excel" => Ok(Self::Excel),
            "sqlite" => Ok(Self::Sqlite),
            "http" => Ok(Self::Http),
            _ => Err(format!("Unknown source type: {}", s)),
        }
    }
}

/// Execution discipline for a dataset's operation pipeline.
///
/// `Lazy` queues operations for batched execution; `Eager` runs each
/// operation immediately against the current frame. The two modes share all
/// other dataset state (history, checkpoints, redo) and diverge only in when
/// an operation runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Lazy,
    #[default]
    Eager,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lazy => write!(f, "lazy"),
            Self::Eager => write!(f, "eager"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_id_creation() {
        let id1 = DatasetId::new();
        let id2 = DatasetId::new();

        assert_ne!(id1, id2, "IDs should be unique");
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_source_type_from_extension() {
        assert_eq!(SourceType::from_extension("csv"), Some(SourceType::Csv));
        assert_eq!(SourceType::from_extension("xls"), Some(SourceType::Excel));
        assert_eq!(SourceType::from_extension("db"), Some(SourceType::Sqlite));
        assert_eq!(SourceType::from_extension("exe"), None);
    }

    #[test]
    fn test_execution_mode_serialization() {
        let json = serde_json::to_string(&ExecutionMode::Lazy).unwrap();
        assert_eq!(json, "\"lazy\"");
        let restored: ExecutionMode = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, ExecutionMode::Lazy);
    }
}
