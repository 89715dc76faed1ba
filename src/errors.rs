//! Crate-wide error type.
//!
//! Validation failures carry what was being validated and why; execution
//! failures wrap the underlying error together with the display string of
//! the operation that raised it, so queue and history views can show a
//! meaningful message without re-deriving context.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {what}: {message}")]
    Validation { what: String, message: String },

    #[error("operation '{display}' failed: {source}")]
    OperationFailed {
        display: String,
        #[source]
        source: Box<Error>,
    },

    #[error("source not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("unsupported format '.{extension}' for source '{source_name}'")]
    UnsupportedFormat {
        extension: String,
        source_name: String,
    },

    #[error("download of '{url}' failed: {message}")]
    Download { url: String, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("no dataset named '{0}' in this session")]
    DatasetNotFound(String),

    #[error("no saved analysis named '{0}'")]
    AnalysisNotFound(String),

    #[error("excel read failed: {0}")]
    Excel(String),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(what: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn operation_failed(display: impl Into<String>, source: Error) -> Self {
        Error::OperationFailed {
            display: display.into(),
            source: Box::new(source),
        }
    }
}
