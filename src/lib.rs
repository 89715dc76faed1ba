#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]

pub mod config;
pub mod core;
pub mod errors;
pub mod io;
pub mod logging;
pub mod ops;

// Re-export commonly used types
pub use core::{AddDatasetResult, Dataset, DatasetId, DatasetSession, ExecOutcome, ExecutionMode, SourceType};
pub use errors::{Error, Result};
pub use io::{AnalysisStore, LoadContext, load_dataset};
pub use ops::{Operation, OperationState, OperationType, TransformStep};
