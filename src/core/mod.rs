pub mod dataset;
pub mod session;
pub mod types;

pub use dataset::{DEFAULT_CHECKPOINT_INTERVAL, Dataset, ExecOutcome};
pub use session::{AddDatasetResult, DEFAULT_MAX_DATASETS, DatasetSession};
pub use types::{DatasetId, ExecutionMode, SourceType};
