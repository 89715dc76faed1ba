//! Backend adapter: source loading, remote download, and saved-analyses
//! persistence.

pub mod analyses;
pub mod download;
pub mod loader;

pub use analyses::{AnalysisStore, AnalysisSummary};
pub use loader::{LoadContext, load_dataset};
