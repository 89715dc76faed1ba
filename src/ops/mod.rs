//! Operations: the unit of work in a dataset's transformation pipeline.
//!
//! An [`Operation`] pairs a serializable [`TransformStep`] with a display
//! string, a type tag, the structured params that produced it, and a mutable
//! execution state. Builders in the submodules translate UI-collected
//! parameter sets into operations, validating inputs before anything is
//! constructed.

pub mod filter;
pub mod join;
pub mod pivot;
pub mod search;
pub mod step;

pub use filter::{FilterParams, build_filter};
pub use join::{JoinParams, build_join};
pub use pivot::{PivotParams, build_pivot};
pub use search::build_search;
pub use step::{AggFn, CastDtype, FilterOp, FilterValue, JoinKind, TransformStep};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Error, Result};

lazy_static! {
    /// Allow-list for column names embedded in operations. A hard boundary,
    /// kept even though steps are structured data rather than executable
    /// text: it also rejects names that would collide with generated pivot
    /// column separators and path-ish garbage from malformed headers.
    static ref COLUMN_NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_\-\. ]{1,255}$")
        .expect("static regex");
}

/// Validate a column name against the allow-list pattern.
pub(crate) fn validate_column_name(name: &str) -> Result<()> {
    if COLUMN_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::validation(
            "column name",
            format!("'{name}' contains disallowed characters or is empty"),
        ))
    }
}

/// Type tag for an operation, mirroring how it is shown and persisted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationType {
    Filter,
    Aggregate,
    Pivot,
    Join,
    Select,
    Drop,
    Rename,
    WithColumns,
    Sort,
    Unique,
    FillNull,
    DropNulls,
    Head,
    Tail,
    Sample,
    Search,
}

/// Execution state of an operation. Transitions only `Queued -> Executed` or
/// `Queued -> Failed`; failed operations remain addressable in the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    #[default]
    Queued,
    Executed,
    Failed,
}

/// One transformation step with its provenance and execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub step: TransformStep,
    pub display: String,
    pub operation_type: OperationType,
    /// The structured inputs that produced `step`, kept for editing and
    /// serialization.
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub state: OperationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Operation {
    pub fn new(
        step: TransformStep,
        display: impl Into<String>,
        operation_type: OperationType,
        params: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            step,
            display: display.into(),
            operation_type,
            params,
            state: OperationState::Queued,
            error_message: None,
        }
    }

    pub(crate) fn mark_executed(&mut self) {
        self.state = OperationState::Executed;
        self.error_message = None;
    }

    pub(crate) fn mark_failed(&mut self, message: impl Into<String>) {
        self.state = OperationState::Failed;
        self.error_message = Some(message.into());
    }

    pub fn is_failed(&self) -> bool {
        self.state == OperationState::Failed
    }
}
