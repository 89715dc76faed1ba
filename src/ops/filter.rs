//! Filter operation builder.
//!
//! Turns a `{column, operator, value}` parameter set collected by the filter
//! panel into an [`Operation`]. Column names are checked against the
//! allow-list before being embedded; numeric-looking values are coerced to
//! `f64` literals; substring operators are matched case-insensitively on a
//! lower-cased needle.

use serde_json::json;
use std::str::FromStr;

use crate::errors::{Error, Result};
use crate::ops::step::{FilterOp, FilterValue, TransformStep};
use crate::ops::{Operation, OperationType, validate_column_name};

/// UI-collected filter parameters.
#[derive(Debug, Clone)]
pub struct FilterParams {
    pub column: String,
    /// One of the operator tokens, e.g. `==`, `contains`, `is null`.
    pub operator: String,
    pub value: String,
}

/// Build a filter operation, validating every input first.
///
/// A malformed non-empty request is an error, never a silent no-op.
pub fn build_filter(params: &FilterParams) -> Result<Operation> {
    validate_column_name(&params.column)?;

    let op = FilterOp::from_str(params.operator.trim()).map_err(|_| {
        Error::validation(
            "filter operator",
            format!("unknown operator '{}'", params.operator),
        )
    })?;

    let raw = params.value.trim();
    let value = if !op.needs_value() {
        FilterValue::Absent
    } else if raw.is_empty() {
        return Err(Error::validation(
            "filter value",
            format!("operator '{op}' requires a value"),
        ));
    } else if op.is_substring() {
        // substring needles stay textual even when they look numeric
        FilterValue::Text(raw.to_lowercase())
    } else if let Ok(n) = raw.parse::<f64>() {
        // always float, even for integer-looking input: `age == 30`
        // compares against 30.0
        FilterValue::Number(n)
    } else {
        FilterValue::Text(raw.to_string())
    };

    let display = if op.needs_value() {
        format!("Filter: {} {} {}", params.column, op, raw)
    } else {
        format!("Filter: {} {}", params.column, op)
    };

    let step = TransformStep::Filter {
        column: params.column.clone(),
        op,
        value,
    };
    Ok(Operation::new(
        step,
        display,
        OperationType::Filter,
        json!({
            "column": params.column,
            "operator": params.operator,
            "value": params.value,
        }),
    ))
}
