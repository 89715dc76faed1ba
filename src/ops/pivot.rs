//! Pivot operation builder.
//!
//! Validates the aggregation name against the fixed allow-list and the
//! involved column names, then emits a pivot step. Null-filtering of the
//! pivot key and Float64 casting of integer value columns happen in the
//! evaluator, where the real dtypes are known.

use serde_json::json;
use std::str::FromStr;

use crate::errors::{Error, Result};
use crate::ops::step::{AggFn, TransformStep};
use crate::ops::{Operation, OperationType, validate_column_name};

/// UI-collected pivot parameters.
#[derive(Debug, Clone)]
pub struct PivotParams {
    /// Row-identity columns kept as-is.
    pub index: Vec<String>,
    /// Column whose distinct values become new columns.
    pub on: String,
    /// Value columns to aggregate into the pivoted cells.
    pub values: Vec<String>,
    /// Aggregation name; must be on the allow-list.
    pub aggregation: String,
}

pub fn build_pivot(params: &PivotParams) -> Result<Operation> {
    if params.index.is_empty() {
        return Err(Error::validation("pivot", "at least one index column is required"));
    }
    if params.values.is_empty() {
        return Err(Error::validation("pivot", "at least one value column is required"));
    }
    for name in params
        .index
        .iter()
        .chain(params.values.iter())
        .chain(std::iter::once(&params.on))
    {
        validate_column_name(name)?;
    }

    let agg = AggFn::from_str(params.aggregation.trim()).map_err(|_| {
        Error::validation(
            "pivot aggregation",
            format!("unsupported aggregation '{}'", params.aggregation),
        )
    })?;

    let display = format!(
        "Pivot: {} by {} ({})",
        params.values.join(", "),
        params.on,
        agg
    );
    let step = TransformStep::Pivot {
        index: params.index.clone(),
        on: params.on.clone(),
        values: params.values.clone(),
        agg,
    };
    Ok(Operation::new(
        step,
        display,
        OperationType::Pivot,
        json!({
            "index": params.index,
            "on": params.on,
            "values": params.values,
            "aggregation": params.aggregation,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PivotParams {
        PivotParams {
            index: vec!["quarter".into()],
            on: "region".into(),
            values: vec!["sales".into()],
            aggregation: "sum".into(),
        }
    }

    #[test]
    fn test_build_pivot_display() {
        let op = build_pivot(&params()).unwrap();
        assert_eq!(op.display, "Pivot: sales by region (sum)");
        assert_eq!(op.operation_type, OperationType::Pivot);
    }

    #[test]
    fn test_aggregation_allow_list() {
        let mut p = params();
        p.aggregation = "variance".into();
        let err = build_pivot(&p).unwrap_err();
        assert!(err.to_string().contains("variance"));

        for ok in ["sum", "mean", "min", "max", "count", "median", "first", "last"] {
            let mut p = params();
            p.aggregation = ok.into();
            assert!(build_pivot(&p).is_ok(), "{ok} should be allowed");
        }
    }

    #[test]
    fn test_empty_index_rejected() {
        let mut p = params();
        p.index.clear();
        assert!(build_pivot(&p).is_err());
    }

    #[test]
    fn test_bad_column_rejected() {
        let mut p = params();
        p.on = "region'; --".into();
        assert!(build_pivot(&p).is_err());
    }
}
