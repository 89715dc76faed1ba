//! Transformation step AST and its evaluator.
//!
//! Each operation carries a closed, serializable `TransformStep` instead of an
//! executable code fragment. The evaluator interprets a step against polars'
//! expression API, producing a new frame and never mutating its input. This
//! keeps operations editable and persistable without any injection surface.

use polars::prelude::pivot::pivot_stable;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::{Error, Result};

/// Comparison and predicate operators accepted by the filter builder.
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
pub enum FilterOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = "contains")]
    Contains,
    #[strum(serialize = "not contains")]
    NotContains,
    #[strum(serialize = "starts with")]
    StartsWith,
    #[strum(serialize = "ends with")]
    EndsWith,
    #[strum(serialize = "is true")]
    IsTrue,
    #[strum(serialize = "is false")]
    IsFalse,
    #[strum(serialize = "is null")]
    IsNull,
    #[strum(serialize = "is not null")]
    IsNotNull,
}

impl FilterOp {
    /// Boolean and null predicates ignore the value field.
    pub fn needs_value(&self) -> bool {
        !matches!(
            self,
            Self::IsTrue | Self::IsFalse | Self::IsNull | Self::IsNotNull
        )
    }

    /// Substring operators match case-insensitively on lower-cased needles.
    pub fn is_substring(&self) -> bool {
        matches!(
            self,
            Self::Contains | Self::NotContains | Self::StartsWith | Self::EndsWith
        )
    }
}

/// A literal embedded in a filter or fill step.
///
/// Numeric-looking inputs are always coerced to `f64`, so `age == 30`
/// compares against `30.0`; polars supercasting keeps integer columns
/// comparable against the float literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
    Absent,
}

impl FilterValue {
    fn to_lit(&self) -> Result<Expr> {
        match self {
            Self::Number(n) => Ok(lit(*n)),
            Self::Text(s) => Ok(lit(s.clone())),
            Self::Absent => Err(Error::validation("filter value", "a value is required")),
        }
    }
}

/// Aggregation functions allowed in aggregate and pivot steps.
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
pub enum AggFn {
    Sum,
    Mean,
    Min,
    Max,
    Count,
    Median,
    First,
    Last,
}

impl AggFn {
    fn apply_to(&self, expr: Expr) -> Expr {
        match self {
            Self::Sum => expr.sum(),
            Self::Mean => expr.mean(),
            Self::Min => expr.min(),
            Self::Max => expr.max(),
            Self::Count => expr.count(),
            Self::Median => expr.median(),
            Self::First => expr.first(),
            Self::Last => expr.last(),
        }
    }
}

/// Join kinds supported by the join builder.
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
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
}

impl JoinKind {
    fn to_polars(self) -> JoinType {
        match self {
            Self::Inner => JoinType::Inner,
            Self::Left => JoinType::Left,
            Self::Right => JoinType::Right,
            Self::Full => JoinType::Full,
            Self::Semi => JoinType::Semi,
            Self::Anti => JoinType::Anti,
        }
    }
}

/// Cast targets for column casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastDtype {
    Int64,
    Float64,
    String,
    Boolean,
}

impl CastDtype {
    fn to_polars(self) -> DataType {
        match self {
            Self::Int64 => DataType::Int64,
            Self::Float64 => DataType::Float64,
            Self::String => DataType::String,
            Self::Boolean => DataType::Boolean,
        }
    }
}

/// One transformation step, interpreted against the current frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformStep {
    Filter {
        column: String,
        op: FilterOp,
        value: FilterValue,
    },
    /// OR-combined containment/equality search across columns. Built by the
    /// search builder; `needle` is already lower-cased.
    Search {
        needle: String,
        string_columns: Vec<String>,
        numeric_columns: Vec<String>,
        numeric_value: Option<f64>,
    },
    Select {
        columns: Vec<String>,
    },
    Drop {
        columns: Vec<String>,
    },
    Rename {
        renames: Vec<(String, String)>,
    },
    CastColumn {
        column: String,
        dtype: CastDtype,
    },
    Sort {
        columns: Vec<String>,
        descending: bool,
    },
    Unique {
        subset: Option<Vec<String>>,
    },
    FillNull {
        column: Option<String>,
        value: FilterValue,
    },
    DropNulls {
        subset: Option<Vec<String>>,
    },
    Head {
        n: usize,
    },
    Tail {
        n: usize,
    },
    Sample {
        n: usize,
        seed: Option<u64>,
    },
    Aggregate {
        group_by: Vec<String>,
        aggs: Vec<(String, AggFn)>,
    },
    Pivot {
        index: Vec<String>,
        on: String,
        values: Vec<String>,
        agg: AggFn,
    },
    Join {
        /// Path or URL the right-hand frame was loaded from; used to
        /// re-resolve the frame when replaying a saved analysis.
        right_source: String,
        left_on: Vec<String>,
        right_on: Vec<String>,
        how: JoinKind,
        /// Integer key columns that must be cast to Float64 so an int key can
        /// join against a float key.
        cast_left: Vec<String>,
        cast_right: Vec<String>,
        #[serde(skip)]
        right: Option<Arc<DataFrame>>,
    },
    /// Explicit no-op (empty search query, no searchable columns).
    NoOp,
}

/// True for the integer primitive dtypes. Kept local rather than relying on
/// polars' dtype predicates, which have shifted names across releases.
pub(crate) fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

impl TransformStep {
    /// Interpret this step against `df`, producing a new frame.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        match self {
            Self::Filter { column, op, value } => {
                let expr = filter_expr(column, *op, value)?;
                Ok(df.clone().lazy().filter(expr).collect()?)
            }
            Self::Search {
                needle,
                string_columns,
                numeric_columns,
                numeric_value,
            } => {
                let mut conditions: Vec<Expr> = Vec::new();
                for c in string_columns {
                    conditions.push(
                        col(c.as_str())
                            .cast(DataType::String)
                            .str()
                            .to_lowercase()
                            .str()
                            .contains_literal(lit(needle.clone())),
                    );
                }
                if let Some(v) = numeric_value {
                    for c in numeric_columns {
                        conditions.push(col(c.as_str()).eq(lit(*v)));
                    }
                }
                let Some(combined) = conditions.into_iter().reduce(|a, b| a.or(b)) else {
                    return Ok(df.clone());
                };
                Ok(df.clone().lazy().filter(combined).collect()?)
            }
            Self::Select { columns } => Ok(df.select(columns.iter().map(String::as_str))?),
            Self::Drop { columns } => Ok(df.drop_many(columns.iter().map(String::as_str))),
            Self::Rename { renames } => {
                let mut out = df.clone();
                for (old, new) in renames {
                    out.rename(old, PlSmallStr::from_str(new))?;
                }
                Ok(out)
            }
            Self::CastColumn { column, dtype } => Ok(df
                .clone()
                .lazy()
                .with_column(col(column.as_str()).cast(dtype.to_polars()))
                .collect()?),
            Self::Sort {
                columns,
                descending,
            } => {
                let options = SortMultipleOptions::default()
                    .with_order_descending(*descending)
                    .with_nulls_last(true)
                    .with_maintain_order(true);
                Ok(df.sort(columns, options)?)
            }
            Self::Unique { subset } => {
                let subset: Option<Vec<PlSmallStr>> = subset
                    .as_ref()
                    .map(|names| names.iter().map(|n| PlSmallStr::from_str(n)).collect());
                Ok(df
                    .clone()
                    .lazy()
                    .unique_stable(subset, UniqueKeepStrategy::First)
                    .collect()?)
            }
            Self::FillNull { column, value } => {
                let fill = value.to_lit()?;
                let lf = df.clone().lazy();
                let lf = match column {
                    Some(c) => lf.with_column(col(c.as_str()).fill_null(fill)),
                    None => lf.with_columns([all().fill_null(fill)]),
                };
                Ok(lf.collect()?)
            }
            Self::DropNulls { subset } => {
                let subset: Option<Vec<Expr>> = subset
                    .as_ref()
                    .map(|names| names.iter().map(|n| col(n.as_str())).collect());
                Ok(df.clone().lazy().drop_nulls(subset).collect()?)
            }
            Self::Head { n } => Ok(df.head(Some(*n))),
            Self::Tail { n } => Ok(df.tail(Some(*n))),
            Self::Sample { n, seed } => {
                let n = (*n).min(df.height());
                Ok(df.sample_n_literal(n, false, true, *seed)?)
            }
            Self::Aggregate { group_by, aggs } => {
                let keys: Vec<Expr> = group_by.iter().map(|c| col(c.as_str())).collect();
                let agg_exprs: Vec<Expr> = aggs
                    .iter()
                    .map(|(c, f)| {
                        f.apply_to(col(c.as_str()))
                            .alias(format!("{}_{}", c, f))
                    })
                    .collect();
                Ok(df
                    .clone()
                    .lazy()
                    .group_by_stable(keys)
                    .agg(agg_exprs)
                    .collect()?)
            }
            Self::Pivot {
                index,
                on,
                values,
                agg,
            } => apply_pivot(df, index, on, values, *agg),
            Self::Join {
                right_source,
                left_on,
                right_on,
                how,
                cast_left,
                cast_right,
                right,
            } => {
                let right = right.as_ref().ok_or_else(|| {
                    Error::validation(
                        "join",
                        format!("right-hand frame '{right_source}' is not resolved"),
                    )
                })?;
                let mut lf = df.clone().lazy();
                for k in cast_left {
                    lf = lf.with_column(col(k.as_str()).cast(DataType::Float64));
                }
                let mut rf = right.as_ref().clone().lazy();
                for k in cast_right {
                    rf = rf.with_column(col(k.as_str()).cast(DataType::Float64));
                }
                let left_exprs: Vec<Expr> = left_on.iter().map(|c| col(c.as_str())).collect();
                let right_exprs: Vec<Expr> = right_on.iter().map(|c| col(c.as_str())).collect();
                Ok(lf
                    .join(rf, left_exprs, right_exprs, JoinArgs::new(how.to_polars()))
                    .collect()?)
            }
            Self::NoOp => Ok(df.clone()),
        }
    }
}

fn filter_expr(column: &str, op: FilterOp, value: &FilterValue) -> Result<Expr> {
    let c = col(column);
    // Substring operators match case-insensitively against a lower-cased needle.
    let lowered = || {
        c.clone()
            .cast(DataType::String)
            .str()
            .to_lowercase()
    };
    Ok(match op {
        FilterOp::Eq => c.eq(value.to_lit()?),
        FilterOp::Ne => c.neq(value.to_lit()?),
        FilterOp::Gt => c.gt(value.to_lit()?),
        FilterOp::Lt => c.lt(value.to_lit()?),
        FilterOp::Ge => c.gt_eq(value.to_lit()?),
        FilterOp::Le => c.lt_eq(value.to_lit()?),
        FilterOp::Contains => lowered().str().contains_literal(value.to_lit()?),
        FilterOp::NotContains => lowered().str().contains_literal(value.to_lit()?).not(),
        FilterOp::StartsWith => lowered().str().starts_with(value.to_lit()?),
        FilterOp::EndsWith => lowered().str().ends_with(value.to_lit()?),
        FilterOp::IsTrue => c.eq(lit(true)),
        FilterOp::IsFalse => c.eq(lit(false)),
        FilterOp::IsNull => c.is_null(),
        FilterOp::IsNotNull => c.is_not_null(),
    })
}

/// Pivot with the null-safety and float-output rules the builders promise:
/// rows with a null pivot key are filtered out first (a null key corrupts the
/// generated column names), and integer value columns are cast to Float64 so
/// pivot outputs are always floating point.
fn apply_pivot(
    df: &DataFrame,
    index: &[String],
    on: &str,
    values: &[String],
    agg: AggFn,
) -> Result<DataFrame> {
    let mut lf = df.clone().lazy().drop_nulls(Some(vec![col(on)]));
    for v in values {
        if let Ok(s) = df.column(v)
            && is_integer_dtype(s.dtype())
        {
            lf = lf.with_column(col(v.as_str()).cast(DataType::Float64));
        }
    }
    let filtered = lf.collect()?;
    // pivot's aggregation expression operates on the unnamed element column
    let out = pivot_stable(
        &filtered,
        [on],
        Some(index.to_vec()),
        Some(values.to_vec()),
        true,
        Some(agg.apply_to(col(""))),
        None,
    )?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_df() -> DataFrame {
        df!(
            "name" => ["Alice", "Bob", "Charlie", "Dana"],
            "age" => [30i64, 25, 35, 25],
            "city" => ["Austin", "Boston", "Austin", "Denver"],
        )
        .unwrap()
    }

    #[test]
    fn test_filter_op_parses_operator_tokens() {
        assert_eq!(FilterOp::from_str("==").unwrap(), FilterOp::Eq);
        assert_eq!(FilterOp::from_str("not contains").unwrap(), FilterOp::NotContains);
        assert_eq!(FilterOp::from_str("is not null").unwrap(), FilterOp::IsNotNull);
        assert!(FilterOp::from_str("matches").is_err());
    }

    #[test]
    fn test_filter_numeric_against_int_column() {
        // float literal vs int column: supercast keeps this well-defined
        let step = TransformStep::Filter {
            column: "age".into(),
            op: FilterOp::Gt,
            value: FilterValue::Number(25.0),
        };
        let out = step.apply(&sample_df()).unwrap();
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn test_filter_contains_case_insensitive() {
        let step = TransformStep::Filter {
            column: "city".into(),
            op: FilterOp::Contains,
            value: FilterValue::Text("aus".into()),
        };
        let out = step.apply(&sample_df()).unwrap();
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn test_search_or_combines_conditions() {
        let step = TransformStep::Search {
            needle: "bob".into(),
            string_columns: vec!["name".into(), "city".into()],
            numeric_columns: vec!["age".into()],
            numeric_value: Some(35.0),
        };
        // matches Bob (name) and Charlie (age == 35)
        let out = step.apply(&sample_df()).unwrap();
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn test_aggregate_group_by_stable() {
        let step = TransformStep::Aggregate {
            group_by: vec!["city".into()],
            aggs: vec![("age".into(), AggFn::Mean)],
        };
        let out = step.apply(&sample_df()).unwrap();
        assert_eq!(out.height(), 3);
        assert!(out.get_column_names().iter().any(|c| c.as_str() == "age_mean"));
        // stable group-by preserves first-seen order
        let first_city = out.column("city").unwrap().get(0).unwrap().to_string();
        assert!(first_city.contains("Austin"));
    }

    #[test]
    fn test_unique_on_subset_keeps_first() {
        let step = TransformStep::Unique {
            subset: Some(vec!["age".into()]),
        };
        let out = step.apply(&sample_df()).unwrap();
        // Bob and Dana share age 25; Bob comes first
        assert_eq!(out.height(), 3);
        let names: Vec<String> = out
            .column("name")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Charlie"]);
    }

    #[test]
    fn test_drop_nulls_with_and_without_subset() {
        let df = df!(
            "a" => [Some(1i64), None, Some(3)],
            "b" => [Some("x"), Some("y"), None],
        )
        .unwrap();
        let out = TransformStep::DropNulls {
            subset: Some(vec!["a".into()]),
        }
        .apply(&df)
        .unwrap();
        assert_eq!(out.height(), 2);
        let out = TransformStep::DropNulls { subset: None }.apply(&df).unwrap();
        assert_eq!(out.height(), 1);
    }

    #[test]
    fn test_pivot_filters_null_keys_and_floats_values() {
        let df = df!(
            "region" => [Some("east"), Some("west"), None, Some("east")],
            "quarter" => ["q1", "q1", "q2", "q2"],
            "sales" => [10i64, 20, 30, 40],
        )
        .unwrap();
        let step = TransformStep::Pivot {
            index: vec!["quarter".into()],
            on: "region".into(),
            values: vec!["sales".into()],
            agg: AggFn::Sum,
        };
        let out = step.apply(&df).unwrap();
        // the null-region row is dropped before pivoting
        assert_eq!(out.height(), 2);
        let east = out.column("east").unwrap();
        assert_eq!(east.dtype(), &DataType::Float64);
    }

    #[test]
    fn test_pivot_all_null_key_yields_zero_rows() {
        let df = df!(
            "region" => [None::<&str>, None, None],
            "quarter" => ["q1", "q1", "q2"],
            "sales" => [1i64, 2, 3],
        )
        .unwrap();
        let step = TransformStep::Pivot {
            index: vec!["quarter".into()],
            on: "region".into(),
            values: vec!["sales".into()],
            agg: AggFn::Sum,
        };
        let out = step.apply(&df).unwrap();
        assert_eq!(out.height(), 0);
    }

    #[test]
    fn test_join_with_int_float_cast() {
        let left = df!("key" => [1i64, 2, 3], "l" => ["a", "b", "c"]).unwrap();
        let right = df!("key" => [1.0f64, 3.0], "r" => ["x", "y"]).unwrap();
        let step = TransformStep::Join {
            right_source: "mem".into(),
            left_on: vec!["key".into()],
            right_on: vec!["key".into()],
            how: JoinKind::Inner,
            cast_left: vec!["key".into()],
            cast_right: vec![],
            right: Some(Arc::new(right)),
        };
        let out = step.apply(&left).unwrap();
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn test_join_unresolved_right_is_descriptive() {
        let left = df!("key" => [1i64]).unwrap();
        let step = TransformStep::Join {
            right_source: "orders.csv".into(),
            left_on: vec!["key".into()],
            right_on: vec!["key".into()],
            how: JoinKind::Left,
            cast_left: vec![],
            cast_right: vec![],
            right: None,
        };
        let err = step.apply(&left).unwrap_err();
        assert!(err.to_string().contains("orders.csv"));
    }

    #[test]
    fn test_step_round_trips_through_serde() {
        let step = TransformStep::Filter {
            column: "age".into(),
            op: FilterOp::Ge,
            value: FilterValue::Number(21.0),
        };
        let json = serde_json::to_string(&step).unwrap();
        let restored: TransformStep = serde_json::from_str(&json).unwrap();
        let a = step.apply(&sample_df()).unwrap();
        let b = restored.apply(&sample_df()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_noop_returns_frame_unchanged() {
        let df = sample_df();
        let out = TransformStep::NoOp.apply(&df).unwrap();
        assert_eq!(out, df);
    }
}
