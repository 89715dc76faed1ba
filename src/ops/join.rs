//! Join operation builder.
//!
//! Validates key-type compatibility between the two schemas before any step
//! is built: int and float keys are compatible (an integer side is cast to
//! Float64 automatically), string and numeric keys are not and raise a
//! descriptive error.

use polars::prelude::DataFrame;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::ops::step::{JoinKind, TransformStep};
use crate::ops::{Operation, OperationType, validate_column_name};

/// UI-collected join parameters. Schemas use the dtype debug names the
/// dataset exposes (`Int64`, `Float64`, `String`, ...).
#[derive(Debug, Clone)]
pub struct JoinParams {
    /// Path or URL the right-hand frame came from, kept for replay.
    pub right_source: String,
    pub left_on: Vec<String>,
    pub right_on: Vec<String>,
    /// Join kind name: inner/left/right/full/semi/anti.
    pub how: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyClass {
    Integer,
    Float,
    Text,
    Other,
}

fn classify(type_name: &str) -> KeyClass {
    if type_name.starts_with("Int") || type_name.starts_with("UInt") {
        KeyClass::Integer
    } else if type_name.starts_with("Float") {
        KeyClass::Float
    } else if matches!(type_name, "String" | "Utf8" | "Str") {
        KeyClass::Text
    } else {
        KeyClass::Other
    }
}

fn lookup<'a>(schema: &'a [(String, String)], name: &str, side: &'static str) -> Result<&'a str> {
    schema
        .iter()
        .find(|(c, _)| c == name)
        .map(|(_, t)| t.as_str())
        .ok_or_else(|| {
            Error::validation("join key", format!("{side} column '{name}' does not exist"))
        })
}

/// Build a join operation against an already-loaded right-hand frame.
pub fn build_join(
    params: &JoinParams,
    left_schema: &[(String, String)],
    right_schema: &[(String, String)],
    right: Arc<DataFrame>,
) -> Result<Operation> {
    if params.left_on.is_empty() || params.left_on.len() != params.right_on.len() {
        return Err(Error::validation(
            "join keys",
            "left and right key lists must be non-empty and the same length",
        ));
    }
    let how = JoinKind::from_str(params.how.trim()).map_err(|_| {
        Error::validation("join kind", format!("unknown join kind '{}'", params.how))
    })?;

    let mut cast_left: Vec<String> = Vec::new();
    let mut cast_right: Vec<String> = Vec::new();
    for (lk, rk) in params.left_on.iter().zip(params.right_on.iter()) {
        validate_column_name(lk)?;
        validate_column_name(rk)?;
        let lt = lookup(left_schema, lk, "left")?;
        let rt = lookup(right_schema, rk, "right")?;
        match (classify(lt), classify(rt)) {
            (a, b) if a == b => {}
            (KeyClass::Integer, KeyClass::Float) => cast_left.push(lk.clone()),
            (KeyClass::Float, KeyClass::Integer) => cast_right.push(rk.clone()),
            (a, b) => {
                return Err(Error::validation(
                    "join key types",
                    format!(
                        "cannot join '{lk}' ({lt}, {a:?}) with '{rk}' ({rt}, {b:?}); \
                         only int and float keys are auto-cast"
                    ),
                ));
            }
        }
    }

    let keys = params
        .left_on
        .iter()
        .zip(params.right_on.iter())
        .map(|(l, r)| {
            if l == r {
                l.clone()
            } else {
                format!("{l}={r}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let display = format!("Join: {} on {}", how, keys);

    let step = TransformStep::Join {
        right_source: params.right_source.clone(),
        left_on: params.left_on.clone(),
        right_on: params.right_on.clone(),
        how,
        cast_left,
        cast_right,
        right: Some(right),
    };
    Ok(Operation::new(
        step,
        display,
        OperationType::Join,
        json!({
            "right_source": params.right_source,
            "left_on": params.left_on,
            "right_on": params.right_on,
            "how": params.how,
        }),
    ))
}
