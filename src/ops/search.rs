//! Search operation builder.
//!
//! Builds an OR-combined containment search across columns. String-typed
//! columns get case-insensitive substring containment; when the query parses
//! as a number, numeric-typed columns additionally get exact equality. An
//! empty query or a frame with no searchable columns produces an explicit
//! no-op, never an error.

use serde_json::json;

use crate::errors::Result;
use crate::ops::step::TransformStep;
use crate::ops::{Operation, OperationType};

fn is_string_type(type_name: &str) -> bool {
    matches!(type_name, "String" | "Utf8" | "Str")
}

fn is_numeric_type(type_name: &str) -> bool {
    type_name.starts_with("Int") || type_name.starts_with("UInt") || type_name.starts_with("Float")
}

/// Build a search operation over `columns`.
///
/// `schema` maps column name to the dtype's debug name (e.g. `Int64`,
/// `String`); when absent every column is treated as a string column, the
/// backward-compatible fallback for callers that only have names.
pub fn build_search(
    query: &str,
    columns: &[String],
    schema: Option<&[(String, String)]>,
) -> Result<Operation> {
    let trimmed = query.trim();
    let params = json!({ "query": query });

    if trimmed.is_empty() {
        return Ok(Operation::new(
            TransformStep::NoOp,
            "Search: empty query (no filter applied)",
            OperationType::Search,
            params,
        ));
    }

    let numeric_value = trimmed.parse::<f64>().ok();
    let mut string_columns: Vec<String> = Vec::new();
    let mut numeric_columns: Vec<String> = Vec::new();

    match schema {
        Some(schema) => {
            for name in columns {
                let Some((_, type_name)) = schema.iter().find(|(c, _)| c == name) else {
                    continue;
                };
                if is_string_type(type_name) {
                    string_columns.push(name.clone());
                } else if is_numeric_type(type_name) && numeric_value.is_some() {
                    numeric_columns.push(name.clone());
                }
            }
        }
        None => string_columns.extend(columns.iter().cloned()),
    }

    if string_columns.is_empty() && numeric_columns.is_empty() {
        return Ok(Operation::new(
            TransformStep::NoOp,
            format!("Search: no searchable columns for '{trimmed}'"),
            OperationType::Search,
            params,
        ));
    }

    Ok(Operation::new(
        TransformStep::Search {
            needle: trimmed.to_lowercase(),
            string_columns,
            numeric_columns,
            numeric_value,
        },
        format!("Search: '{trimmed}'"),
        OperationType::Search,
        params,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_query_is_noop() {
        let op = build_search("   ", &cols(&["a", "b"]), None).unwrap();
        assert!(matches!(op.step, TransformStep::NoOp));
        assert!(op.display.contains("empty query"));

        let df = df!("a" => ["x", "y"], "b" => ["p", "q"]).unwrap();
        let out = op.step.apply(&df).unwrap();
        assert_eq!(out.height(), 2, "no-op must not filter anything");
    }

    #[test]
    fn test_schema_splits_string_and_numeric() {
        let schema = vec![
            ("name".to_string(), "String".to_string()),
            ("age".to_string(), "Int64".to_string()),
            ("when".to_string(), "Date".to_string()),
        ];
        let op = build_search("30", &cols(&["name", "age", "when"]), Some(&schema)).unwrap();
        match &op.step {
            TransformStep::Search {
                string_columns,
                numeric_columns,
                numeric_value,
                ..
            } => {
                assert_eq!(string_columns, &vec!["name".to_string()]);
                assert_eq!(numeric_columns, &vec!["age".to_string()]);
                assert_eq!(numeric_value, &Some(30.0));
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_query_skips_numeric_columns() {
        let schema = vec![
            ("name".to_string(), "String".to_string()),
            ("age".to_string(), "Int64".to_string()),
        ];
        let op = build_search("alice", &cols(&["name", "age"]), Some(&schema)).unwrap();
        match &op.step {
            TransformStep::Search {
                numeric_columns, ..
            } => assert!(numeric_columns.is_empty()),
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_no_searchable_columns_is_noop() {
        let schema = vec![("when".to_string(), "Date".to_string())];
        let op = build_search("alice", &cols(&["when"]), Some(&schema)).unwrap();
        assert!(matches!(op.step, TransformStep::NoOp));
        assert!(op.display.contains("no searchable columns"));
    }

    #[test]
    fn test_no_schema_treats_all_as_strings() {
        let op = build_search("bob", &cols(&["name", "age"]), None).unwrap();
        match &op.step {
            TransformStep::Search { string_columns, .. } => {
                assert_eq!(string_columns.len(), 2);
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_search_matches_numeric_and_string() {
        let schema = vec![
            ("name".to_string(), "String".to_string()),
            ("age".to_string(), "Int64".to_string()),
        ];
        let df = df!("name" => ["Alice", "Bob25", "Cara"], "age" => [25i64, 30, 40]).unwrap();
        let op = build_search("25", &cols(&["name", "age"]), Some(&schema)).unwrap();
        let out = op.step.apply(&df).unwrap();
        // Bob25 by containment, Alice by age == 25
        assert_eq!(out.height(), 2);
    }
}
