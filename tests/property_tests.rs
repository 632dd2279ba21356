//! Property-based tests for shaping invariants.
//!
//! These hold for any data and any query: the output mirrors the query, a
//! pass is deterministic, the array pipeline runs filter → skip → limit,
//! and malformed query text never aborts a pass.

mod common;

use proptest::prelude::*;
use serde_json::{Value, json};
use shapeql::{QueryTree, compile_with_diagnostics, evaluate, shape};

// ============================================================================
// Test Strategies
// ============================================================================

/// Strategy: short field names drawn from a small alphabet so they collide
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,3}"
}

fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-1000i32..1000).prop_map(Value::from),
        "[a-z]{0,6}".prop_map(Value::from),
    ]
}

/// Strategy: nested objects and arrays of leaves
fn data_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(4, 48, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(key_strategy(), inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Strategy: query text of bare fields and one-level blocks
fn query_strategy() -> impl Strategy<Value = String> {
    let line = prop_oneof![
        key_strategy(),
        (key_strategy(), key_strategy()).prop_map(|(alias, path)| format!("{alias}: {path}")),
        (key_strategy(), prop::collection::vec(key_strategy(), 1..3))
            .prop_map(|(key, fields)| format!("{key} {{\n{}\n}}", fields.join("\n"))),
    ];
    prop::collection::vec(line, 1..6).prop_map(|lines| lines.join("\n"))
}

/// Strategy: text built from the query language's punctuation, plus
/// multi-byte characters next to it
fn noise_strategy() -> impl Strategy<Value = String> {
    r#"[a-z0-9 {}()@:.,'"|!?=<>+*/\[\]\n\-éß→€😀]{0,60}"#
}

// ============================================================================
// Shaping Properties
// ============================================================================

proptest! {
    /// Every key of the compiled query appears in the output.
    #[test]
    fn prop_output_mirrors_query(data in data_strategy(), query in query_strategy()) {
        let (tree, _) = compile_with_diagnostics(&query);
        let out = shape(&data, &tree, None).unwrap();

        let object = out.as_object().cloned().unwrap_or_default();
        prop_assert_eq!(object.len(), tree.len());
        for key in tree.keys() {
            prop_assert!(object.contains_key(key), "missing key {}", key);
        }
    }

    /// Shaping the same inputs twice gives equal outputs.
    #[test]
    fn prop_shaping_is_deterministic(data in data_strategy(), query in query_strategy()) {
        let first = shape(&data, &query, None).unwrap();
        let second = shape(&data, &query, None).unwrap();
        prop_assert_eq!(first, second);
    }

    /// filter, then skip, then limit.
    #[test]
    fn prop_array_pipeline_order(
        values in prop::collection::vec(-20i64..20, 0..20),
        threshold in -20i64..20,
        skip in 0usize..6,
        limit in 0usize..6,
    ) {
        let data = json!({"items": values.iter().map(|v| json!({"v": v})).collect::<Vec<_>>()});
        let query = QueryTree::from_json(&json!({
            "items": {"filter": format!("v > {threshold}"), "skip": skip, "limit": limit}
        }));

        let expected: Vec<Value> = values
            .iter()
            .filter(|v| **v > threshold)
            .skip(skip)
            .take(limit)
            .map(|v| json!({"v": v}))
            .collect();

        let out = shape(&data, &query, None).unwrap();
        prop_assert_eq!(out, json!({"items": expected}));
    }

    /// Arbitrary query text compiles and shapes without failing.
    #[test]
    fn prop_malformed_queries_never_abort(data in data_strategy(), text in noise_strategy()) {
        let (_, diagnostics) = compile_with_diagnostics(&text);
        let line_count = text.lines().count();
        for diagnostic in &diagnostics {
            prop_assert!(diagnostic.line <= line_count.max(1));
        }
        prop_assert!(shape(&data, &text, None).is_ok());
    }

    /// Integer arithmetic follows the usual precedence.
    #[test]
    fn prop_integer_arithmetic(a in -1000i64..1000, b in -1000i64..1000, c in -1000i64..1000) {
        let scope = serde_json::Map::new();
        let result = evaluate(&format!("{a} + {b} * {c} - ({a} - {c})"), &scope);
        prop_assert_eq!(result, json!(a + b * c - (a - c)));
    }
}
