use std::cmp::Ordering;

use stepgraph_core::error::{Result, StepgraphError};
use stepgraph_core::types::{CompareOp, Condition, NodeConfig};
use stepgraph_core::value::{compare_ordered, lookup_path, type_name, values_equal, StateMap};

/// Apply `op` to `left` and `right`.
///
/// `eq`/`ne` accept any pair of values. The ordering operators require
/// two numbers or two strings and fail with `UnsupportedOperator` otherwise.
pub fn compare(left: &serde_json::Value, op: CompareOp, right: &serde_json::Value) -> Result<bool> {
    let ordered = |check: fn(Ordering) -> bool| -> Result<bool> {
        compare_ordered(left, right)
            .map(check)
            .ok_or_else(|| StepgraphError::UnsupportedOperator {
                op: op.to_string(),
                left: type_name(left).to_string(),
                right: type_name(right).to_string(),
            })
    };

    match op {
        CompareOp::Eq => Ok(values_equal(left, right)),
        CompareOp::Ne => Ok(!values_equal(left, right)),
        CompareOp::Lt => ordered(Ordering::is_lt),
        CompareOp::Lte => ordered(Ordering::is_le),
        CompareOp::Gt => ordered(Ordering::is_gt),
        CompareOp::Gte => ordered(Ordering::is_ge),
    }
}

/// Evaluate a condition against the state.
pub fn evaluate(state: &StateMap, condition: &Condition) -> Result<bool> {
    let actual = lookup_path(state, &condition.key);
    compare(&actual, condition.op, &condition.value)
}

/// Pick the node that follows `node`. `None` means the run is complete.
pub fn resolve_successor(state: &StateMap, node: &NodeConfig) -> Result<Option<String>> {
    let Some(condition) = &node.condition else {
        return Ok(node.next.clone());
    };
    let branch = if evaluate(state, condition)? {
        &condition.on_true
    } else {
        &condition.on_false
    };
    Ok(branch.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepgraph_test_utils::state;

    fn branching(op: CompareOp, value: serde_json::Value) -> NodeConfig {
        NodeConfig::new("t")
            .with_next("ignored")
            .with_condition(Condition::new("x", op, value).on_true("yes").on_false("no"))
    }

    fn resolve(x: serde_json::Value, op: CompareOp, value: serde_json::Value) -> Option<String> {
        resolve_successor(&state(json!({ "x": x })), &branching(op, value)).unwrap()
    }

    #[test]
    fn test_no_condition_uses_next() {
        let node = NodeConfig::new("t").with_next("b");
        assert_eq!(
            resolve_successor(&StateMap::new(), &node).unwrap().as_deref(),
            Some("b")
        );
        let terminal = NodeConfig::new("t");
        assert_eq!(resolve_successor(&StateMap::new(), &terminal).unwrap(), None);
    }

    #[test]
    fn test_condition_overrides_next() {
        assert_eq!(resolve(json!(1), CompareOp::Eq, json!(1)).as_deref(), Some("yes"));
        assert_eq!(resolve(json!(2), CompareOp::Eq, json!(1)).as_deref(), Some("no"));
    }

    #[test]
    fn test_numeric_operators() {
        let cases = [
            (CompareOp::Lt, 1, 2, true),
            (CompareOp::Lt, 2, 2, false),
            (CompareOp::Lte, 2, 2, true),
            (CompareOp::Lte, 3, 2, false),
            (CompareOp::Gt, 3, 2, true),
            (CompareOp::Gt, 2, 2, false),
            (CompareOp::Gte, 2, 2, true),
            (CompareOp::Gte, 1, 2, false),
            (CompareOp::Eq, 2, 2, true),
            (CompareOp::Eq, 1, 2, false),
            (CompareOp::Ne, 1, 2, true),
            (CompareOp::Ne, 2, 2, false),
        ];
        for (op, left, right, holds) in cases {
            let expected = if holds { "yes" } else { "no" };
            assert_eq!(
                resolve(json!(left), op, json!(right)).as_deref(),
                Some(expected),
                "{left} {op} {right}"
            );
        }
    }

    #[test]
    fn test_mixed_int_and_float() {
        assert_eq!(resolve(json!(1.5), CompareOp::Lt, json!(2)).as_deref(), Some("yes"));
        assert_eq!(resolve(json!(2), CompareOp::Eq, json!(2.0)).as_deref(), Some("yes"));
    }

    #[test]
    fn test_string_ordering() {
        assert_eq!(resolve(json!("apple"), CompareOp::Lt, json!("banana")).as_deref(), Some("yes"));
        assert_eq!(resolve(json!("b"), CompareOp::Gte, json!("a")).as_deref(), Some("yes"));
    }

    #[test]
    fn test_equality_across_types_is_unequal_not_error() {
        assert_eq!(resolve(json!("1"), CompareOp::Eq, json!(1)).as_deref(), Some("no"));
        assert_eq!(resolve(json!("1"), CompareOp::Ne, json!(1)).as_deref(), Some("yes"));
        assert_eq!(resolve(json!([1, 2]), CompareOp::Eq, json!([1, 2])).as_deref(), Some("yes"));
        assert_eq!(resolve(json!({"a": 1}), CompareOp::Ne, json!(null)).as_deref(), Some("yes"));
    }

    #[test]
    fn test_ordering_mismatched_types_is_unsupported() {
        for op in [CompareOp::Lt, CompareOp::Lte, CompareOp::Gt, CompareOp::Gte] {
            let err = resolve_successor(&state(json!({"x": "3"})), &branching(op, json!(1))).unwrap_err();
            assert!(matches!(err, StepgraphError::UnsupportedOperator { .. }), "{op}");
        }
        let err = resolve_successor(&state(json!({"x": true})), &branching(CompareOp::Gt, json!(false)))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported operator 'gt' between boolean and boolean");
    }

    #[test]
    fn test_missing_key_is_null() {
        let node = NodeConfig::new("t").with_condition(
            Condition::new("a.b.c", CompareOp::Eq, json!(null)).on_true("yes").on_false("no"),
        );
        let cases = [
            json!({}),
            json!({"a": {}}),
            json!({"a": {"b": 5}}),
            json!({"a": "not a map"}),
        ];
        for s in cases {
            assert_eq!(resolve_successor(&state(s), &node).unwrap().as_deref(), Some("yes"));
        }
    }

    #[test]
    fn test_missing_key_in_ordering_is_unsupported() {
        let node = NodeConfig::new("t")
            .with_condition(Condition::new("missing", CompareOp::Lt, json!(3)).on_true("yes"));
        let err = resolve_successor(&StateMap::new(), &node).unwrap_err();
        assert!(err.to_string().contains("between null and number"));
    }

    #[test]
    fn test_nested_path() {
        let node = NodeConfig::new("t").with_condition(
            Condition::new("metrics.score", CompareOp::Gte, json!(0.9)).on_true("done").on_false("retry"),
        );
        let s = state(json!({"metrics": {"score": 0.95}}));
        assert_eq!(resolve_successor(&s, &node).unwrap().as_deref(), Some("done"));
    }

    #[test]
    fn test_null_branch_completes() {
        let node = NodeConfig::new("t").with_condition(
            Condition::new("done", CompareOp::Eq, json!(true)).on_false("t"),
        );
        assert_eq!(resolve_successor(&state(json!({"done": true})), &node).unwrap(), None);
        assert_eq!(
            resolve_successor(&state(json!({"done": false})), &node).unwrap().as_deref(),
            Some("t")
        );
    }
}
