//! Helpers over `serde_json::Value`, the dynamic value used for run state
//! and condition operands.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// The mutable state bag a run carries from node to node.
pub type StateMap = serde_json::Map<String, Value>;

/// Short type label used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Structural equality over the whole value union.
///
/// Numbers compare by numeric value, so `1` equals `1.0`. Values of
/// different types are never equal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Natural ordering for mutually ordered values.
///
/// Only number/number and string/string pairs are ordered; every other
/// pair (including NaN-producing numbers) returns `None`.
pub fn compare_ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Exact numeric ordering. Integers are never rounded through `f64`, so
/// `2^53 + 1` stays greater than `2^53` written as a float.
fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    match (integer(x), integer(y)) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        (Some(a), None) => compare_int_float(a, y.as_f64()?),
        (None, Some(b)) => compare_int_float(b, x.as_f64()?).map(Ordering::reverse),
        (None, None) => x.as_f64()?.partial_cmp(&y.as_f64()?),
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn compare_int_float(i: i128, f: f64) -> Option<Ordering> {
    // 2^127: floats at or past this bound lie outside i128
    const BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

    if f.is_nan() {
        return None;
    }
    if f >= BOUND {
        return Some(Ordering::Less);
    }
    if f < -BOUND {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i128)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)),
        other => Some(other),
    }
}

/// Look up a dotted path (`"a.b.c"`) in the state.
///
/// Each segment descends one level into a nested object. A missing key
/// or a non-object intermediate yields `Value::Null`.
pub fn lookup_path(state: &StateMap, path: &str) -> Value {
    let mut segments = path.split('.');
    let first = match segments.next() {
        Some(s) => s,
        None => return Value::Null,
    };
    let mut current = match state.get(first) {
        Some(v) => v,
        None => return Value::Null,
    };
    for segment in segments {
        current = match current.as_object().and_then(|obj| obj.get(segment)) {
            Some(v) => v,
            None => return Value::Null,
        };
    }
    current.clone()
}
