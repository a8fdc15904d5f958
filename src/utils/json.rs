//! Helpers for the nested-array payloads exchanged with engines.

use serde_json::Value;

/// Flatten a nested JSON value into its numbers, depth-first.
///
/// Non-numeric leaves (strings, booleans, null) are skipped. Object members
/// are visited in their stored order.
pub fn flatten_numbers(value: &Value) -> Vec<f64> {
    let mut out = Vec::new();
    collect(value, &mut out);
    out
}

/// [`flatten_numbers`] narrowed to f32.
pub fn flatten_numbers_f32(value: &Value) -> Vec<f32> {
    flatten_numbers(value).into_iter().map(|v| v as f32).collect()
}

fn collect(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_f64() {
                out.push(v);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect(item, out)),
        Value::Null | Value::Bool(_) | Value::String(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_rows() {
        let v = json!([[1.0, 2.5], [3], [[4.0, [5.0]]]]);
        assert_eq!(flatten_numbers(&v), vec![1.0, 2.5, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_flatten_skips_non_numbers() {
        let v = json!([1, "x", null, true, [2]]);
        assert_eq!(flatten_numbers(&v), vec![1.0, 2.0]);
        assert!(flatten_numbers(&json!("unavailable")).is_empty());
    }

    #[test]
    fn test_scalar_is_single_value() {
        assert_eq!(flatten_numbers_f32(&json!(0.5)), vec![0.5f32]);
    }
}
