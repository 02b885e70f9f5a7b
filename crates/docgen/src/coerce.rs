//! Backend-specific record reshaping.

use loader_core::BackendKind;
use serde_json::Value;

/// Render a float the way the wide-column backend stores it: a decimal
/// string that always carries a fractional part.
pub fn decimal_string(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn stringify_floats(value: Value) -> Value {
    match value {
        Value::Number(n) => {
            if n.is_f64() {
                Value::String(decimal_string(n.as_f64().unwrap_or_default()))
            } else {
                Value::Number(n)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(stringify_floats).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, val)| (key, stringify_floats(val)))
                .collect(),
        ),
        other => other,
    }
}

fn trim_padding(record: &mut Value, overshoot: usize) {
    if overshoot == 0 {
        return;
    }
    if let Some(Value::String(padding)) = record.get_mut("padding") {
        let keep = padding.len().saturating_sub(overshoot);
        padding.truncate(keep);
    }
}

/// Apply backend-specific coercions to a synthesized record.
///
/// The wide-column backend refuses floats, so every floating-point scalar
/// (recursively into nested containers) is replaced by its decimal-string
/// rendering; the growth that conversion causes is then trimmed off the end
/// of `padding` so the serialized size still matches the original target.
/// All other backends take the record as-is.
pub fn coerce_for_backend(record: Value, kind: BackendKind) -> Value {
    match kind {
        BackendKind::Dynamo => {
            let target = record
                .get("document_size")
                .and_then(Value::as_u64)
                .map(|size| size as usize)
                .unwrap_or_else(|| serialized_len(&record));
            let mut coerced = stringify_floats(record);
            let overshoot = serialized_len(&coerced).saturating_sub(target);
            trim_padding(&mut coerced, overshoot);
            coerced
        }
        _ => record,
    }
}

fn serialized_len(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_decimal_string_rendering() {
        assert_eq!(decimal_string(1000.0), "1000.0");
        assert_eq!(decimal_string(4.2), "4.2");
        assert_eq!(decimal_string(0.0), "0.0");
        assert_eq!(decimal_string(-2.5), "-2.5");
    }

    #[test]
    fn test_floats_become_strings_recursively() {
        let record = serde_json::json!({
            "price": 3000.0,
            "nested": {"avg_rating": 4.5, "count": 7},
            "list": [1.5, 2, "x"],
        });
        let coerced = coerce_for_backend(record, BackendKind::Dynamo);
        assert_eq!(coerced["price"], "3000.0");
        assert_eq!(coerced["nested"]["avg_rating"], "4.5");
        assert_eq!(coerced["nested"]["count"], 7);
        assert_eq!(coerced["list"][0], "1.5");
        assert_eq!(coerced["list"][1], 2);
    }

    #[test]
    fn test_coercion_preserves_target_size() {
        let mut rng = StdRng::seed_from_u64(42);
        for size in [1024usize, 2048, 4096] {
            let hotel = template::synthesize(&mut rng, size, None);
            let padding_len = hotel.padding.len();
            let record = serde_json::to_value(&hotel).unwrap();
            let grown = serde_json::to_string(&stringify_floats(record.clone()))
                .unwrap()
                .len();
            let coerced = coerce_for_backend(record, BackendKind::Dynamo);
            let len = serde_json::to_string(&coerced).unwrap().len();
            if padding_len >= grown.saturating_sub(size) {
                assert!(
                    len.abs_diff(size) <= 1,
                    "target {size}, coerced length {len}"
                );
            } else {
                // Not enough padding left to absorb the growth; the trim
                // still removes everything it can.
                assert!(len < grown);
            }
        }
    }

    #[test]
    fn test_other_backends_pass_through() {
        let record = serde_json::json!({"price": 3000.0});
        let coerced = coerce_for_backend(record.clone(), BackendKind::Mongo);
        assert_eq!(coerced, record);
    }
}
