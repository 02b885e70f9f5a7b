//! JSON to DynamoDB attribute conversion.

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::Value;
use std::collections::HashMap;

/// Convert a JSON value into its DynamoDB attribute form. Numbers map to
/// `N`; callers feed coerced (float-free) records, so `N` only ever carries
/// integers here.
pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute_value).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(key, val)| (key.clone(), to_attribute_value(val)))
                .collect(),
        ),
    }
}

/// Flatten a record object into an item map, guaranteeing the partition key
/// attribute exists (a fresh UUID when the record does not carry one).
pub fn to_item(record: &Value, primary_key: &str) -> HashMap<String, AttributeValue> {
    let mut item: HashMap<String, AttributeValue> = match record {
        Value::Object(fields) => fields
            .iter()
            .map(|(key, val)| (key.clone(), to_attribute_value(val)))
            .collect(),
        other => HashMap::from([("value".to_string(), to_attribute_value(other))]),
    };
    let needs_key = !matches!(item.get(primary_key), Some(AttributeValue::S(s)) if !s.is_empty());
    if needs_key {
        item.insert(
            primary_key.to_string(),
            AttributeValue::S(uuid::Uuid::new_v4().to_string()),
        );
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_mapping() {
        assert_eq!(
            to_attribute_value(&json!("hotel")),
            AttributeValue::S("hotel".to_string())
        );
        assert_eq!(
            to_attribute_value(&json!(42)),
            AttributeValue::N("42".to_string())
        );
        assert_eq!(to_attribute_value(&json!(true)), AttributeValue::Bool(true));
        assert_eq!(to_attribute_value(&Value::Null), AttributeValue::Null(true));
    }

    #[test]
    fn test_nested_mapping() {
        let attr = to_attribute_value(&json!({"reviews": [{"rating": 7}]}));
        let AttributeValue::M(map) = attr else {
            panic!("expected a map");
        };
        let AttributeValue::L(reviews) = &map["reviews"] else {
            panic!("expected a list");
        };
        let AttributeValue::M(review) = &reviews[0] else {
            panic!("expected a map");
        };
        assert_eq!(review["rating"], AttributeValue::N("7".to_string()));
    }

    #[test]
    fn test_item_gets_partition_key() {
        let item = to_item(&json!({"name": "Oakhurst Inn"}), "pk");
        assert!(matches!(&item["pk"], AttributeValue::S(s) if !s.is_empty()));

        let item = to_item(&json!({"pk": "fixed", "name": "x"}), "pk");
        assert_eq!(item["pk"], AttributeValue::S("fixed".to_string()));
    }
}
