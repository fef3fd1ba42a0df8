//! Firestore typed-value encoding.
//!
//! Firestore's REST API wraps every value in a single-key object naming its
//! type (`{"stringValue": "a"}`, `{"integerValue": "3"}`, ...). Documents in
//! the rest of the storefront are plain JSON, so values are converted at the
//! client boundary.

use serde_json::{Map, Value, json};

use crate::backend::documents::{Document, DocumentStoreError};

/// Encode a plain JSON value as a Firestore value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => n.as_i64().map_or_else(
            || json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
            // 64-bit integers travel as strings
            |i| json!({ "integerValue": i.to_string() }),
        ),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

/// Encode a document's fields.
pub fn encode_fields(document: &Document) -> Map<String, Value> {
    document
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Decode a Firestore value into plain JSON.
///
/// # Errors
///
/// Returns `DocumentStoreError::Decode` for malformed or unknown value types.
pub fn decode_value(value: &Value) -> Result<Value, DocumentStoreError> {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(DocumentStoreError::Decode(format!(
            "expected a typed value, got {value}"
        )));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" => Ok(inner.clone()),
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(|i| Value::Number(i.into()))
                .map_err(|e| DocumentStoreError::Decode(format!("bad integerValue {s}: {e}"))),
            Value::Number(n) => Ok(Value::Number(n.clone())),
            other => Err(DocumentStoreError::Decode(format!(
                "bad integerValue {other}"
            ))),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "arrayValue" => inner
            .get("values")
            .and_then(Value::as_array)
            .map_or_else(|| Ok(Vec::new()), |values| values.iter().map(decode_value).collect())
            .map(Value::Array),
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            decode_fields(&fields).map(Value::Object)
        }
        "geoPointValue" => Ok(inner.clone()),
        other => Err(DocumentStoreError::Decode(format!(
            "unsupported value type {other}"
        ))),
    }
}

/// Decode a Firestore `fields` map into a plain document.
///
/// # Errors
///
/// Returns `DocumentStoreError::Decode` if any field fails to decode.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Document, DocumentStoreError> {
    fields
        .iter()
        .map(|(key, value)| decode_value(value).map(|v| (key.clone(), v)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::Number;

    use super::*;

    fn double(value: f64) -> Value {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }

    #[test]
    fn test_scalars() {
        assert_eq!(encode_value(&json!("a")), json!({"stringValue": "a"}));
        assert_eq!(encode_value(&json!(3)), json!({"integerValue": "3"}));
        assert_eq!(encode_value(&json!(2.5)), json!({"doubleValue": 2.5}));
        assert_eq!(encode_value(&json!(true)), json!({"booleanValue": true}));
        assert_eq!(encode_value(&Value::Null), json!({"nullValue": null}));
    }

    #[test]
    fn test_decode_integer_from_string() {
        assert_eq!(
            decode_value(&json!({"integerValue": "42"})).unwrap(),
            json!(42)
        );
        assert!(decode_value(&json!({"integerValue": "forty"})).is_err());
    }

    #[test]
    fn test_decode_double() {
        assert_eq!(
            decode_value(&json!({"doubleValue": 89.9})).unwrap(),
            double(89.9)
        );
    }

    #[test]
    fn test_nested_category_document() {
        let plain = json!({
            "id": "jackets",
            "products": [
                {"id": "p1", "name": "Parka", "price": 250, "imageUrl": "https://img/p1.jpg"},
                {"id": "p2", "name": "Denim", "price": 89.9, "imageUrl": "https://img/p2.jpg"}
            ]
        });
        let document = plain.as_object().cloned().unwrap();

        let encoded = encode_fields(&document);
        assert_eq!(
            encoded["products"]["arrayValue"]["values"][0]["mapValue"]["fields"]["price"],
            json!({"integerValue": "250"})
        );

        let decoded = decode_fields(&encoded).unwrap();
        assert_eq!(Value::Object(decoded), plain);
    }

    #[test]
    fn test_empty_array_and_map() {
        assert_eq!(
            decode_value(&json!({"arrayValue": {}})).unwrap(),
            json!([])
        );
        assert_eq!(decode_value(&json!({"mapValue": {}})).unwrap(), json!({}));
    }

    #[test]
    fn test_rejects_untyped_values() {
        assert!(decode_value(&json!("raw")).is_err());
        assert!(decode_value(&json!({"mysteryValue": 1})).is_err());
    }
}
