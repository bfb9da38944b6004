//! Metadata normalization.
//!
//! The store only accepts scalar metadata values (string/number/bool) or
//! null. Ingestion sources — front-matter, spreadsheet cells — are untrusted
//! in shape, so coercion is a total function: it never fails, whatever the
//! input. Lists and nested objects are serialized to compact JSON text;
//! the transform is lossy in type but lossless in information.
//!
//! Date-like values are normalized to ISO-8601 text at the reader boundary
//! (see [`crate::reader`]) — JSON's value model has no date variant, so by
//! the time metadata reaches this module a date is already a string.

use serde_json::Value;

use crate::models::Metadata;

/// Normalize arbitrary metadata into the scalar-only shape the store
/// requires. Scalars and null pass through unchanged; arrays and objects
/// become compact JSON text.
pub fn coerce(meta: &Metadata) -> Metadata {
    meta.iter()
        .map(|(k, v)| (k.clone(), coerce_value(v)))
        .collect()
}

fn coerce_value(v: &Value) -> Value {
    match v {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => v.clone(),
        Value::Array(_) | Value::Object(_) => {
            Value::String(serde_json::to_string(v).unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(v: Value) -> Metadata {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn scalar_passthrough_is_exact() {
        let meta = as_map(json!({"x": 5, "name": "Ada", "ok": true, "ratio": 0.5, "gone": null}));
        assert_eq!(coerce(&meta), meta);
    }

    #[test]
    fn list_becomes_json_text_parseable_back() {
        let meta = as_map(json!({"skills": ["rust", "sql"]}));
        let coerced = coerce(&meta);
        let stored = coerced.get("skills").and_then(Value::as_str).unwrap();
        let parsed: Value = serde_json::from_str(stored).unwrap();
        assert_eq!(parsed, json!(["rust", "sql"]));
    }

    #[test]
    fn nested_object_becomes_json_text() {
        let meta = as_map(json!({"contact": {"email": "a@b.se", "phone": null}}));
        let coerced = coerce(&meta);
        let stored = coerced.get("contact").and_then(Value::as_str).unwrap();
        let parsed: Value = serde_json::from_str(stored).unwrap();
        assert_eq!(parsed, json!({"email": "a@b.se", "phone": null}));
    }

    #[test]
    fn empty_metadata_is_fine() {
        assert!(coerce(&Metadata::new()).is_empty());
    }

    #[test]
    fn mixed_shapes_coerce_independently() {
        let meta = as_map(json!({
            "title": "Backend Engineer",
            "tags": ["go", "grpc"],
            "year": 2025
        }));
        let coerced = coerce(&meta);
        assert_eq!(coerced.get("title"), Some(&json!("Backend Engineer")));
        assert_eq!(coerced.get("year"), Some(&json!(2025)));
        assert!(coerced.get("tags").unwrap().is_string());
    }
}
