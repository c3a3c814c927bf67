//! Conversion between plain JSON and Firestore REST `Value` objects.
//!
//! The Firestore REST API wraps every field in a typed envelope
//! (`{"stringValue": "..."}`, `{"mapValue": {"fields": ...}}`, ...). The
//! rest of the workspace works with plain `serde_json::Value`; this module
//! is the only place that knows about the envelope.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

/// Encodes a plain JSON value into a Firestore `Value` object.
///
/// Integers become `integerValue` (stringified, per the API), other numbers
/// `doubleValue`. There is no JSON shape that encodes to `timestampValue`;
/// use [`timestamp_value`] for fields that must be stored as timestamps.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encodes a JSON object into a Firestore `fields` map.
pub fn encode_fields(map: &Map<String, Value>) -> Value {
    let mut fields = Map::new();
    for (key, value) in map {
        fields.insert(key.clone(), encode_value(value));
    }
    Value::Object(fields)
}

/// A `timestampValue` envelope for a concrete instant.
pub fn timestamp_value(instant: DateTime<Utc>) -> Value {
    json!({ "timestampValue": instant.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

/// Decodes a Firestore `Value` object back into plain JSON.
///
/// `timestampValue` decodes to its RFC 3339 string; the model layer's
/// flexible timestamp deserializer takes it from there. Unknown envelopes
/// decode to null rather than failing the whole document.
pub fn decode_value(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return Value::Null;
    };

    if map.contains_key("nullValue") {
        return Value::Null;
    }
    if let Some(b) = map.get("booleanValue") {
        return b.clone();
    }
    if let Some(i) = map.get("integerValue") {
        // integerValue arrives as a string; tolerate a bare number too
        return match i {
            Value::String(s) => s
                .parse::<i64>()
                .map(|parsed| json!(parsed))
                .unwrap_or(Value::Null),
            Value::Number(_) => i.clone(),
            _ => Value::Null,
        };
    }
    if let Some(d) = map.get("doubleValue") {
        return d.clone();
    }
    if let Some(t) = map.get("timestampValue") {
        return t.clone();
    }
    if let Some(s) = map.get("stringValue") {
        return s.clone();
    }
    if let Some(r) = map.get("referenceValue") {
        return r.clone();
    }
    if let Some(array) = map.get("arrayValue") {
        let items = array
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(decode_value).collect())
            .unwrap_or_default();
        return Value::Array(items);
    }
    if let Some(inner) = map.get("mapValue") {
        let fields = inner.get("fields").and_then(Value::as_object);
        let mut decoded = Map::new();
        if let Some(fields) = fields {
            for (key, value) in fields {
                decoded.insert(key.clone(), decode_value(value));
            }
        }
        return Value::Object(decoded);
    }

    Value::Null
}

/// Decodes a Firestore document into a plain JSON object with its `id`
/// (the last path segment of the document `name`) inserted.
pub fn decode_document(document: &Value) -> Option<Value> {
    let name = document.get("name").and_then(Value::as_str)?;
    let id = name.rsplit('/').next()?.to_string();

    let mut decoded = Map::new();
    decoded.insert("id".to_string(), Value::String(id));

    if let Some(fields) = document.get("fields").and_then(Value::as_object) {
        for (key, value) in fields {
            decoded.insert(key.clone(), decode_value(value));
        }
    }

    Some(Value::Object(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encode_decode_round_trip_for_notification_shapes() {
        let original = json!({
            "title": "CS 4550 attendance recorded",
            "read": false,
            "surfaces": ["toast", "inbox"],
            "payload": {
                "absenceCount": 3,
                "classId": "cls-1",
            },
        });

        let encoded = encode_fields(original.as_object().unwrap());
        let mut decoded = Map::new();
        for (key, value) in encoded.as_object().unwrap() {
            decoded.insert(key.clone(), decode_value(value));
        }
        assert_eq!(Value::Object(decoded), original);
    }

    #[test]
    fn timestamps_encode_to_timestamp_value() {
        let instant = Utc.with_ymd_and_hms(2026, 2, 3, 15, 30, 0).unwrap();
        let encoded = timestamp_value(instant);
        let raw = encoded.get("timestampValue").and_then(Value::as_str).unwrap();
        assert!(raw.starts_with("2026-02-03T15:30:00"));
        // decodes back to the raw string for the flexible deserializer
        assert_eq!(decode_value(&encoded), json!(raw));
    }

    #[test]
    fn decode_document_extracts_id_from_name() {
        let document = json!({
            "name": "projects/p/databases/(default)/documents/notifications/notif-7",
            "fields": { "title": { "stringValue": "hello" } },
        });
        let decoded = decode_document(&document).unwrap();
        assert_eq!(decoded["id"], json!("notif-7"));
        assert_eq!(decoded["title"], json!("hello"));
    }
}
