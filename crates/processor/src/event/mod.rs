//! Device events as they travel through the transformer
//!
//! A raw payload is decoded into a JSON map ([`decode`]), checked against the
//! event contract ([`validate`]), padded with the schema fields
//! ([`ensure_schema_consistency`]) and finally turned into a
//! [`ProcessedEvent`] ready to be republished.
//!
//! Keys the transformer does not know about are kept in
//! [`ParsedEvent::extra`] and written back out unchanged, so producers can add
//! fields without a coordinated deploy.

pub mod error;
pub mod schema;
pub mod validation;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub use error::{DecodeError, EventError, ValidationError};
pub use schema::{ensure_schema_consistency, fill_schema_fields, SCHEMA_FIELDS};
pub use validation::{validate, DEFAULT_DEVICE_TYPE, REQUIRED_FIELDS};

/// Field added to every republished event
pub const PROCESSED_AT_FIELD: &str = "processed_at";

/// A validated device event.
///
/// `device_id` and `timestamp` only have to be present; their values are
/// republished as received, numbers and nulls included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub user_id: String,
    pub device_id: Value,
    pub timestamp: Value,

    /// Device category, `"unknown"` when the producer did not send one
    #[serde(default = "default_device_type")]
    pub device_type: String,

    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_version: Option<Value>,

    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub ip: Option<Value>,

    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub locale: Option<Value>,

    /// Unrecognized keys, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_device_type() -> String {
    DEFAULT_DEVICE_TYPE.to_string()
}

// A key that is present with a `null` value is still present.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl ParsedEvent {
    /// Aggregation bucket for this event: the lower-cased device type.
    pub fn category(&self) -> String {
        self.device_type.to_lowercase()
    }
}

/// An event ready to be published downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEvent {
    #[serde(flatten)]
    pub event: ParsedEvent,

    /// Epoch seconds at which the transformer handled the event
    pub processed_at: i64,
}

impl ProcessedEvent {
    /// Upper-case `user_id` and stamp `processed_at`.
    ///
    /// A `processed_at` key sent by the producer is replaced, not duplicated.
    pub fn transform(mut event: ParsedEvent, processed_at: i64) -> Self {
        event.user_id = event.user_id.to_uppercase();
        event.extra.remove(PROCESSED_AT_FIELD);

        Self {
            event,
            processed_at,
        }
    }

    /// Partition key for the output topic, `None` for a null `device_id`.
    pub fn key(&self) -> Option<String> {
        match &self.event.device_id {
            Value::Null => None,
            Value::String(id) => Some(id.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Serialize to the JSON wire format
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Decode a raw payload into a JSON object.
pub fn decode(payload: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    match serde_json::from_slice::<Value>(payload)? {
        Value::Object(map) => Ok(map),
        Value::Null => Err(DecodeError::NotAnObject { found: "null" }),
        Value::Bool(_) => Err(DecodeError::NotAnObject { found: "boolean" }),
        Value::Number(_) => Err(DecodeError::NotAnObject { found: "number" }),
        Value::String(_) => Err(DecodeError::NotAnObject { found: "string" }),
        Value::Array(_) => Err(DecodeError::NotAnObject { found: "array" }),
    }
}

/// Decode and validate a payload in one step.
pub fn parse_event(payload: &[u8]) -> Result<ParsedEvent, EventError> {
    let map = decode(payload)?;
    Ok(validate(map)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_object() {
        let map = decode(br#"{"user_id":"abc","extra":1}"#).unwrap();
        assert_eq!(map.get("user_id"), Some(&json!("abc")));
        assert_eq!(map.get("extra"), Some(&json!(1)));
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert!(matches!(decode(b""), Err(DecodeError::EmptyPayload)));
        assert!(matches!(decode(b"not json"), Err(DecodeError::InvalidJson(_))));
        assert!(matches!(
            decode(b"[1,2,3]"),
            Err(DecodeError::NotAnObject { found: "array" })
        ));
        assert!(matches!(
            decode(b"\"abc\""),
            Err(DecodeError::NotAnObject { found: "string" })
        ));
        assert!(matches!(decode(&[0xff, 0xfe, 0x7b]), Err(DecodeError::InvalidJson(_))));
    }

    #[test]
    fn test_parse_event_distinguishes_errors() {
        let err = parse_event(b"{oops").unwrap_err();
        assert!(matches!(err, EventError::Decode(_)));

        let err = parse_event(br#"{"invalid_field":"x"}"#).unwrap_err();
        assert!(matches!(
            err,
            EventError::Validation(ValidationError::MissingField { field: "user_id" })
        ));
    }

    #[test]
    fn test_category_is_lowercase() {
        let event = parse_event(
            br#"{"user_id":"u","device_id":"d","timestamp":"t","device_type":"Mobile"}"#,
        )
        .unwrap();
        assert_eq!(event.category(), "mobile");
        assert_eq!(event.device_type, "Mobile");
    }

    #[test]
    fn test_transform_uppercases_user_id() {
        let event = parse_event(br#"{"user_id":"abc","device_id":"d1","timestamp":"t1"}"#).unwrap();
        let processed = ProcessedEvent::transform(event, 1_700_000_000);

        assert_eq!(processed.event.user_id, "ABC");
        assert_eq!(processed.event.device_id, json!("d1"));
        assert_eq!(processed.processed_at, 1_700_000_000);
        assert_eq!(processed.key().as_deref(), Some("d1"));
    }

    #[test]
    fn test_non_string_identifiers_are_kept() {
        let event =
            parse_event(br#"{"user_id":"abc","device_id":42,"timestamp":1694479551}"#).unwrap();
        let processed = ProcessedEvent::transform(event, 7);

        assert_eq!(processed.key().as_deref(), Some("42"));
        let value: Value = serde_json::from_slice(&processed.to_bytes().unwrap()).unwrap();
        assert_eq!(value["device_id"], json!(42));
        assert_eq!(value["timestamp"], json!(1694479551));

        let event = parse_event(br#"{"user_id":"abc","device_id":null,"timestamp":null}"#).unwrap();
        let processed = ProcessedEvent::transform(event, 7);

        assert_eq!(processed.key(), None);
        let value: Value = serde_json::from_slice(&processed.to_bytes().unwrap()).unwrap();
        assert_eq!(value["device_id"], Value::Null);
        assert_eq!(value["timestamp"], Value::Null);
    }

    #[test]
    fn test_transform_replaces_producer_processed_at() {
        let event = parse_event(
            br#"{"user_id":"abc","device_id":"d1","timestamp":"t1","processed_at":"yesterday"}"#,
        )
        .unwrap();
        let processed = ProcessedEvent::transform(event, 42);

        let value: Value = serde_json::from_slice(&processed.to_bytes().unwrap()).unwrap();
        assert_eq!(value["processed_at"], json!(42));
    }

    #[test]
    fn test_wire_format_passes_unknown_fields_through() {
        let event = parse_event(
            br#"{"user_id":"abc","device_id":"d1","timestamp":"t1","session":{"id":7},"tags":["a"]}"#,
        )
        .unwrap();
        let processed = ProcessedEvent::transform(ensure_schema_consistency(event), 10);

        let value: Value = serde_json::from_slice(&processed.to_bytes().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "user_id": "ABC",
                "device_id": "d1",
                "timestamp": "t1",
                "device_type": "unknown",
                "app_version": "",
                "ip": "",
                "locale": "",
                "session": {"id": 7},
                "tags": ["a"],
                "processed_at": 10
            })
        );
    }

    #[test]
    fn test_processed_event_round_trips_from_wire() {
        let bytes = br#"{"user_id":"ABC","device_id":"d1","timestamp":"t1","device_type":"Mobile","app_version":"","ip":"","locale":"","processed_at":5}"#;
        let processed: ProcessedEvent = serde_json::from_slice(bytes).unwrap();

        assert_eq!(processed.processed_at, 5);
        assert_eq!(processed.event.device_type, "Mobile");
        assert!(processed.event.extra.is_empty());
    }
}
