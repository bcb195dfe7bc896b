//! Event contract validation.

use serde_json::{Map, Value};
use tracing::warn;

use super::error::ValidationError;
use super::ParsedEvent;

/// Keys every event must carry
pub const REQUIRED_FIELDS: [&str; 3] = ["user_id", "device_id", "timestamp"];

/// Category used when an event has no `device_type`
pub const DEFAULT_DEVICE_TYPE: &str = "unknown";

const DEVICE_TYPE_FIELD: &str = "device_type";

/// Validate a decoded payload against the event contract.
///
/// Fails with [`ValidationError::MissingField`] for the first absent required
/// key. `device_id` and `timestamp` accept any JSON value; `user_id` and
/// `device_type` must be strings or the event fails with
/// [`ValidationError::InvalidField`]. A missing `device_type` is filled with
/// [`DEFAULT_DEVICE_TYPE`]; that is reported as a warning, not an error.
pub fn validate(map: Map<String, Value>) -> Result<ParsedEvent, ValidationError> {
    if let Some(field) = REQUIRED_FIELDS
        .iter()
        .copied()
        .find(|f| !map.contains_key(*f))
    {
        return Err(ValidationError::MissingField { field });
    }

    if !map.contains_key(DEVICE_TYPE_FIELD) {
        warn!(
            user_id = ?map.get("user_id"),
            device_id = ?map.get("device_id"),
            "device_type is missing, defaulting to '{}'",
            DEFAULT_DEVICE_TYPE
        );
    }

    serde_json::from_value(Value::Object(map)).map_err(|e| ValidationError::InvalidField {
        message: e.to_string(),
    })
}
