//! Record-scoped errors.
//!
//! These never stop the orchestration loop: a record that fails to decode or
//! validate is counted as skipped and the loop polls again.

use thiserror::Error;

/// Why a record was skipped.
#[derive(Error, Debug)]
pub enum EventError {
    /// The payload is not a JSON object
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The payload decoded but does not satisfy the event contract
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl EventError {
    /// Short label for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            EventError::Decode(_) => "decode",
            EventError::Validation(_) => "validation",
        }
    }
}

/// Payload decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Record carried no payload at all
    #[error("record has no payload")]
    EmptyPayload,

    /// Payload is not valid UTF-8 JSON
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Payload is valid JSON but not an object
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

/// Event contract violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required key is absent
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    /// A known key holds a value of the wrong type
    #[error("invalid field: {message}")]
    InvalidField { message: String },
}
