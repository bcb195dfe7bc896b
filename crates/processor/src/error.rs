//! Error types for the stream transformer
//!
//! Record-scoped failures (bad payloads, missing fields) live in
//! [`crate::event::EventError`] and never reach this type: the orchestration
//! loop counts them and moves on. `ProcessorError` covers the failures that
//! can stop startup or the loop itself.

use thiserror::Error;

use crate::kafka::KafkaError;

/// Main processor error type
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Kafka client errors (channel construction, subscription, commit)
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// Window-related errors
    #[error("window error: {0}")]
    Window(#[from] WindowError),

    /// Configuration errors
    #[error("configuration error: {source}")]
    Configuration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Aggregation window errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// Window interval is invalid
    #[error("invalid window interval: {interval_secs}s, must be greater than 0")]
    InvalidInterval { interval_secs: u64 },
}

/// Result type alias for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Result type alias for window operations
pub type WindowResult<T> = std::result::Result<T, WindowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_error_display() {
        let err = ProcessorError::from(WindowError::InvalidInterval { interval_secs: 0 });
        assert_eq!(
            err.to_string(),
            "window error: invalid window interval: 0s, must be greater than 0"
        );
    }

    #[test]
    fn test_kafka_error_conversion() {
        let err: ProcessorError = KafkaError::connection("refused", "localhost:9092").into();
        assert!(matches!(err, ProcessorError::Kafka(KafkaError::Connection { .. })));
    }

    #[test]
    fn test_configuration_error_from_str() {
        let err = ProcessorError::Configuration {
            source: "output topic must not be empty".into(),
        };
        assert!(err.to_string().contains("output topic must not be empty"));
    }
}
