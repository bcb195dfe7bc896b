//! Errors raised by the Kafka channels.
//!
//! Each rdkafka failure is mapped at the call site, where the topic, broker
//! or offset involved is known. Whether an error is fatal is decided by the
//! caller: the orchestration loop treats everything after startup as
//! non-fatal and only uses [`KafkaError::severity`] to pick a log level.

use std::fmt;
use thiserror::Error;

/// Result type alias for Kafka operations.
pub type Result<T> = std::result::Result<T, KafkaError>;

/// Error type for the input, output and admin channels.
///
/// # Examples
///
/// ```rust
/// use processor::kafka::{ErrorSeverity, KafkaError};
///
/// let err = KafkaError::offset_commit("Broker: Not coordinator", "user-login", 0, 41);
/// assert_eq!(err.severity(), ErrorSeverity::Warning);
/// assert!(err.to_string().contains("user-login"));
/// ```
#[derive(Error, Debug)]
pub enum KafkaError {
    /// A client handle could not be created.
    #[error("Failed to connect to Kafka broker {broker}: {message}")]
    Connection { message: String, broker: String },

    /// A record could not be enqueued on the producer.
    #[error("Failed to produce message to topic {topic}: {message}")]
    Production { message: String, topic: String },

    /// Channel settings were rejected before any client was built.
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
        /// Offending setting, when there is a single one
        field: Option<String>,
    },

    /// An asynchronous commit could not be issued.
    #[error("Failed to commit offset {offset} for {topic} [{partition}]: {message}")]
    OffsetCommit {
        message: String,
        topic: String,
        partition: i32,
        offset: i64,
    },

    #[error("Failed to subscribe to topics {topics:?}: {message}")]
    Subscription { message: String, topics: Vec<String> },

    /// Cluster metadata could not be fetched for a topic.
    #[error("Topic metadata error for topic {topic}: {message}")]
    TopicMetadata { message: String, topic: String },

    /// The admin API refused to create a topic.
    #[error("Failed to provision topic {topic}: {message}")]
    Provisioning { message: String, topic: String },

    /// A bounded wait ran out.
    #[error("Operation timed out after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// A blocking client call could not be joined.
    #[error("Kafka {task} task failed: {message}")]
    TaskFailed { task: &'static str, message: String },

    /// The channel handle was already released.
    #[error("Kafka {handle} handle is closed")]
    Closed {
        /// Which handle ("consumer", "producer").
        handle: &'static str,
    },
}

impl KafkaError {
    pub fn connection(message: impl Into<String>, broker: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            broker: broker.into(),
        }
    }

    pub fn production(message: impl Into<String>, topic: impl Into<String>) -> Self {
        Self::Production {
            message: message.into(),
            topic: topic.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, field: Option<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            field,
        }
    }

    pub fn offset_commit(
        message: impl Into<String>,
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
    ) -> Self {
        Self::OffsetCommit {
            message: message.into(),
            topic: topic.into(),
            partition,
            offset,
        }
    }

    pub fn subscription(message: impl Into<String>, topics: Vec<String>) -> Self {
        Self::Subscription {
            message: message.into(),
            topics,
        }
    }

    pub fn topic_metadata(message: impl Into<String>, topic: impl Into<String>) -> Self {
        Self::TopicMetadata {
            message: message.into(),
            topic: topic.into(),
        }
    }

    pub fn provisioning(message: impl Into<String>, topic: impl Into<String>) -> Self {
        Self::Provisioning {
            message: message.into(),
            topic: topic.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn task_failed(task: &'static str, message: impl Into<String>) -> Self {
        Self::TaskFailed {
            task,
            message: message.into(),
        }
    }

    /// How loudly the error should be reported.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            KafkaError::InvalidConfiguration { .. } | KafkaError::Subscription { .. } => {
                ErrorSeverity::Critical
            }
            KafkaError::Connection { .. }
            | KafkaError::Production { .. }
            | KafkaError::Provisioning { .. }
            | KafkaError::TaskFailed { .. }
            | KafkaError::Closed { .. } => ErrorSeverity::Error,
            KafkaError::Timeout { .. }
            | KafkaError::OffsetCommit { .. }
            | KafkaError::TopicMetadata { .. } => ErrorSeverity::Warning,
        }
    }
}

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Warning,
    Error,
    /// The channel cannot be used at all
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
