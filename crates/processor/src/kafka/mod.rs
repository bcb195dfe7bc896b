//! Kafka channels for the stream transformer
//!
//! The orchestration loop talks to its collaborators through three traits:
//!
//! - [`RecordSource`]: pull records from the input topics and commit offsets
//! - [`RecordSink`]: enqueue transformed records on the output topic
//! - [`TopicProvisioner`]: create the output topic at startup
//!
//! Each has a Kafka implementation built on rdkafka and an in-process one in
//! [`memory`] for tests and broker-less runs.
//!
//! # Example
//!
//! ```rust,no_run
//! use processor::kafka::{KafkaRecordSource, KafkaSourceConfig, RecordSource};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = KafkaSourceConfig {
//!     brokers: "localhost:9092".to_string(),
//!     topics: vec!["user-login".to_string()],
//!     ..Default::default()
//! };
//!
//! let mut source = KafkaRecordSource::new(config.clone())?;
//! source.subscribe(&config.topics)?;
//!
//! while let Some(record) = source.poll(config.poll_timeout()).await {
//!     println!("offset {}", record.offset);
//!     source.commit(&record)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod error;
pub mod memory;
pub mod sink;
pub mod source;

pub use admin::{ensure_topic, KafkaTopicProvisioner, ProvisionOutcome, TopicProvisioner, TopicSpec};
pub use error::{ErrorSeverity, KafkaError, Result};
pub use memory::{CommittedOffset, InMemoryProvisioner, InMemorySink, InMemorySource, PublishedRecord};
pub use sink::{KafkaRecordSink, KafkaSinkConfig, RecordSink, SinkMetrics};
pub use source::{
    KafkaRecordSource, KafkaSourceConfig, RecordError, RecordSource, SourceRecord,
    DEFAULT_POLL_TIMEOUT,
};
