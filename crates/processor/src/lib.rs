//! Streaming transformer for user login events
//!
//! Consumes JSON events from Kafka, validates and normalizes them, counts
//! device categories in a tumbling window and republishes the transformed
//! events to an output topic.

pub mod clock;
pub mod error;
pub mod event;
pub mod kafka;
pub mod pipeline;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};

pub use error::{ProcessorError, Result as ProcessorResult, WindowError};

pub use event::{
    decode, ensure_schema_consistency, fill_schema_fields, parse_event, validate, DecodeError,
    EventError, ParsedEvent, ProcessedEvent, ValidationError,
};

pub use kafka::{
    ensure_topic, InMemoryProvisioner, InMemorySink, InMemorySource, KafkaError,
    KafkaRecordSink, KafkaRecordSource, KafkaSinkConfig, KafkaSourceConfig,
    KafkaTopicProvisioner, ProvisionOutcome, RecordSink, RecordSource, SourceRecord,
    TopicProvisioner, TopicSpec,
};

pub use pipeline::{
    StepOutcome, StreamTransformer, StreamTransformerBuilder, TransformerSettings,
    TransformerStats,
};

pub use window::{AggregationWindow, LogSnapshotSink, MemorySnapshotSink, SnapshotSink, WindowSnapshot};
