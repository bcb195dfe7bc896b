//! Stream transformer pipeline
//!
//! [`StreamTransformer`] is the consume → validate → transform → aggregate →
//! publish → commit loop. It is generic over its collaborators so the same
//! loop runs against Kafka in production and in-memory channels in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use processor::clock::SystemClock;
//! use processor::kafka::{KafkaRecordSink, KafkaRecordSource, KafkaSinkConfig, KafkaSourceConfig};
//! use processor::pipeline::StreamTransformerBuilder;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let source = KafkaRecordSource::new(KafkaSourceConfig::default())?;
//! let sink = KafkaRecordSink::new(KafkaSinkConfig::default())?;
//!
//! let mut transformer = StreamTransformerBuilder::new()
//!     .with_input_topic("user-login")
//!     .with_output_topic("processed-user-events")
//!     .build(source, sink, SystemClock)?;
//!
//! let shutdown = CancellationToken::new();
//! let stats = transformer.run(shutdown).await?;
//! println!("published {}", stats.records_published);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod executor;
pub mod stats;

pub use builder::{StreamTransformerBuilder, TransformerSettings, DEFAULT_AGGREGATION_INTERVAL};
pub use executor::{StepOutcome, StreamTransformer};
pub use stats::TransformerStats;
