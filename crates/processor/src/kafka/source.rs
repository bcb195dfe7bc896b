//! Input channel: the Kafka consumer side
//!
//! [`RecordSource`] is the pull-based contract the orchestration loop drives:
//! subscribe once, poll with a bounded timeout, commit asynchronously, close on
//! shutdown. [`KafkaRecordSource`] implements it on top of an rdkafka
//! `StreamConsumer` with auto-commit disabled; redelivery after a restart
//! starts from the last committed offset (at-least-once).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::error::{KafkaError as RdKafkaError, KafkaResult};
use rdkafka::message::BorrowedMessage;
use rdkafka::{ClientContext, Message, Offset, TopicPartitionList};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::{KafkaError, Result};

/// Default poll timeout for the consumer
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration for the Kafka input channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSourceConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Topics to subscribe to
    pub topics: Vec<String>,
    /// Where to start when the group has no committed offset
    pub auto_offset_reset: Option<String>,
    /// Report end-of-partition events
    pub enable_partition_eof: bool,
    /// Poll timeout in milliseconds
    pub poll_timeout_ms: u64,
    /// Additional librdkafka consumer configuration
    #[serde(default)]
    pub extra_config: HashMap<String, String>,
}

impl Default for KafkaSourceConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:29092".to_string(),
            group_id: "advanced-consumer-group".to_string(),
            topics: vec!["user-login".to_string()],
            auto_offset_reset: Some("earliest".to_string()),
            enable_partition_eof: true,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT.as_millis() as u64,
            extra_config: HashMap::new(),
        }
    }
}

impl KafkaSourceConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.brokers.trim().is_empty() {
            return Err(KafkaError::invalid_config(
                "brokers must not be empty",
                Some("brokers".to_string()),
            ));
        }
        if self.group_id.trim().is_empty() {
            return Err(KafkaError::invalid_config(
                "group_id must not be empty",
                Some("group_id".to_string()),
            ));
        }
        if self.topics.is_empty() || self.topics.iter().any(|t| t.trim().is_empty()) {
            return Err(KafkaError::invalid_config(
                "at least one non-empty input topic is required",
                Some("topics".to_string()),
            ));
        }
        if self.poll_timeout_ms == 0 {
            return Err(KafkaError::invalid_config(
                "poll_timeout_ms must be greater than 0",
                Some("poll_timeout_ms".to_string()),
            ));
        }
        Ok(())
    }
}

/// Transport-level condition attached to a polled record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The consumer caught up with the end of a partition; informational
    EndOfPartition,
    /// Any other consumer error; the loop logs it and keeps polling
    Transport(String),
}

/// A record pulled from the input channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    /// Raw payload bytes
    pub payload: Option<Vec<u8>>,
    /// Message key (if present)
    pub key: Option<Vec<u8>>,
    /// Topic name
    pub topic: String,
    /// Partition
    pub partition: i32,
    /// Offset
    pub offset: i64,
    /// Broker timestamp (if available)
    pub timestamp: Option<DateTime<Utc>>,
    /// Transport error, if this poll produced one instead of data
    pub error: Option<RecordError>,
}

impl SourceRecord {
    /// A data record.
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            payload: Some(payload.into()),
            key: None,
            topic: topic.into(),
            partition,
            offset,
            timestamp: None,
            error: None,
        }
    }

    /// An end-of-partition notification.
    pub fn end_of_partition(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            payload: None,
            key: None,
            topic: topic.into(),
            partition,
            offset,
            timestamp: None,
            error: Some(RecordError::EndOfPartition),
        }
    }

    /// A transport error surfaced by the consumer.
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            payload: None,
            key: None,
            topic: String::new(),
            partition: -1,
            offset: -1,
            timestamp: None,
            error: Some(RecordError::Transport(message.into())),
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    fn from_message(msg: &BorrowedMessage<'_>) -> Self {
        Self {
            payload: msg.payload().map(|p| p.to_vec()),
            key: msg.key().map(|k| k.to_vec()),
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            timestamp: msg
                .timestamp()
                .to_millis()
                .and_then(DateTime::from_timestamp_millis),
            error: None,
        }
    }
}

/// Pull-based input channel.
#[async_trait]
pub trait RecordSource: Send {
    /// Subscribe to the given topics
    fn subscribe(&mut self, topics: &[String]) -> Result<()>;

    /// Wait up to `timeout` for the next record; `None` when nothing arrived
    async fn poll(&mut self, timeout: Duration) -> Option<SourceRecord>;

    /// Issue an asynchronous commit covering `record`; does not wait for the broker
    fn commit(&mut self, record: &SourceRecord) -> Result<()>;

    /// Release the channel handle
    fn close(&mut self) -> Result<()>;
}

/// Consumer context for logging rebalances and commit results
struct SourceConsumerContext;

impl ClientContext for SourceConsumerContext {}

impl ConsumerContext for SourceConsumerContext {
    fn pre_rebalance(&self, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Revoke(tpl) => info!("Partition revocation: {:?}", tpl),
            Rebalance::Assign(tpl) => info!("Partition assignment: {:?}", tpl),
            Rebalance::Error(err) => error!("Rebalance error: {}", err),
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(_) => debug!("Committed offsets: {:?}", offsets),
            Err(err) => warn!("Commit callback error: {}", err),
        }
    }
}

/// Kafka-backed input channel
pub struct KafkaRecordSource {
    consumer: Option<StreamConsumer<SourceConsumerContext>>,
    config: KafkaSourceConfig,
}

impl KafkaRecordSource {
    /// Create the consumer. Does not subscribe.
    pub fn new(config: KafkaSourceConfig) -> Result<Self> {
        config.validate()?;
        let consumer = Self::create_consumer(&config)?;

        info!(
            brokers = %config.brokers,
            group_id = %config.group_id,
            "Kafka consumer created"
        );

        Ok(Self {
            consumer: Some(consumer),
            config,
        })
    }

    fn create_consumer(config: &KafkaSourceConfig) -> Result<StreamConsumer<SourceConsumerContext>> {
        let mut client_config = ClientConfig::new();

        client_config
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set(
                "enable.partition.eof",
                if config.enable_partition_eof { "true" } else { "false" },
            );

        if let Some(ref reset) = config.auto_offset_reset {
            client_config.set("auto.offset.reset", reset);
        }

        for (key, value) in &config.extra_config {
            client_config.set(key, value);
        }

        client_config
            .create_with_context(SourceConsumerContext)
            .map_err(|e| KafkaError::connection(e.to_string(), config.brokers.clone()))
    }

    pub fn config(&self) -> &KafkaSourceConfig {
        &self.config
    }

    fn consumer(&self) -> Result<&StreamConsumer<SourceConsumerContext>> {
        self.consumer
            .as_ref()
            .ok_or(KafkaError::Closed { handle: "consumer" })
    }
}

#[async_trait]
impl RecordSource for KafkaRecordSource {
    fn subscribe(&mut self, topics: &[String]) -> Result<()> {
        let topic_refs: Vec<&str> = topics.iter().map(|s| s.as_str()).collect();

        self.consumer()?
            .subscribe(&topic_refs)
            .map_err(|e| KafkaError::subscription(e.to_string(), topics.to_vec()))?;

        info!("Subscribed to topics: {:?}", topics);
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Option<SourceRecord> {
        let consumer = self.consumer.as_ref()?;

        match tokio::time::timeout(timeout, consumer.recv()).await {
            Err(_elapsed) => None,
            Ok(Ok(msg)) => Some(SourceRecord::from_message(&msg)),
            Ok(Err(RdKafkaError::PartitionEOF(partition))) => {
                // librdkafka only reports the partition; the rest comes from
                // the consumer's current positions.
                let (topic, offset) = consumer
                    .position()
                    .ok()
                    .and_then(|positions| partition_end(&positions, partition))
                    .unwrap_or_else(|| (String::new(), -1));
                Some(SourceRecord::end_of_partition(topic, partition, offset))
            }
            Ok(Err(e)) => Some(SourceRecord::transport_error(e.to_string())),
        }
    }

    fn commit(&mut self, record: &SourceRecord) -> Result<()> {
        let to_commit_err = |e: RdKafkaError| {
            KafkaError::offset_commit(
                e.to_string(),
                record.topic.clone(),
                record.partition,
                record.offset,
            )
        };

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &record.topic,
            record.partition,
            Offset::Offset(record.offset + 1),
        )
        .map_err(to_commit_err)?;

        self.consumer()?
            .commit(&tpl, CommitMode::Async)
            .map_err(to_commit_err)?;

        debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            "Issued async offset commit"
        );
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(consumer) = self.consumer.take() {
            info!("Stopping Kafka consumer");
            consumer.unsubscribe();
            drop(consumer);
            info!("Kafka consumer closed");
        }
        Ok(())
    }
}

/// Topic and next offset of the first assigned `partition` in `positions`.
fn partition_end(positions: &TopicPartitionList, partition: i32) -> Option<(String, i64)> {
    positions
        .elements()
        .into_iter()
        .find(|elem| elem.partition() == partition)
        .map(|elem| {
            let offset = match elem.offset() {
                Offset::Offset(offset) => offset,
                _ => -1,
            };
            (elem.topic().to_string(), offset)
        })
}
