//! Output channel: the Kafka producer side
//!
//! [`RecordSink::publish`] only enqueues. Delivery happens in librdkafka's
//! background thread and the delivery report is awaited by a detached task
//! that updates [`SinkMetrics`]; the orchestration loop never waits for it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::error::{KafkaError, Result};

/// Default timeout for message delivery
const DEFAULT_MESSAGE_TIMEOUT_MS: u64 = 30000;

/// Configuration for the Kafka output channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSinkConfig {
    /// Kafka bootstrap servers
    pub brokers: String,

    /// Client ID for this producer
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Delivery timeout (milliseconds)
    #[serde(default = "default_message_timeout")]
    pub message_timeout_ms: u64,

    /// Compression type (none, gzip, snappy, lz4, zstd)
    #[serde(default = "default_compression")]
    pub compression_type: String,

    /// Acknowledgment level (0, 1, all)
    #[serde(default = "default_acks")]
    pub acks: String,

    /// Linger time for batching (milliseconds)
    #[serde(default = "default_linger")]
    pub linger_ms: u64,

    /// Additional librdkafka producer configuration
    #[serde(default)]
    pub extra_config: HashMap<String, String>,
}

fn default_client_id() -> String { "stream-transformer-producer".to_string() }
fn default_message_timeout() -> u64 { DEFAULT_MESSAGE_TIMEOUT_MS }
fn default_compression() -> String { "none".to_string() }
fn default_acks() -> String { "all".to_string() }
fn default_linger() -> u64 { 5 }

impl Default for KafkaSinkConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:29092".to_string(),
            client_id: default_client_id(),
            message_timeout_ms: DEFAULT_MESSAGE_TIMEOUT_MS,
            compression_type: default_compression(),
            acks: default_acks(),
            linger_ms: default_linger(),
            extra_config: HashMap::new(),
        }
    }
}

/// Push-based output channel.
#[async_trait]
pub trait RecordSink: Send {
    /// Enqueue `payload` for delivery to `topic` and return immediately
    fn publish(&self, topic: &str, key: Option<&str>, payload: Vec<u8>) -> Result<()>;

    /// Wait up to `timeout` for enqueued records to be delivered
    async fn flush(&self, timeout: Duration) -> Result<()>;
}

/// Production metrics
#[derive(Debug, Default, Clone)]
pub struct SinkMetrics {
    /// Messages accepted into the producer queue
    pub messages_enqueued: u64,
    /// Messages acknowledged by the broker
    pub messages_delivered: u64,
    /// Messages whose delivery failed
    pub messages_failed: u64,
    /// Payload bytes enqueued
    pub bytes_enqueued: u64,
    /// Last error timestamp
    pub last_error: Option<DateTime<Utc>>,
    /// Last error message
    pub last_error_msg: Option<String>,
}

/// Internal metrics tracking, shared with delivery tasks
#[derive(Default)]
struct MetricsTracker {
    messages_enqueued: AtomicU64,
    messages_delivered: AtomicU64,
    messages_failed: AtomicU64,
    bytes_enqueued: AtomicU64,
    last_error: Mutex<Option<(DateTime<Utc>, String)>>,
}

impl MetricsTracker {
    fn record_enqueued(&self, bytes: usize) {
        self.messages_enqueued.fetch_add(1, Ordering::Relaxed);
        self.bytes_enqueued.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    async fn record_failure(&self, error: String) {
        self.messages_failed.fetch_add(1, Ordering::Relaxed);
        let mut last_error = self.last_error.lock().await;
        *last_error = Some((Utc::now(), error));
    }

    async fn snapshot(&self) -> SinkMetrics {
        let last_error = self.last_error.lock().await;
        let (last_error_time, last_error_msg) = last_error
            .as_ref()
            .map(|(t, m)| (Some(*t), Some(m.clone())))
            .unwrap_or((None, None));

        SinkMetrics {
            messages_enqueued: self.messages_enqueued.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            bytes_enqueued: self.bytes_enqueued.load(Ordering::Relaxed),
            last_error: last_error_time,
            last_error_msg,
        }
    }
}

/// Kafka-backed output channel
pub struct KafkaRecordSink {
    producer: FutureProducer,
    config: KafkaSinkConfig,
    metrics: Arc<MetricsTracker>,
}

impl KafkaRecordSink {
    /// Create the producer.
    pub fn new(config: KafkaSinkConfig) -> Result<Self> {
        if config.brokers.trim().is_empty() {
            return Err(KafkaError::invalid_config(
                "brokers must not be empty",
                Some("brokers".to_string()),
            ));
        }

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.client_id)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("compression.type", &config.compression_type)
            .set("acks", &config.acks)
            .set("linger.ms", config.linger_ms.to_string());

        for (key, value) in &config.extra_config {
            client_config.set(key, value);
        }

        let producer: FutureProducer = client_config
            .create()
            .map_err(|e| KafkaError::connection(e.to_string(), config.brokers.clone()))?;

        info!(brokers = %config.brokers, client_id = %config.client_id, "Kafka producer created");

        Ok(Self {
            producer,
            config,
            metrics: Arc::new(MetricsTracker::default()),
        })
    }

    pub fn config(&self) -> &KafkaSinkConfig {
        &self.config
    }

    /// Get current production metrics
    pub async fn metrics(&self) -> SinkMetrics {
        self.metrics.snapshot().await
    }
}

#[async_trait]
impl RecordSink for KafkaRecordSink {
    fn publish(&self, topic: &str, key: Option<&str>, payload: Vec<u8>) -> Result<()> {
        let mut record = FutureRecord::<str, [u8]>::to(topic).payload(payload.as_slice());
        if let Some(key) = key {
            record = record.key(key);
        }

        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(e, _)| KafkaError::production(e.to_string(), topic))?;

        self.metrics.record_enqueued(payload.len());

        let metrics = Arc::clone(&self.metrics);
        let topic = topic.to_string();
        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok(_)) => {
                    metrics.record_delivered();
                    debug!(topic = %topic, "Record delivered");
                }
                Ok(Err((e, _))) => {
                    error!(topic = %topic, "Record delivery failed: {}", e);
                    metrics.record_failure(e.to_string()).await;
                }
                Err(_) => {
                    warn!(topic = %topic, "Delivery report dropped before completion");
                    metrics.record_failure("delivery canceled".to_string()).await;
                }
            }
        });

        Ok(())
    }

    async fn flush(&self, timeout: Duration) -> Result<()> {
        let producer = self.producer.clone();
        let in_flight = producer.in_flight_count();
        info!(in_flight, "Flushing Kafka producer");

        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| KafkaError::task_failed("flush", e.to_string()))?
            .map_err(|_| KafkaError::timeout("producer flush", timeout.as_millis() as u64))
    }
}
