//! Configuration management for the stream transformer
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables prefixed with `TRANSFORMER_` (nested keys separated
//! by `__`, e.g. `TRANSFORMER_KAFKA__BROKERS`).

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use processor::kafka::{KafkaSinkConfig, KafkaSourceConfig, TopicSpec};
use processor::pipeline::TransformerSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "TRANSFORMER_";

/// Main transformer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Kafka connection and topics
    pub kafka: KafkaConfig,

    /// Window aggregation
    pub aggregation: AggregationConfig,

    /// Output topic creation at startup
    pub provisioning: ProvisioningConfig,

    /// Observability settings
    pub observability: ObservabilityConfig,
}

impl TransformerConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::LoadError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.kafka.brokers.trim().is_empty() {
            return invalid("kafka.brokers is required");
        }
        if self.kafka.group_id.trim().is_empty() {
            return invalid("kafka.group_id is required");
        }
        if self.kafka.input_topics.is_empty()
            || self.kafka.input_topics.iter().any(|t| t.trim().is_empty())
        {
            return invalid("kafka.input_topics needs at least one non-empty topic");
        }
        if self.kafka.output_topic.trim().is_empty() {
            return invalid("kafka.output_topic is required");
        }
        if self.kafka.poll_timeout_ms == 0 {
            return invalid("kafka.poll_timeout_ms must be greater than 0");
        }
        if self.aggregation.interval_secs == 0 {
            return invalid("aggregation.interval_secs must be greater than 0");
        }
        if self.provisioning.partitions <= 0 {
            return invalid("provisioning.partitions must be positive");
        }
        if self.provisioning.replication_factor <= 0 {
            return invalid("provisioning.replication_factor must be positive");
        }

        Ok(())
    }

    /// Consumer settings for the input channel
    pub fn source_config(&self) -> KafkaSourceConfig {
        KafkaSourceConfig {
            brokers: self.kafka.brokers.clone(),
            group_id: self.kafka.group_id.clone(),
            topics: self.kafka.input_topics.clone(),
            auto_offset_reset: self.kafka.auto_offset_reset.clone(),
            enable_partition_eof: self.kafka.enable_partition_eof,
            poll_timeout_ms: self.kafka.poll_timeout_ms,
            extra_config: self.kafka.extra_config.clone(),
        }
    }

    /// Producer settings for the output channel
    pub fn sink_config(&self) -> KafkaSinkConfig {
        KafkaSinkConfig {
            brokers: self.kafka.brokers.clone(),
            extra_config: self.kafka.extra_config.clone(),
            ..Default::default()
        }
    }

    /// Settings for the orchestration loop
    pub fn transformer_settings(&self) -> TransformerSettings {
        TransformerSettings {
            input_topics: self.kafka.input_topics.clone(),
            output_topic: self.kafka.output_topic.clone(),
            poll_timeout: Duration::from_millis(self.kafka.poll_timeout_ms),
            aggregation_interval: Duration::from_secs(self.aggregation.interval_secs),
        }
    }

    /// The output topic as it should be provisioned
    pub fn output_topic_spec(&self) -> TopicSpec {
        TopicSpec::new(&self.kafka.output_topic)
            .with_partitions(self.provisioning.partitions)
            .with_replication_factor(self.provisioning.replication_factor)
    }
}

/// Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Bootstrap servers
    pub brokers: String,

    /// Consumer group ID
    pub group_id: String,

    /// Topics to consume from
    pub input_topics: Vec<String>,

    /// Topic to publish transformed events to
    pub output_topic: String,

    /// Where a new consumer group starts reading
    pub auto_offset_reset: Option<String>,

    /// Poll timeout in milliseconds
    pub poll_timeout_ms: u64,

    /// Report end-of-partition events
    pub enable_partition_eof: bool,

    /// Passed through to librdkafka for both consumer and producer
    pub extra_config: HashMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:29092".to_string(),
            group_id: "advanced-consumer-group".to_string(),
            input_topics: vec!["user-login".to_string()],
            output_topic: "processed-user-events".to_string(),
            auto_offset_reset: Some("earliest".to_string()),
            poll_timeout_ms: 100,
            enable_partition_eof: true,
            extra_config: HashMap::new(),
        }
    }
}

/// Aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Tumbling window length in seconds
    pub interval_secs: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

/// Topic provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Create the output topic at startup if it is missing
    pub enabled: bool,

    pub partitions: i32,

    pub replication_factor: i32,

    /// Admin request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            partitions: 1,
            replication_factor: 1,
            timeout_secs: 10,
        }
    }
}

impl ProvisioningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,

    /// Enable structured JSON logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}
