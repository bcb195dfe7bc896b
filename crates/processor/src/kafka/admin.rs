//! Output topic provisioning
//!
//! Before the loop starts the output topic is created if the cluster does not
//! have it yet. Provisioning is best-effort: [`ensure_topic`] logs failures
//! and lets startup continue.

use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::types::RDKafkaErrorCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::error::{KafkaError, Result};

/// Topic to provision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
}

impl TopicSpec {
    /// A single-partition, single-replica topic
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: 1,
            replication_factor: 1,
        }
    }

    pub fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_replication_factor(mut self, replication_factor: i32) -> Self {
        self.replication_factor = replication_factor;
        self
    }
}

/// What provisioning did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
}

/// Cluster administration needed at startup.
#[async_trait]
pub trait TopicProvisioner: Send + Sync {
    /// Whether the cluster metadata lists `name`
    async fn topic_exists(&self, name: &str) -> Result<bool>;

    /// Create the topic; an existing topic is not an error
    async fn create_topic(&self, spec: &TopicSpec) -> Result<ProvisionOutcome>;
}

/// Make sure `spec.name` exists. Never fails; returns `None` if provisioning
/// could not complete.
pub async fn ensure_topic(
    provisioner: &dyn TopicProvisioner,
    spec: &TopicSpec,
) -> Option<ProvisionOutcome> {
    let result = async {
        if provisioner.topic_exists(&spec.name).await? {
            return Ok(ProvisionOutcome::AlreadyExists);
        }
        info!(topic = %spec.name, "Topic does not exist, creating it");
        provisioner.create_topic(spec).await
    }
    .await;

    match result {
        Ok(ProvisionOutcome::AlreadyExists) => {
            info!(topic = %spec.name, "Topic already exists");
            Some(ProvisionOutcome::AlreadyExists)
        }
        Ok(ProvisionOutcome::Created) => {
            info!(
                topic = %spec.name,
                partitions = spec.partitions,
                replication_factor = spec.replication_factor,
                "Topic created"
            );
            Some(ProvisionOutcome::Created)
        }
        Err(e) => {
            error!(topic = %spec.name, severity = %e.severity(), "Failed to provision topic: {}", e);
            None
        }
    }
}

/// Kafka-backed provisioner
pub struct KafkaTopicProvisioner {
    admin: Arc<AdminClient<DefaultClientContext>>,
    timeout: Duration,
}

impl KafkaTopicProvisioner {
    pub fn new(brokers: &str, timeout: Duration) -> Result<Self> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()
            .map_err(|e| KafkaError::connection(e.to_string(), brokers))?;

        Ok(Self {
            admin: Arc::new(admin),
            timeout,
        })
    }
}

#[async_trait]
impl TopicProvisioner for KafkaTopicProvisioner {
    async fn topic_exists(&self, name: &str) -> Result<bool> {
        let admin = Arc::clone(&self.admin);
        let timeout = self.timeout;

        let metadata = tokio::task::spawn_blocking(move || admin.inner().fetch_metadata(None, timeout))
            .await
            .map_err(|e| KafkaError::task_failed("metadata", e.to_string()))?
            .map_err(|e| KafkaError::topic_metadata(e.to_string(), name))?;

        Ok(metadata.topics().iter().any(|t| t.name() == name))
    }

    async fn create_topic(&self, spec: &TopicSpec) -> Result<ProvisionOutcome> {
        let new_topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication_factor),
        );
        let options = AdminOptions::new().operation_timeout(Some(self.timeout));

        let results = self
            .admin
            .create_topics(&[new_topic], &options)
            .await
            .map_err(|e| KafkaError::provisioning(e.to_string(), spec.name.clone()))?;

        for result in results {
            match result {
                Ok(_) => {}
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    return Ok(ProvisionOutcome::AlreadyExists)
                }
                Err((topic, code)) => {
                    return Err(KafkaError::provisioning(code.to_string(), topic));
                }
            }
        }
        Ok(ProvisionOutcome::Created)
    }
}
