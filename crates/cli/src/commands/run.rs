//! Run command - provision the output topic and drive the transformer until
//! interrupted

use anyhow::{Context, Result};
use processor::clock::SystemClock;
use processor::kafka::{
    ensure_topic, KafkaRecordSink, KafkaRecordSource, KafkaTopicProvisioner, RecordSink,
};
use processor::pipeline::StreamTransformerBuilder;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use transformer_config::TransformerConfig;

/// How long to wait for in-flight records after the loop stops
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RunCommand {
    config: TransformerConfig,
    skip_provisioning: bool,
}

impl RunCommand {
    pub fn new(config: TransformerConfig, skip_provisioning: bool) -> Self {
        Self {
            config,
            skip_provisioning,
        }
    }

    /// Execute the run command
    pub async fn execute(self) -> Result<()> {
        let config = self.config;

        if config.provisioning.enabled && !self.skip_provisioning {
            provision_output_topic(&config).await;
        }

        let source = KafkaRecordSource::new(config.source_config())
            .context("failed to create Kafka consumer")?;
        let sink = KafkaRecordSink::new(config.sink_config())
            .context("failed to create Kafka producer")?;

        let mut transformer = StreamTransformerBuilder::from_settings(config.transformer_settings())
            .build(source, sink, SystemClock)
            .context("failed to build transformer")?;

        let shutdown = CancellationToken::new();
        tokio::spawn(wait_for_interrupt(shutdown.clone()));

        let stats = transformer.run(shutdown).await?;

        if let Err(e) = transformer.sink().flush(FLUSH_TIMEOUT).await {
            warn!("Producer flush incomplete: {}", e);
        }
        let metrics = transformer.sink().metrics().await;

        info!(
            records_polled = stats.records_polled,
            records_published = stats.records_published,
            records_skipped = stats.records_skipped,
            records_committed = stats.records_committed,
            windows_flushed = stats.windows_flushed,
            publish_ratio = stats.publish_ratio(),
            messages_delivered = metrics.messages_delivered,
            messages_failed = metrics.messages_failed,
            "Stream transformer stopped"
        );
        Ok(())
    }
}

/// Create the output topic if needed. Failures are logged and startup continues.
async fn provision_output_topic(config: &TransformerConfig) {
    let provisioner =
        match KafkaTopicProvisioner::new(&config.kafka.brokers, config.provisioning.timeout()) {
            Ok(provisioner) => provisioner,
            Err(e) => {
                error!("Failed to create admin client: {}", e);
                return;
            }
        };

    ensure_topic(&provisioner, &config.output_topic_spec()).await;
}

async fn wait_for_interrupt(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Interrupt received, shutting down");
            shutdown.cancel();
        }
        Err(e) => error!("Failed to listen for interrupt: {}", e),
    }
}
