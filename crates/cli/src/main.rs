//! Stream transformer CLI
//!
//! Consumes login events from Kafka, republishes them normalized and logs
//! per-device-type counts every aggregation interval.

mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::RunCommand;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use transformer_config::TransformerConfig;

#[derive(Parser, Debug)]
#[command(
    name = "stream-transformer",
    version,
    about = "Validate, transform and aggregate Kafka login events",
    long_about = "Consumes JSON login events, fills missing schema fields, upper-cases \
                  user IDs, republishes them to an output topic and logs per-device-type \
                  counts once per aggregation interval.\n\n\
                  Settings come from defaults, an optional YAML file, TRANSFORMER_* \
                  environment variables and finally these flags."
)]
struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        env = "TRANSFORMER_CONFIG_FILE",
        value_name = "FILE",
        help = "Path to a YAML configuration file"
    )]
    config: Option<PathBuf>,

    /// Kafka bootstrap servers
    #[arg(long, value_name = "HOST:PORT")]
    brokers: Option<String>,

    /// Consumer group ID
    #[arg(long, value_name = "GROUP")]
    group_id: Option<String>,

    /// Topic to consume from (repeatable)
    #[arg(long = "input-topic", value_name = "TOPIC")]
    input_topics: Vec<String>,

    /// Topic to publish transformed events to
    #[arg(long, value_name = "TOPIC")]
    output_topic: Option<String>,

    /// Aggregation window length in seconds
    #[arg(long, value_name = "SECS")]
    interval_secs: Option<u64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Do not create the output topic at startup
    #[arg(long)]
    skip_provisioning: bool,
}

impl Cli {
    /// Flags win over file and environment values
    fn apply_overrides(&self, config: &mut TransformerConfig) {
        if let Some(brokers) = &self.brokers {
            config.kafka.brokers = brokers.clone();
        }
        if let Some(group_id) = &self.group_id {
            config.kafka.group_id = group_id.clone();
        }
        if !self.input_topics.is_empty() {
            config.kafka.input_topics = self.input_topics.clone();
        }
        if let Some(output_topic) = &self.output_topic {
            config.kafka.output_topic = output_topic.clone();
        }
        if let Some(interval_secs) = self.interval_secs {
            config.aggregation.interval_secs = interval_secs;
        }
        if let Some(log_level) = &self.log_level {
            config.observability.log_level = log_level.clone();
        }
        if self.json_logs {
            config.observability.json_logging = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        TransformerConfig::load(cli.config.clone()).context("failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("invalid configuration")?;

    init_tracing(&config.observability.log_level, config.observability.json_logging)?;

    tracing::info!(
        brokers = %config.kafka.brokers,
        group_id = %config.kafka.group_id,
        "Configuration loaded"
    );

    RunCommand::new(config, cli.skip_provisioning).execute().await
}

/// Initialize tracing/logging
fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "stream-transformer",
            "--brokers",
            "kafka:9092",
            "--input-topic",
            "a",
            "--input-topic",
            "b",
            "--interval-secs",
            "5",
            "--json-logs",
        ])
        .unwrap();

        let mut config = TransformerConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.kafka.brokers, "kafka:9092");
        assert_eq!(config.kafka.input_topics, vec!["a", "b"]);
        assert_eq!(config.aggregation.interval_secs, 5);
        assert!(config.observability.json_logging);
        assert_eq!(config.kafka.group_id, "advanced-consumer-group");
        assert_eq!(config.kafka.output_topic, "processed-user-events");
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::try_parse_from(["stream-transformer"]).unwrap();
        let mut config = TransformerConfig::default();
        config.kafka.output_topic = "from-file".to_string();
        cli.apply_overrides(&mut config);

        assert_eq!(config.kafka.output_topic, "from-file");
        assert!(!cli.skip_provisioning);
    }
}
