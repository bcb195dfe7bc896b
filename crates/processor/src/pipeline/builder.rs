//! Settings and builder for the stream transformer

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clock::Clock;
use crate::error::{ProcessorError, Result};
use crate::kafka::{RecordSink, RecordSource, DEFAULT_POLL_TIMEOUT};
use crate::pipeline::executor::StreamTransformer;
use crate::window::SnapshotSink;

/// Default aggregation interval
pub const DEFAULT_AGGREGATION_INTERVAL: Duration = Duration::from_secs(60);

/// What the orchestration loop needs to know besides its collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerSettings {
    /// Topics to subscribe to
    pub input_topics: Vec<String>,

    /// Topic transformed records are published to
    pub output_topic: String,

    /// Upper bound on a single poll
    pub poll_timeout: Duration,

    /// Tumbling window length
    pub aggregation_interval: Duration,
}

impl Default for TransformerSettings {
    fn default() -> Self {
        Self {
            input_topics: vec!["user-login".to_string()],
            output_topic: "processed-user-events".to_string(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            aggregation_interval: DEFAULT_AGGREGATION_INTERVAL,
        }
    }
}

impl TransformerSettings {
    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.input_topics.is_empty() || self.input_topics.iter().any(|t| t.trim().is_empty()) {
            return Err(ProcessorError::Configuration {
                source: "at least one non-empty input topic is required".into(),
            });
        }

        if self.output_topic.trim().is_empty() {
            return Err(ProcessorError::Configuration {
                source: "output topic cannot be empty".into(),
            });
        }

        if self.poll_timeout.is_zero() {
            return Err(ProcessorError::Configuration {
                source: "poll timeout must be greater than 0".into(),
            });
        }

        if self.aggregation_interval.is_zero() {
            return Err(ProcessorError::Configuration {
                source: "aggregation interval must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

/// Builder for [`StreamTransformer`]
///
/// # Example
///
/// ```rust
/// use processor::clock::ManualClock;
/// use processor::kafka::{InMemorySink, InMemorySource};
/// use processor::pipeline::StreamTransformerBuilder;
/// use std::time::Duration;
///
/// # fn example() -> anyhow::Result<()> {
/// let transformer = StreamTransformerBuilder::new()
///     .with_input_topic("user-login")
///     .with_output_topic("processed-user-events")
///     .with_aggregation_interval(Duration::from_secs(60))
///     .build(InMemorySource::new(), InMemorySink::new(), ManualClock::from_secs(0))?;
///
/// assert_eq!(transformer.settings().output_topic, "processed-user-events");
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Default)]
pub struct StreamTransformerBuilder {
    settings: TransformerSettings,
    input_topics_set: bool,
    snapshot_sink: Option<Box<dyn SnapshotSink>>,
}

impl StreamTransformerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing settings
    pub fn from_settings(settings: TransformerSettings) -> Self {
        Self {
            settings,
            input_topics_set: true,
            snapshot_sink: None,
        }
    }

    /// Add an input topic. The first call replaces the default topic list.
    pub fn with_input_topic<S: Into<String>>(mut self, topic: S) -> Self {
        if !self.input_topics_set {
            self.settings.input_topics.clear();
            self.input_topics_set = true;
        }
        self.settings.input_topics.push(topic.into());
        self
    }

    /// Replace the input topic list
    pub fn with_input_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.input_topics = topics.into_iter().map(|s| s.into()).collect();
        self.input_topics_set = true;
        self
    }

    pub fn with_output_topic<S: Into<String>>(mut self, topic: S) -> Self {
        self.settings.output_topic = topic.into();
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.settings.poll_timeout = timeout;
        self
    }

    pub fn with_aggregation_interval(mut self, interval: Duration) -> Self {
        self.settings.aggregation_interval = interval;
        self
    }

    /// Where flushed window snapshots go. Defaults to the log.
    pub fn with_snapshot_sink<K: SnapshotSink + 'static>(mut self, sink: K) -> Self {
        self.snapshot_sink = Some(Box::new(sink));
        self
    }

    /// Validate the settings and assemble the transformer
    pub fn build<S, P, C>(self, source: S, sink: P, clock: C) -> Result<StreamTransformer<S, P, C>>
    where
        S: RecordSource,
        P: RecordSink,
        C: Clock,
    {
        let transformer = StreamTransformer::new(self.settings, source, sink, clock)?;
        Ok(match self.snapshot_sink {
            Some(snapshot_sink) => transformer.with_snapshot_sink(snapshot_sink),
            None => transformer,
        })
    }
}
