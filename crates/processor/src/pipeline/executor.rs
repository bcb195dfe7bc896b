//! The orchestration loop
//!
//! One iteration per poll: decode, validate, count, normalize, transform,
//! publish, commit, then check the aggregation window. A bad record is counted
//! and skipped; it never stops the loop.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::event::{ensure_schema_consistency, parse_event, ProcessedEvent};
use crate::kafka::{RecordError, RecordSink, RecordSource, SourceRecord};
use crate::pipeline::builder::TransformerSettings;
use crate::pipeline::stats::TransformerStats;
use crate::window::{AggregationWindow, LogSnapshotSink, SnapshotSink};

/// What a single loop iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The poll timed out
    Idle,
    /// The source reached the end of a partition
    EndOfPartition,
    /// The source reported a transport error
    TransportError,
    /// The record failed decoding or validation
    Skipped,
    /// The record was enqueued; `committed` tells whether the offset commit was issued
    Published { committed: bool },
    /// The record was valid but could not be enqueued; its offset is not committed
    PublishFailed,
}

/// Stream transformer: owns the live aggregation window and drives the
/// source, sink and clock it was built with.
///
/// Offsets are committed right after the output record is enqueued, without
/// waiting for the broker to acknowledge it. Delivery is at-least-once: a
/// crash after the commit but before delivery loses the record downstream.
pub struct StreamTransformer<S, P, C> {
    settings: TransformerSettings,
    source: S,
    sink: P,
    clock: C,
    window: AggregationWindow,
    snapshot_sink: Box<dyn SnapshotSink>,
    stats: TransformerStats,
    last_processed_at: Option<i64>,
    subscribed: bool,
}

impl<S, P, C> StreamTransformer<S, P, C>
where
    S: RecordSource,
    P: RecordSink,
    C: Clock,
{
    /// Create a transformer whose first window opens now.
    pub fn new(settings: TransformerSettings, source: S, sink: P, clock: C) -> Result<Self> {
        settings.validate()?;
        let window = AggregationWindow::new(settings.aggregation_interval, clock.now())?;

        Ok(Self {
            settings,
            source,
            sink,
            clock,
            window,
            snapshot_sink: Box::new(LogSnapshotSink),
            stats: TransformerStats::new(),
            last_processed_at: None,
            subscribed: false,
        })
    }

    /// Replace the snapshot destination
    pub fn with_snapshot_sink(mut self, snapshot_sink: Box<dyn SnapshotSink>) -> Self {
        self.snapshot_sink = snapshot_sink;
        self
    }

    pub fn settings(&self) -> &TransformerSettings {
        &self.settings
    }

    pub fn stats(&self) -> &TransformerStats {
        &self.stats
    }

    /// The live aggregation window
    pub fn window(&self) -> &AggregationWindow {
        &self.window
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    /// Subscribe to the input topics. Called by [`run`](Self::run); only needed
    /// when driving the loop with [`step`](Self::step).
    pub fn start(&mut self) -> Result<()> {
        if !self.subscribed {
            self.source.subscribe(&self.settings.input_topics)?;
            self.subscribed = true;
            info!(
                input_topics = ?self.settings.input_topics,
                output_topic = %self.settings.output_topic,
                interval_secs = self.settings.aggregation_interval.as_secs(),
                "Starting message consumption"
            );
        }
        Ok(())
    }

    /// Run one iteration: poll once, handle what came back, check the window.
    pub async fn step(&mut self) -> StepOutcome {
        let outcome = match self.source.poll(self.settings.poll_timeout).await {
            None => {
                self.stats.inc_idle_polls();
                StepOutcome::Idle
            }
            Some(record) => self.handle_record(&record),
        };

        self.check_window();
        outcome
    }

    /// Run until `shutdown` is cancelled, then release the source.
    ///
    /// Cancellation is observed while waiting on the poll; a record that has
    /// already been received is always processed to completion.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<TransformerStats> {
        self.start()?;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                outcome = self.step() => {
                    debug!(?outcome, "Loop iteration complete");
                }
            }
        }

        self.shutdown()?;
        Ok(self.stats.clone())
    }

    /// Close the input channel. Publishes and commits already issued may
    /// still be in flight.
    pub fn shutdown(&mut self) -> Result<()> {
        self.source.close()?;
        info!(
            records_published = self.stats.records_published,
            records_skipped = self.stats.records_skipped,
            records_committed = self.stats.records_committed,
            "Consumer closed"
        );
        Ok(())
    }

    fn handle_record(&mut self, record: &SourceRecord) -> StepOutcome {
        match &record.error {
            Some(RecordError::EndOfPartition) => {
                self.stats.inc_end_of_partition_events();
                info!(
                    "%% {} [{}] reached end at offset {}",
                    record.topic, record.partition, record.offset
                );
                StepOutcome::EndOfPartition
            }
            Some(RecordError::Transport(message)) => {
                self.stats.inc_transport_errors();
                error!("Consumer error: {}", message);
                StepOutcome::TransportError
            }
            None => self.process_record(record),
        }
    }

    fn process_record(&mut self, record: &SourceRecord) -> StepOutcome {
        self.stats.inc_records_polled();
        let payload = record.payload.as_deref().unwrap_or_default();

        let event = match parse_event(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    kind = e.kind(),
                    "Skipping invalid message {}: {}",
                    String::from_utf8_lossy(payload),
                    e
                );
                self.window.record_skipped();
                self.stats.inc_records_skipped();
                return StepOutcome::Skipped;
            }
        };

        self.window.record_valid(&event.device_type);

        let event = ensure_schema_consistency(event);
        let processed = ProcessedEvent::transform(event, self.next_processed_at());

        let key = processed.key();
        let published = processed
            .to_bytes()
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                self.sink
                    .publish(&self.settings.output_topic, key.as_deref(), bytes)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = published {
            error!(
                topic = %self.settings.output_topic,
                offset = record.offset,
                "Failed to publish record, offset not committed: {}",
                e
            );
            self.stats.inc_publish_errors();
            return StepOutcome::PublishFailed;
        }
        self.stats.inc_records_published();

        // Committed before the broker acknowledges the publish.
        let committed = match self.source.commit(record) {
            Ok(()) => {
                self.stats.inc_records_committed();
                true
            }
            Err(e) => {
                warn!(severity = %e.severity(), "Failed to commit offset: {}", e);
                self.stats.inc_commit_errors();
                false
            }
        };

        StepOutcome::Published { committed }
    }

    /// `processed_at` never goes backwards within a run, even if the clock does.
    fn next_processed_at(&mut self) -> i64 {
        let now = self.clock.now().timestamp();
        let processed_at = self.last_processed_at.map_or(now, |last| last.max(now));
        self.last_processed_at = Some(processed_at);
        processed_at
    }

    fn check_window(&mut self) {
        if let Some(snapshot) = self.window.check_and_flush(self.clock.now()) {
            self.snapshot_sink.emit(&snapshot);
            self.stats.inc_windows_flushed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::kafka::{InMemorySink, InMemorySource};
    use crate::window::MemorySnapshotSink;
    use std::time::Duration;

    fn transformer(
        source: &InMemorySource,
        sink: &InMemorySink,
        clock: &ManualClock,
    ) -> StreamTransformer<InMemorySource, InMemorySink, ManualClock> {
        let settings = TransformerSettings {
            input_topics: vec!["in".to_string()],
            output_topic: "out".to_string(),
            poll_timeout: Duration::from_millis(1),
            aggregation_interval: Duration::from_secs(60),
        };
        StreamTransformer::new(settings, source.clone(), sink.clone(), clock.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_processed_at_does_not_go_backwards() {
        let source = InMemorySource::new();
        let sink = InMemorySink::new();
        let clock = ManualClock::from_secs(1_000);
        let mut transformer = transformer(&source, &sink, &clock);

        source.push_payload("in", br#"{"user_id":"a","device_id":"d","timestamp":"t"}"#.to_vec());
        transformer.step().await;

        clock.set_secs(990);
        source.push_payload("in", br#"{"user_id":"b","device_id":"d","timestamp":"t"}"#.to_vec());
        transformer.step().await;

        let stamps: Vec<i64> = sink
            .published()
            .iter()
            .map(|r| r.json().unwrap()["processed_at"].as_i64().unwrap())
            .collect();
        assert_eq!(stamps, vec![1_000, 1_000]);
    }

    #[tokio::test]
    async fn test_publish_failure_skips_commit() {
        let source = InMemorySource::new();
        let sink = InMemorySink::new();
        let clock = ManualClock::from_secs(0);
        let mut transformer = transformer(&source, &sink, &clock);

        sink.set_failure(Some("queue full"));
        source.push_payload("in", br#"{"user_id":"a","device_id":"d","timestamp":"t"}"#.to_vec());

        assert_eq!(transformer.step().await, StepOutcome::PublishFailed);
        assert!(source.commits().is_empty());
        assert_eq!(transformer.stats().publish_errors, 1);
        assert_eq!(transformer.window().valid_count(), 1);
    }

    #[tokio::test]
    async fn test_commit_failure_is_counted() {
        let source = InMemorySource::new();
        let sink = InMemorySink::new();
        let clock = ManualClock::from_secs(0);
        let mut transformer = transformer(&source, &sink, &clock);

        source.fail_commits("coordinator moved");
        source.push_payload("in", br#"{"user_id":"a","device_id":"d","timestamp":"t"}"#.to_vec());

        assert_eq!(
            transformer.step().await,
            StepOutcome::Published { committed: false }
        );
        assert_eq!(transformer.stats().commit_errors, 1);
        assert_eq!(sink.published().len(), 1);
    }

    #[tokio::test]
    async fn test_idle_poll_still_checks_window() {
        let source = InMemorySource::new();
        let sink = InMemorySink::new();
        let clock = ManualClock::from_secs(0);
        let snapshots = MemorySnapshotSink::new();
        let mut transformer =
            transformer(&source, &sink, &clock).with_snapshot_sink(Box::new(snapshots.clone()));

        clock.set_secs(61);
        assert_eq!(transformer.step().await, StepOutcome::Idle);

        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots.snapshots()[0].total(), 0);
        assert_eq!(transformer.stats().idle_polls, 1);
        assert_eq!(transformer.window().window_start().timestamp(), 61);
    }

    #[tokio::test]
    async fn test_error_records_are_not_committed() {
        let source = InMemorySource::new();
        let sink = InMemorySink::new();
        let clock = ManualClock::from_secs(0);
        let mut transformer = transformer(&source, &sink, &clock);

        source.push_record(SourceRecord::end_of_partition("in", 0, 5));
        source.push_record(SourceRecord::transport_error("broker transport failure"));

        assert_eq!(transformer.step().await, StepOutcome::EndOfPartition);
        assert_eq!(transformer.step().await, StepOutcome::TransportError);
        assert!(source.commits().is_empty());
        assert_eq!(transformer.stats().end_of_partition_events, 1);
        assert_eq!(transformer.stats().transport_errors, 1);
        assert_eq!(transformer.window().skipped_count(), 0);
    }
}
