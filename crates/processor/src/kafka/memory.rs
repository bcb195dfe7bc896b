//! In-process channel implementations
//!
//! Used by tests and local runs that have no broker. Each type is `Clone`;
//! clones share state, so a test can hand one copy to the transformer and
//! inspect the other.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::admin::{ProvisionOutcome, TopicProvisioner, TopicSpec};
use super::error::{KafkaError, Result};
use super::sink::RecordSink;
use super::source::{RecordSource, SourceRecord};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An offset commit issued against an [`InMemorySource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedOffset {
    pub topic: String,
    pub partition: i32,
    /// Next offset to read, i.e. the committed record's offset plus one
    pub offset: i64,
}

#[derive(Debug, Default)]
struct SourceState {
    pending: VecDeque<SourceRecord>,
    next_offsets: HashMap<(String, i32), i64>,
    subscriptions: Vec<String>,
    commits: Vec<CommittedOffset>,
    commit_error: Option<String>,
    closed: bool,
}

/// Queue-backed input channel
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    state: Arc<Mutex<SourceState>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a data record on partition 0 of `topic` at the next offset
    pub fn push_payload(&self, topic: &str, payload: impl Into<Vec<u8>>) -> i64 {
        let mut state = lock(&self.state);
        let next = state
            .next_offsets
            .entry((topic.to_string(), 0))
            .or_insert(0);
        let offset = *next;
        *next += 1;
        state
            .pending
            .push_back(SourceRecord::new(topic, 0, offset, payload));
        offset
    }

    /// Queue an arbitrary record, including error records
    pub fn push_record(&self, record: SourceRecord) {
        lock(&self.state).pending.push_back(record);
    }

    /// Make subsequent commits fail with `message`
    pub fn fail_commits(&self, message: impl Into<String>) {
        lock(&self.state).commit_error = Some(message.into());
    }

    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.state).subscriptions.clone()
    }

    pub fn commits(&self) -> Vec<CommittedOffset> {
        lock(&self.state).commits.clone()
    }

    /// Records not yet polled
    pub fn remaining(&self) -> usize {
        lock(&self.state).pending.len()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    fn subscribe(&mut self, topics: &[String]) -> Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(KafkaError::Closed { handle: "consumer" });
        }
        state.subscriptions = topics.to_vec();
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Option<SourceRecord> {
        let next = {
            let mut state = lock(&self.state);
            if state.closed {
                return None;
            }
            state.pending.pop_front()
        };

        if next.is_none() {
            tokio::time::sleep(timeout).await;
        }
        next
    }

    fn commit(&mut self, record: &SourceRecord) -> Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(KafkaError::Closed { handle: "consumer" });
        }
        if let Some(message) = state.commit_error.clone() {
            return Err(KafkaError::offset_commit(
                message,
                record.topic.clone(),
                record.partition,
                record.offset,
            ));
        }
        state.commits.push(CommittedOffset {
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset + 1,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        lock(&self.state).closed = true;
        Ok(())
    }
}

/// A record handed to an [`InMemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl PublishedRecord {
    /// Payload parsed as JSON
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
    }
}

#[derive(Debug, Default)]
struct SinkState {
    published: Vec<PublishedRecord>,
    acknowledged: usize,
    publish_error: Option<String>,
    flushes: usize,
}

/// Vec-backed output channel.
///
/// Published records stay unacknowledged until [`InMemorySink::acknowledge_all`]
/// or a flush, mirroring a producer whose delivery reports arrive later.
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    state: Arc<Mutex<SinkState>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail with `message`; `None` clears it
    pub fn set_failure(&self, message: Option<&str>) {
        lock(&self.state).publish_error = message.map(str::to_string);
    }

    /// Every record accepted so far, in publish order
    pub fn published(&self) -> Vec<PublishedRecord> {
        lock(&self.state).published.clone()
    }

    /// Accepted records without a delivery acknowledgment
    pub fn unacknowledged(&self) -> Vec<PublishedRecord> {
        let state = lock(&self.state);
        state.published[state.acknowledged..].to_vec()
    }

    pub fn acknowledge_all(&self) {
        let mut state = lock(&self.state);
        state.acknowledged = state.published.len();
    }

    pub fn flush_count(&self) -> usize {
        lock(&self.state).flushes
    }
}

#[async_trait]
impl RecordSink for InMemorySink {
    fn publish(&self, topic: &str, key: Option<&str>, payload: Vec<u8>) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(message) = state.publish_error.clone() {
            return Err(KafkaError::production(message, topic));
        }
        state.published.push(PublishedRecord {
            topic: topic.to_string(),
            key: key.map(str::to_string),
            payload,
        });
        Ok(())
    }

    async fn flush(&self, _timeout: Duration) -> Result<()> {
        let mut state = lock(&self.state);
        state.acknowledged = state.published.len();
        state.flushes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ProvisionerState {
    topics: BTreeSet<String>,
    created: Vec<TopicSpec>,
    error: Option<String>,
}

/// Set-backed topic provisioner
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvisioner {
    state: Arc<Mutex<ProvisionerState>>,
}

impl InMemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provisioner whose cluster already has `topics`
    pub fn with_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provisioner = Self::default();
        lock(&provisioner.state)
            .topics
            .extend(topics.into_iter().map(Into::into));
        provisioner
    }

    /// Make every call fail with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        lock(&self.state).error = Some(message.into());
    }

    /// Topics created through this provisioner
    pub fn created(&self) -> Vec<TopicSpec> {
        lock(&self.state).created.clone()
    }

    fn check(&self, topic: &str) -> Result<()> {
        match &lock(&self.state).error {
            Some(message) => Err(KafkaError::topic_metadata(message.clone(), topic)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TopicProvisioner for InMemoryProvisioner {
    async fn topic_exists(&self, name: &str) -> Result<bool> {
        self.check(name)?;
        Ok(lock(&self.state).topics.contains(name))
    }

    async fn create_topic(&self, spec: &TopicSpec) -> Result<ProvisionOutcome> {
        self.check(&spec.name)?;
        let mut state = lock(&self.state);
        if !state.topics.insert(spec.name.clone()) {
            return Ok(ProvisionOutcome::AlreadyExists);
        }
        state.created.push(spec.clone());
        Ok(ProvisionOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::RecordError;

    #[tokio::test]
    async fn test_source_yields_in_order_then_idles() {
        let mut source = InMemorySource::new();
        assert_eq!(source.push_payload("in", b"a".to_vec()), 0);
        assert_eq!(source.push_payload("in", b"b".to_vec()), 1);
        source.push_record(SourceRecord::end_of_partition("in", 0, 2));

        let timeout = Duration::from_millis(1);
        assert_eq!(source.poll(timeout).await.unwrap().offset, 0);
        assert_eq!(source.poll(timeout).await.unwrap().offset, 1);
        assert_eq!(
            source.poll(timeout).await.unwrap().error,
            Some(RecordError::EndOfPartition)
        );
        assert!(source.poll(timeout).await.is_none());
    }

    #[tokio::test]
    async fn test_source_commit_records_next_offset() {
        let mut source = InMemorySource::new();
        source.push_payload("in", b"a".to_vec());
        let record = source.poll(Duration::from_millis(1)).await.unwrap();

        source.commit(&record).unwrap();
        assert_eq!(
            source.commits(),
            vec![CommittedOffset {
                topic: "in".to_string(),
                partition: 0,
                offset: 1
            }]
        );

        source.fail_commits("coordinator moved");
        assert!(matches!(
            source.commit(&record),
            Err(KafkaError::OffsetCommit { .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_source_stops() {
        let mut source = InMemorySource::new();
        source.push_payload("in", b"a".to_vec());
        source.close().unwrap();

        assert!(source.is_closed());
        assert!(source.poll(Duration::from_millis(1)).await.is_none());
        assert_eq!(source.remaining(), 1);
    }

    #[tokio::test]
    async fn test_sink_acknowledgment_lags_publish() {
        let sink = InMemorySink::new();
        sink.publish("out", Some("d1"), b"{}".to_vec()).unwrap();

        assert_eq!(sink.published().len(), 1);
        assert_eq!(sink.unacknowledged().len(), 1);

        sink.flush(Duration::from_secs(1)).await.unwrap();
        assert!(sink.unacknowledged().is_empty());
        assert_eq!(sink.flush_count(), 1);

        sink.set_failure(Some("queue full"));
        assert!(sink.publish("out", None, b"{}".to_vec()).is_err());
        assert_eq!(sink.published().len(), 1);
    }
}
