//! Destinations for flushed window snapshots

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

use super::types::WindowSnapshot;

/// Receives every snapshot produced by a window flush.
pub trait SnapshotSink: Send {
    fn emit(&mut self, snapshot: &WindowSnapshot);
}

/// Logs snapshots as a JSON document at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSnapshotSink;

impl SnapshotSink for LogSnapshotSink {
    fn emit(&mut self, snapshot: &WindowSnapshot) {
        match serde_json::to_string_pretty(snapshot) {
            Ok(json) => info!(
                valid_records = snapshot.valid_count,
                skipped_records = snapshot.skipped_count,
                "Aggregated Data: {}",
                json
            ),
            Err(e) => error!("Failed to serialize window snapshot: {}", e),
        }
    }
}

/// Keeps snapshots in memory; clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySnapshotSink {
    snapshots: Arc<Mutex<Vec<WindowSnapshot>>>,
}

impl MemorySnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All snapshots emitted so far, oldest first
    pub fn snapshots(&self) -> Vec<WindowSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotSink for MemorySnapshotSink {
    fn emit(&mut self, snapshot: &WindowSnapshot) {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.clone());
    }
}
