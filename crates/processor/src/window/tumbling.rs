//! The live aggregation window

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::mem;

use super::types::WindowSnapshot;
use crate::error::{WindowError, WindowResult};

/// Tumbling window of per-category counters.
///
/// Exactly one window is live per orchestration loop; it is owned by the loop
/// and mutated only through `&mut self`, so a flush is atomic with respect to
/// every other operation on it.
#[derive(Debug, Clone)]
pub struct AggregationWindow {
    interval: Duration,
    window_start: DateTime<Utc>,
    counts: HashMap<String, u64>,
    valid_count: u64,
    skipped_count: u64,
}

impl AggregationWindow {
    /// Open a window of `interval` starting at `start`.
    pub fn new(interval: std::time::Duration, start: DateTime<Utc>) -> WindowResult<Self> {
        let invalid = || WindowError::InvalidInterval {
            interval_secs: interval.as_secs(),
        };

        if interval.is_zero() {
            return Err(invalid());
        }
        let interval = Duration::from_std(interval).map_err(|_| invalid())?;

        Ok(Self {
            interval,
            window_start: start,
            counts: HashMap::new(),
            valid_count: 0,
            skipped_count: 0,
        })
    }

    /// Count a valid event. Categories are case-insensitive.
    pub fn record_valid(&mut self, category: &str) {
        *self.counts.entry(category.to_lowercase()).or_insert(0) += 1;
        self.valid_count += 1;
    }

    /// Count a skipped event.
    pub fn record_skipped(&mut self) {
        self.skipped_count += 1;
    }

    /// Whether the window has elapsed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.window_start) >= self.interval
    }

    /// Flush and reset the window if it has elapsed.
    ///
    /// Returns the snapshot of the closed window; the new window starts at
    /// `now` with empty counters.
    pub fn check_and_flush(&mut self, now: DateTime<Utc>) -> Option<WindowSnapshot> {
        if !self.is_due(now) {
            return None;
        }

        let snapshot = WindowSnapshot {
            timestamp: now.timestamp(),
            window_start: self.window_start.timestamp(),
            counts: mem::take(&mut self.counts).into_iter().collect(),
            valid_count: mem::take(&mut self.valid_count),
            skipped_count: mem::take(&mut self.skipped_count),
        };
        self.window_start = now;

        Some(snapshot)
    }

    /// Count for one category (any casing)
    pub fn count(&self, category: &str) -> u64 {
        self.counts
            .get(&category.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn counts(&self) -> &HashMap<String, u64> {
        &self.counts
    }

    pub fn valid_count(&self) -> u64 {
        self.valid_count
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped_count
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
