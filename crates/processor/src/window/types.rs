//! Window snapshot type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable result of a flushed aggregation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    /// Epoch seconds at which the window was flushed
    pub timestamp: i64,

    /// Epoch seconds at which the window opened
    pub window_start: i64,

    /// Valid events per lower-cased category
    #[serde(rename = "aggregated_counts")]
    pub counts: BTreeMap<String, u64>,

    /// Events published during the window
    #[serde(rename = "valid_records")]
    pub valid_count: u64,

    /// Events skipped during the window
    #[serde(rename = "skipped_records")]
    pub skipped_count: u64,
}

impl WindowSnapshot {
    /// Total events seen in the window
    pub fn total(&self) -> u64 {
        self.valid_count + self.skipped_count
    }

    /// Flush time as a UTC timestamp
    pub fn flushed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}
