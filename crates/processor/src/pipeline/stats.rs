//! Loop-lifetime counters

use serde::{Deserialize, Serialize};

/// Statistics for the stream transformer
///
/// Unlike the window counts these are never reset; they cover the whole run.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TransformerStats {
    /// Data records received from the source
    pub records_polled: u64,

    /// Records enqueued on the output channel
    pub records_published: u64,

    /// Offset commits issued successfully
    pub records_committed: u64,

    /// Records dropped by decode or validation
    pub records_skipped: u64,

    /// Polls that returned a transport error
    pub transport_errors: u64,

    /// Polls that reported end of partition
    pub end_of_partition_events: u64,

    /// Records that could not be enqueued
    pub publish_errors: u64,

    /// Commits that failed to be issued
    pub commit_errors: u64,

    /// Aggregation windows flushed
    pub windows_flushed: u64,

    /// Polls that timed out with nothing to read
    pub idle_polls: u64,
}

impl TransformerStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_records_polled(&mut self) {
        self.records_polled += 1;
    }

    pub fn inc_records_published(&mut self) {
        self.records_published += 1;
    }

    pub fn inc_records_committed(&mut self) {
        self.records_committed += 1;
    }

    pub fn inc_records_skipped(&mut self) {
        self.records_skipped += 1;
    }

    pub fn inc_transport_errors(&mut self) {
        self.transport_errors += 1;
    }

    pub fn inc_end_of_partition_events(&mut self) {
        self.end_of_partition_events += 1;
    }

    pub fn inc_publish_errors(&mut self) {
        self.publish_errors += 1;
    }

    pub fn inc_commit_errors(&mut self) {
        self.commit_errors += 1;
    }

    pub fn inc_windows_flushed(&mut self) {
        self.windows_flushed += 1;
    }

    pub fn inc_idle_polls(&mut self) {
        self.idle_polls += 1;
    }

    /// Fraction of data records that were published, 0.0 before any arrive
    pub fn publish_ratio(&self) -> f64 {
        if self.records_polled > 0 {
            self.records_published as f64 / self.records_polled as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = TransformerStats::new();
        assert_eq!(stats, TransformerStats::default());
        assert_eq!(stats.publish_ratio(), 0.0);
    }

    #[test]
    fn test_publish_ratio() {
        let mut stats = TransformerStats::new();
        for _ in 0..4 {
            stats.inc_records_polled();
        }
        stats.inc_records_published();
        stats.inc_records_published();
        stats.inc_records_published();
        stats.inc_records_skipped();

        assert_eq!(stats.publish_ratio(), 0.75);
    }
}
