//! Tumbling-window aggregation of device categories
//!
//! A single [`AggregationWindow`] counts valid events per category and
//! skipped events for a fixed interval, then hands a [`WindowSnapshot`] to a
//! [`SnapshotSink`] and starts over.
//!
//! ```text
//! Time:     0--------60-------120------180
//! Windows:  [--------][--------][--------]
//!                    ^ flush    ^ flush
//! ```
//!
//! The window is evaluated lazily: nothing fires on a timer. The owner calls
//! [`AggregationWindow::check_and_flush`] once per loop iteration, so a flush
//! happens on the first iteration at or after the boundary.
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use processor::window::AggregationWindow;
//!
//! let start = Utc.timestamp_opt(0, 0).unwrap();
//! let mut window = AggregationWindow::new(std::time::Duration::from_secs(60), start).unwrap();
//!
//! window.record_valid("Mobile");
//! window.record_valid("mobile");
//! window.record_skipped();
//!
//! assert!(window.check_and_flush(start + Duration::seconds(15)).is_none());
//!
//! let snapshot = window.check_and_flush(start + Duration::seconds(60)).unwrap();
//! assert_eq!(snapshot.counts["mobile"], 2);
//! assert_eq!(snapshot.skipped_count, 1);
//! assert_eq!(window.valid_count(), 0);
//! ```

pub mod sink;
pub mod tumbling;
pub mod types;

pub use sink::{LogSnapshotSink, MemorySnapshotSink, SnapshotSink};
pub use tumbling::AggregationWindow;
pub use types::WindowSnapshot;
