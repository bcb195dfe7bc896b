//! Local Stream Transformer Example
//!
//! Runs the transformer against in-memory channels with a manual clock, so
//! no broker is needed. A handful of login events (one of them invalid) are
//! pushed through the loop, the clock is moved past the aggregation
//! interval and the flushed window is printed.
//!
//! ```bash
//! cargo run -p processor --example local_pipeline
//! ```

use processor::clock::ManualClock;
use processor::kafka::{InMemorySink, InMemorySource};
use processor::pipeline::StreamTransformerBuilder;
use processor::window::MemorySnapshotSink;
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .init();

    let source = InMemorySource::new();
    let sink = InMemorySink::new();
    let clock = ManualClock::from_secs(1_700_000_000);
    let snapshots = MemorySnapshotSink::new();

    let events = [
        json!({"user_id": "alice", "device_id": "d1", "timestamp": "1700000000", "device_type": "Mobile"}),
        json!({"user_id": "bob", "device_id": "d2", "timestamp": "1700000003", "device_type": "mobile", "locale": "en_US"}),
        json!({"user_id": "carol", "device_id": "d3", "timestamp": "1700000007"}),
        json!({"invalid_field": "x"}),
    ];
    for event in &events {
        source.push_payload("user-login", event.to_string().into_bytes());
    }

    let mut transformer = StreamTransformerBuilder::new()
        .with_input_topic("user-login")
        .with_output_topic("processed-user-events")
        .with_poll_timeout(Duration::from_millis(10))
        .with_aggregation_interval(Duration::from_secs(60))
        .with_snapshot_sink(snapshots.clone())
        .build(source.clone(), sink.clone(), clock.clone())?;
    transformer.start()?;

    for _ in 0..events.len() {
        let outcome = transformer.step().await;
        println!("step: {:?}", outcome);
    }

    // An idle poll after the interval still closes the window
    clock.advance_secs(60);
    transformer.step().await;

    println!("\nPublished records:");
    for record in sink.published() {
        println!("  [{}] {}", record.key.as_deref().unwrap_or_default(), record.json()?);
    }

    println!("\nWindow snapshots:");
    for snapshot in snapshots.snapshots() {
        println!("  {}", serde_json::to_string(&snapshot)?);
    }

    println!("\nCommitted offsets: {:?}", source.commits());
    println!("Stats: {:?}", transformer.stats());

    transformer.shutdown()?;
    Ok(())
}
