//! Integration tests against a real Kafka cluster
//!
//! These tests require a running Kafka instance.
//! To run these tests:
//!
//! 1. Start Kafka:
//!    ```bash
//!    docker run -d --name kafka -p 9092:9092 apache/kafka:latest
//!    ```
//!
//! 2. Run tests:
//!    ```bash
//!    KAFKA_BROKERS=localhost:9092 cargo test --test kafka_integration -- --ignored --nocapture
//!    ```

use processor::clock::SystemClock;
use processor::kafka::{
    ensure_topic, KafkaRecordSink, KafkaRecordSource, KafkaSinkConfig, KafkaSourceConfig,
    KafkaTopicProvisioner, ProvisionOutcome, RecordSink, RecordSource, TopicSpec,
};
use processor::pipeline::StreamTransformerBuilder;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn brokers() -> String {
    std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string())
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

fn source_config(group_id: &str, topic: &str) -> KafkaSourceConfig {
    KafkaSourceConfig {
        brokers: brokers(),
        group_id: group_id.to_string(),
        topics: vec![topic.to_string()],
        ..Default::default()
    }
}

#[tokio::test]
#[ignore] // Requires Kafka running
async fn test_provisioning_is_idempotent() {
    let provisioner = KafkaTopicProvisioner::new(&brokers(), Duration::from_secs(10)).unwrap();
    let spec = TopicSpec::new(unique("provision"));

    assert_eq!(
        ensure_topic(&provisioner, &spec).await,
        Some(ProvisionOutcome::Created)
    );
    assert_eq!(
        ensure_topic(&provisioner, &spec).await,
        Some(ProvisionOutcome::AlreadyExists)
    );
}

#[tokio::test]
#[ignore] // Requires Kafka running
async fn test_source_poll_times_out_on_empty_topic() {
    let topic = unique("empty");
    let provisioner = KafkaTopicProvisioner::new(&brokers(), Duration::from_secs(10)).unwrap();
    ensure_topic(&provisioner, &TopicSpec::new(&topic)).await;

    let config = KafkaSourceConfig {
        enable_partition_eof: false,
        ..source_config(&unique("group"), &topic)
    };
    let mut source = KafkaRecordSource::new(config).unwrap();
    source.subscribe(&[topic]).unwrap();

    assert!(source.poll(Duration::from_millis(200)).await.is_none());
    source.close().unwrap();
}

#[tokio::test]
#[ignore] // Requires Kafka running
async fn test_transformer_round_trip() {
    let input = unique("user-login");
    let output = unique("processed-user-events");
    let provisioner = KafkaTopicProvisioner::new(&brokers(), Duration::from_secs(10)).unwrap();
    ensure_topic(&provisioner, &TopicSpec::new(&input)).await;
    ensure_topic(&provisioner, &TopicSpec::new(&output)).await;

    let producer = KafkaRecordSink::new(KafkaSinkConfig {
        brokers: brokers(),
        ..Default::default()
    })
    .unwrap();
    let event = json!({"user_id":"abc","device_id":"d1","timestamp":"t1","device_type":"Mobile"});
    producer
        .publish(&input, None, event.to_string().into_bytes())
        .unwrap();
    producer.flush(Duration::from_secs(10)).await.unwrap();

    let source = KafkaRecordSource::new(source_config(&unique("transformer"), &input)).unwrap();
    let sink = KafkaRecordSink::new(KafkaSinkConfig {
        brokers: brokers(),
        ..Default::default()
    })
    .unwrap();
    let mut transformer = StreamTransformerBuilder::new()
        .with_input_topic(&input)
        .with_output_topic(&output)
        .build(source, sink, SystemClock)
        .unwrap();

    let shutdown = CancellationToken::new();
    let stopper = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        stopper.cancel();
    });
    let stats = transformer.run(shutdown).await.unwrap();
    transformer.sink().flush(Duration::from_secs(10)).await.unwrap();
    assert_eq!(stats.records_published, 1);

    let mut reader = KafkaRecordSource::new(source_config(&unique("reader"), &output)).unwrap();
    reader.subscribe(&[output]).unwrap();

    let mut received = None;
    for _ in 0..100 {
        if let Some(record) = reader.poll(Duration::from_millis(100)).await {
            if let Some(payload) = record.payload {
                received = Some(serde_json::from_slice::<Value>(&payload).unwrap());
                break;
            }
        }
    }

    let received = received.expect("transformed record on the output topic");
    assert_eq!(received["user_id"], json!("ABC"));
    assert_eq!(received["locale"], json!(""));
    assert!(received["processed_at"].is_i64());
    reader.close().unwrap();
}
