//! Integration tests for queue topology and delivery accounting.
//! Requires an AMQP broker. Set AMQP_TEST_URL or these tests are skipped.

use futures::StreamExt;
use lapin::options::BasicAckOptions;
use uuid::Uuid;

use newsradar_common::ArticleMessage;
use newsradar_queue::{delivery_attempts, ArticlePublisher, QueueClient};

fn message(url: &str) -> ArticleMessage {
    ArticleMessage {
        source_name: "Reuters".to_string(),
        url: url.to_string(),
        title: "Fed signals rate cut".to_string(),
        content: "Officials hinted at easing next quarter.".to_string(),
        published_at: "2026-03-01T12:00:00Z".to_string(),
        companies: vec![],
        people: vec![],
    }
}

async fn test_client() -> Option<QueueClient> {
    let url = std::env::var("AMQP_TEST_URL").ok()?;
    let queue_name = format!("test.articles.{}", Uuid::new_v4());
    QueueClient::connect(&url, &queue_name).await.ok()
}

#[tokio::test]
async fn publish_consume_roundtrip() {
    let Some(client) = test_client().await else {
        eprintln!("AMQP_TEST_URL not set; skipping");
        return;
    };

    let sent = message("https://example.com/roundtrip");
    client.publish(&sent).await.unwrap();

    let mut consumer = client.consumer("test-consumer", 10).await.unwrap();
    let delivery = consumer.next().await.unwrap().unwrap();

    let received: ArticleMessage = serde_json::from_slice(&delivery.data).unwrap();
    assert_eq!(received.url, sent.url);
    assert_eq!(delivery_attempts(&delivery.properties), 0);

    delivery.ack(BasicAckOptions::default()).await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn republish_carries_attempt_counter() {
    let Some(client) = test_client().await else {
        eprintln!("AMQP_TEST_URL not set; skipping");
        return;
    };

    let sent = message("https://example.com/retry");
    client.publish(&sent).await.unwrap();

    let mut consumer = client.consumer("test-consumer", 10).await.unwrap();
    let first = consumer.next().await.unwrap().unwrap();
    assert_eq!(delivery_attempts(&first.properties), 0);

    // Simulate a processing failure: bump the counter and requeue.
    client
        .republish_with_attempts(&first.data, delivery_attempts(&first.properties) + 1)
        .await
        .unwrap();
    first.ack(BasicAckOptions::default()).await.unwrap();

    let second = consumer.next().await.unwrap().unwrap();
    assert_eq!(delivery_attempts(&second.properties), 1);
    second.ack(BasicAckOptions::default()).await.unwrap();

    client.close().await.unwrap();
}
