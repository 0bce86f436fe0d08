//! AMQP plumbing for the article work queue.
//!
//! One durable queue carries article messages from the scheduler to the
//! ingestion worker; a sibling dead-letter queue receives messages that
//! exhausted their redelivery budget. Delivery is durable (persistent
//! messages, manual ack). The broker's `redelivered` flag cannot count
//! attempts, so retries are republishes carrying an `x-attempts` header.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tracing::{info, warn};

use newsradar_common::ArticleMessage;

pub const ATTEMPTS_HEADER: &str = "x-attempts";
const PERSISTENT: u8 = 2;
const PUBLISH_ATTEMPTS: u32 = 3;

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Message serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish failed after {0} attempts")]
    PublishExhausted(u32),
}

// ---------------------------------------------------------------------------
// ArticlePublisher — seam for the scheduler
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ArticlePublisher: Send + Sync {
    async fn publish(&self, message: &ArticleMessage) -> Result<()>;
}

// ---------------------------------------------------------------------------
// QueueClient
// ---------------------------------------------------------------------------

/// Connection plus declared topology. Cloning shares the connection and
/// channel; the connection handle is kept so dropping a clone does not
/// tear the link down.
#[derive(Clone)]
pub struct QueueClient {
    connection: Arc<Connection>,
    channel: Channel,
    queue_name: String,
}

impl QueueClient {
    pub fn dead_letter_name(queue_name: &str) -> String {
        format!("{queue_name}.dead")
    }

    /// Connect and declare the work queue and its dead-letter sibling,
    /// both durable.
    pub async fn connect(amqp_url: &str, queue_name: &str) -> Result<Self> {
        info!(queue = queue_name, "Connecting to AMQP broker");
        let connection = Connection::connect(amqp_url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        let durable = QueueDeclareOptions {
            durable: true,
            ..Default::default()
        };
        channel
            .queue_declare(queue_name, durable, FieldTable::default())
            .await?;
        channel
            .queue_declare(
                &Self::dead_letter_name(queue_name),
                durable,
                FieldTable::default(),
            )
            .await?;

        info!(queue = queue_name, "AMQP topology declared");
        Ok(Self {
            connection: Arc::new(connection),
            channel,
            queue_name: queue_name.to_string(),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Graceful shutdown of the broker connection.
    pub async fn close(&self) -> Result<()> {
        self.connection.close(200, "shutting down").await?;
        Ok(())
    }

    /// Consumer with bounded prefetch and manual ack.
    pub async fn consumer(&self, tag: &str, prefetch: u16) -> Result<Consumer> {
        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;
        let consumer = self
            .channel
            .basic_consume(
                &self.queue_name,
                tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }

    async fn publish_raw(
        &self,
        routing_key: &str,
        payload: &[u8],
        properties: BasicProperties,
    ) -> Result<()> {
        self.channel
            .basic_publish(
                "",
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await?
            .await?;
        Ok(())
    }

    /// Requeue a failed message with its attempt counter bumped. The caller
    /// acks the original delivery afterwards.
    pub async fn republish_with_attempts(&self, payload: &[u8], attempts: u32) -> Result<()> {
        let mut headers = FieldTable::default();
        headers.insert(
            ShortString::from(ATTEMPTS_HEADER),
            AMQPValue::LongUInt(attempts),
        );
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_headers(headers);
        self.publish_raw(&self.queue_name, payload, properties)
            .await
    }

    /// Route a message that exhausted its budget to the dead-letter queue.
    pub async fn publish_dead(&self, payload: &[u8]) -> Result<()> {
        let dead = Self::dead_letter_name(&self.queue_name);
        self.publish_raw(&dead, payload, BasicProperties::default().with_delivery_mode(PERSISTENT))
            .await
    }
}

/// Read the attempt counter a republish stamped onto a delivery. Fresh
/// deliveries have none and count as attempt 0.
pub fn delivery_attempts(properties: &BasicProperties) -> u32 {
    properties
        .headers()
        .as_ref()
        .and_then(|h| {
            h.inner()
                .iter()
                .find(|(key, _)| key.as_str() == ATTEMPTS_HEADER)
                .map(|(_, value)| value)
        })
        .and_then(|v| match v {
            AMQPValue::LongUInt(n) => Some(*n),
            AMQPValue::LongInt(n) => u32::try_from(*n).ok(),
            AMQPValue::ShortInt(n) => u32::try_from(*n).ok(),
            _ => None,
        })
        .unwrap_or(0)
}

#[async_trait]
impl ArticlePublisher for QueueClient {
    /// Publish one article as a persistent JSON message, with capped
    /// exponential backoff. Exhausting the budget surfaces an error; the
    /// caller logs and drops the batch.
    async fn publish(&self, message: &ArticleMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;

        let mut backoff = Duration::from_millis(500);
        for attempt in 1..=PUBLISH_ATTEMPTS {
            let properties = BasicProperties::default().with_delivery_mode(PERSISTENT);
            match self.publish_raw(&self.queue_name, &payload, properties).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < PUBLISH_ATTEMPTS => {
                    warn!(
                        url = %message.url,
                        attempt,
                        error = %e,
                        "Queue publish failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                }
                Err(e) => {
                    warn!(url = %message.url, error = %e, "Queue publish exhausted retries");
                    return Err(QueueError::PublishExhausted(PUBLISH_ATTEMPTS));
                }
            }
        }
        Err(QueueError::PublishExhausted(PUBLISH_ATTEMPTS))
    }
}
