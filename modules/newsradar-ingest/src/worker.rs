use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::BasicAckOptions;
use tracing::{error, info, warn};

use newsradar_common::ArticleMessage;
use newsradar_index::SharedIndex;
use newsradar_queue::{delivery_attempts, QueueClient};
use newsradar_store::ArticleRepo;

use crate::embedder::TextEmbedder;
use crate::ingestor::{IngestOutcome, Ingestor};
use crate::reconcile::reconcile;

/// Queue-driven ingestion worker. One message is processed to completion
/// before the next is drawn; horizontal scale comes from running more
/// workers.
pub struct Worker {
    queue: QueueClient,
    ingestor: Arc<Ingestor>,
    articles: Arc<dyn ArticleRepo>,
    embedder: Arc<dyn TextEmbedder>,
    index: SharedIndex,
    prefetch: u16,
    max_attempts: u32,
}

impl Worker {
    pub fn new(
        queue: QueueClient,
        ingestor: Arc<Ingestor>,
        articles: Arc<dyn ArticleRepo>,
        embedder: Arc<dyn TextEmbedder>,
        index: SharedIndex,
        prefetch: u16,
        max_attempts: u32,
    ) -> Self {
        Self {
            queue,
            ingestor,
            articles,
            embedder,
            index,
            prefetch,
            max_attempts,
        }
    }

    /// Reconcile the index against the store, then consume until the
    /// connection drops.
    pub async fn run(&self) -> Result<()> {
        reconcile(self.articles.as_ref(), self.embedder.as_ref(), &self.index).await?;

        let mut consumer = self.queue.consumer("newsradar-worker", self.prefetch).await?;
        info!(prefetch = self.prefetch, "Worker consuming");

        while let Some(delivery) = consumer.next().await {
            match delivery {
                Ok(delivery) => self.handle(delivery).await,
                Err(e) => {
                    error!(error = %e, "Consumer stream error");
                    return Err(e.into());
                }
            }
        }

        info!("Consumer stream closed");
        Ok(())
    }

    async fn handle(&self, delivery: Delivery) {
        let message: ArticleMessage = match serde_json::from_slice(&delivery.data) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "Malformed queue payload; dropping");
                self.ack(&delivery).await;
                return;
            }
        };

        match self.ingestor.ingest(&message).await {
            Ok(IngestOutcome::Inserted {
                article,
                cluster_id,
                new_cluster,
            }) => {
                info!(
                    article = %article.id,
                    cluster = %cluster_id,
                    new_cluster,
                    url = %article.url,
                    "Article ingested"
                );
                self.ack(&delivery).await;
            }
            Ok(IngestOutcome::Duplicate { url }) => {
                info!(url = %url, "Duplicate message acked");
                self.ack(&delivery).await;
            }
            Ok(IngestOutcome::Rejected { reason }) => {
                info!(url = %message.url, reason, "Irrelevant article dropped");
                self.ack(&delivery).await;
            }
            Err(e) => {
                self.retry_or_dead_letter(&delivery, &message, &e.to_string()).await;
            }
        }
    }

    /// Transient failure path: bounded redelivery via republish with an
    /// attempt header, then the dead-letter queue.
    async fn retry_or_dead_letter(&self, delivery: &Delivery, message: &ArticleMessage, cause: &str) {
        let attempts = delivery_attempts(&delivery.properties) + 1;

        if attempts >= self.max_attempts {
            warn!(
                url = %message.url,
                attempts,
                cause,
                "Delivery budget exhausted; dead-lettering"
            );
            if let Err(e) = self.queue.publish_dead(&delivery.data).await {
                error!(url = %message.url, error = %e, "Dead-letter publish failed");
            }
        } else {
            warn!(url = %message.url, attempts, cause, "Ingest failed; redelivering");
            if let Err(e) = self.queue.republish_with_attempts(&delivery.data, attempts).await {
                error!(url = %message.url, error = %e, "Redelivery publish failed");
            }
        }

        self.ack(delivery).await;
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!(error = %e, "Ack failed");
        }
    }
}
