//! Queue consumer: long-poll batches of offer-change messages, route each to
//! a worker shard keyed by (product, seller), and decide the message's fate
//! from the pipeline outcome.
//!
//! Sharding gives the per-key ordering guarantee: two events for the same
//! listing always land on the same worker and run in order, so a stale event
//! can never overwrite a fresh one. Normalization is pure CPU and happens on
//! the dispatcher before routing, which also lets malformed payloads go to
//! the DLQ without occupying a shard.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::engine::RepricingEngine;
use crate::error::RepriceError;
use crate::ingest::normalizer::parse_amazon_message;
use crate::ingest::queue::{QueueClient, QueueMessage};
use crate::models::OfferChange;

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub worker_count: usize,
    pub max_messages: usize,
    pub poll_wait: Duration,
    pub visibility_timeout: Duration,
    pub max_retries: u32,
    pub event_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            worker_count: 50,
            max_messages: 10,
            poll_wait: Duration::from_secs(20),
            visibility_timeout: Duration::from_secs(30),
            max_retries: 3,
            event_timeout: Duration::from_secs(5),
        }
    }
}

pub struct QueueConsumer {
    queue: Arc<dyn QueueClient>,
    dlq: Option<Arc<dyn QueueClient>>,
    engine: Arc<RepricingEngine>,
    config: ConsumerConfig,
}

struct WorkItem {
    message: QueueMessage,
    change: OfferChange,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn QueueClient>,
        dlq: Option<Arc<dyn QueueClient>>,
        engine: Arc<RepricingEngine>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            queue,
            dlq,
            engine,
            config,
        }
    }

    /// Run until the shutdown signal flips. In-flight events finish; no new
    /// message is taken after the signal.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let worker_count = self.config.worker_count.max(1);
        info!(workers = worker_count, "queue consumer starting");

        // Bounded per-shard channels: dispatcher backpressure caps the
        // in-process buffer at 2 × worker_count.
        let mut senders = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);
        for shard in 0..worker_count {
            let (tx, rx) = mpsc::channel::<WorkItem>(2);
            senders.push(tx);
            handles.push(tokio::spawn(Self::worker(
                shard,
                rx,
                self.queue.clone(),
                self.dlq.clone(),
                self.engine.clone(),
                self.config.clone(),
            )));
        }

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                received = self.queue.receive(self.config.max_messages, self.config.poll_wait) => {
                    match received {
                        Ok(batch) => batch,
                        Err(err) => {
                            warn!(error = %err, "queue receive failed, backing off");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            continue;
                        }
                    }
                }
                _ = shutdown.changed() => break,
            };

            for message in batch {
                match parse_amazon_message(&message.body) {
                    Ok(change) => {
                        let shard = shard_for(&change, worker_count);
                        if senders[shard]
                            .send(WorkItem { message, change })
                            .await
                            .is_err()
                        {
                            error!(shard, "worker channel closed, dropping message");
                        }
                    }
                    Err(err) => {
                        // Malformed payloads never retry.
                        warn!(
                            message_id = %message.id,
                            error = %err,
                            "malformed queue message, sending to DLQ"
                        );
                        self.send_to_dlq(&message).await;
                        let _ = self.queue.delete(&message.receipt).await;
                    }
                }
            }
        }

        // Drain: close the channels and give workers a bounded window to
        // finish what they already took.
        drop(senders);
        let drain_bound = self.config.visibility_timeout * 2;
        for handle in handles {
            if tokio::time::timeout(drain_bound, handle).await.is_err() {
                warn!("worker did not drain within bound, abandoning");
            }
        }
        info!("queue consumer stopped");
    }

    async fn worker(
        shard: usize,
        mut rx: mpsc::Receiver<WorkItem>,
        queue: Arc<dyn QueueClient>,
        dlq: Option<Arc<dyn QueueClient>>,
        engine: Arc<RepricingEngine>,
        config: ConsumerConfig,
    ) {
        while let Some(item) = rx.recv().await {
            let WorkItem { message, change } = item;

            let outcome = tokio::time::timeout(config.event_timeout, engine.process(&change))
                .await
                .unwrap_or_else(|_| {
                    Err(RepriceError::Transient(format!(
                        "event exceeded {:?} budget",
                        config.event_timeout
                    )))
                });

            match outcome {
                // Success and intentional skips ack the message.
                Ok(_) => {
                    let _ = queue.delete(&message.receipt).await;
                }
                Err(err) if err.is_transient() => {
                    if message.receive_count > config.max_retries {
                        warn!(
                            shard,
                            message_id = %message.id,
                            receive_count = message.receive_count,
                            error = %err,
                            "retries exhausted, sending to DLQ"
                        );
                        Self::dlq_send(&dlq, &message).await;
                        let _ = queue.delete(&message.receipt).await;
                    } else {
                        // Let visibility expire so the queue redelivers.
                        debug!(
                            shard,
                            message_id = %message.id,
                            receive_count = message.receive_count,
                            error = %err,
                            "transient failure, leaving for redelivery"
                        );
                    }
                }
                Err(err) => {
                    error!(
                        shard,
                        message_id = %message.id,
                        error = %err,
                        "terminal failure, sending to DLQ"
                    );
                    Self::dlq_send(&dlq, &message).await;
                    let _ = queue.delete(&message.receipt).await;
                }
            }
        }
        debug!(shard, "worker drained");
    }

    async fn send_to_dlq(&self, message: &QueueMessage) {
        Self::dlq_send(&self.dlq, message).await;
    }

    async fn dlq_send(dlq: &Option<Arc<dyn QueueClient>>, message: &QueueMessage) {
        if let Some(dlq) = dlq {
            if let Err(err) = dlq.send(message.body.clone()).await {
                error!(message_id = %message.id, error = %err, "DLQ send failed");
            }
        }
    }
}

fn shard_for(change: &OfferChange, worker_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    change.product_id.hash(&mut hasher);
    change.seller_id.hash(&mut hasher);
    (hasher.finish() as usize) % worker_count
}
