//! Offer-change queue abstraction.
//!
//! The consumer only sees this trait; production deployments back it with a
//! managed queue, tests and the reference binary with `MemoryQueue`.
//! `MemoryQueue` reproduces the semantics the consumer relies on: long-poll
//! receive, visibility timeout with redelivery, and a receive count that
//! grows on every delivery.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("transient queue failure: {0}")]
    Transient(String),
}

/// One delivery of a message. The receipt identifies this delivery; deleting
/// with a stale receipt is a no-op.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub id: String,
    pub receipt: String,
    pub body: String,
    /// How many times this message has been delivered, this one included.
    pub receive_count: u32,
}

#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Long-poll for up to `max` messages, waiting at most `wait`.
    async fn receive(&self, max: usize, wait: Duration)
        -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge a delivery; the message will not be redelivered.
    async fn delete(&self, receipt: &str) -> Result<(), QueueError>;

    /// Enqueue a message body. Also used as the DLQ send.
    async fn send(&self, body: String) -> Result<(), QueueError>;
}

struct Stored {
    id: String,
    body: String,
    receive_count: u32,
}

struct InFlight {
    message: Stored,
    visible_again: Instant,
}

#[derive(Default)]
struct QueueInner {
    ready: VecDeque<Stored>,
    in_flight: HashMap<String, InFlight>,
}

pub struct MemoryQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl MemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
            visibility_timeout,
        })
    }

    /// Move expired in-flight deliveries back to the ready queue.
    fn requeue_expired(inner: &mut QueueInner) {
        let now = Instant::now();
        let expired: Vec<String> = inner
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_again <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        for receipt in expired {
            if let Some(flight) = inner.in_flight.remove(&receipt) {
                inner.ready.push_back(flight.message);
            }
        }
    }

    fn take_ready(&self, max: usize) -> Vec<QueueMessage> {
        let mut inner = self.inner.lock();
        Self::requeue_expired(&mut inner);

        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(mut stored) = inner.ready.pop_front() else {
                break;
            };
            stored.receive_count += 1;
            let receipt = Uuid::new_v4().to_string();
            batch.push(QueueMessage {
                id: stored.id.clone(),
                receipt: receipt.clone(),
                body: stored.body.clone(),
                receive_count: stored.receive_count,
            });
            inner.in_flight.insert(
                receipt,
                InFlight {
                    message: stored,
                    visible_again: Instant::now() + self.visibility_timeout,
                },
            );
        }
        batch
    }

    pub fn depth(&self) -> usize {
        let inner = self.inner.lock();
        inner.ready.len() + inner.in_flight.len()
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    async fn receive(
        &self,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            let batch = self.take_ready(max);
            if !batch.is_empty() {
                return Ok(batch);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            // Wake on a new send, or poll again shortly in case an in-flight
            // delivery expires while we wait.
            let remaining = (deadline - now).min(Duration::from_millis(100));
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }

    async fn delete(&self, receipt: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(receipt);
        Ok(())
    }

    async fn send(&self, body: String) -> Result<(), QueueError> {
        {
            let mut inner = self.inner.lock();
            inner.ready.push_back(Stored {
                id: Uuid::new_v4().to_string(),
                body,
                receive_count: 0,
            });
        }
        self.notify.notify_waiters();
        Ok(())
    }
}
