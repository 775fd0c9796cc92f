//! Event ingress: payload normalization, the offer-change queue, and the
//! sharded consumer that drives the pipeline.

pub mod consumer;
pub mod normalizer;
pub mod queue;

pub use consumer::{ConsumerConfig, QueueConsumer};
pub use normalizer::{parse_amazon_message, parse_walmart_payload, WalmartWebhook};
pub use queue::{MemoryQueue, QueueClient, QueueError, QueueMessage};
