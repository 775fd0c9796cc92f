//! Application configuration.
//!
//! Everything is environment-driven with sane defaults so the binary runs
//! out of the box; `.env` files are honored for local development.

use std::time::Duration;

/// Runtime configuration for the repricing service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Offer-change queue URL. Recognized for external deployments; the
    /// reference binary wires the in-process queue when unset.
    pub queue_url: Option<String>,
    /// Dead-letter queue URL.
    pub dlq_url: Option<String>,
    /// Webhook server bind address.
    pub bind_addr: String,
    /// Queue worker count; also the shard count for per-key ordering.
    pub worker_count: usize,
    /// Long-poll batch size.
    pub max_messages: usize,
    /// Long-poll wait.
    pub poll_wait: Duration,
    /// Queue visibility timeout; redelivery happens after this elapses.
    pub visibility_timeout: Duration,
    /// Redeliveries tolerated before a failing message goes to the DLQ.
    pub max_retries: u32,
    /// End-to-end budget for one event.
    pub event_timeout: Duration,
    /// Budget for a single store round-trip.
    pub store_timeout: Duration,
    /// TTL on calculated-price hashes.
    pub calculated_price_ttl: Duration,
    pub service_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_url: None,
            dlq_url: None,
            bind_addr: "0.0.0.0:3000".to_string(),
            worker_count: 50,
            max_messages: 10,
            poll_wait: Duration::from_secs(20),
            visibility_timeout: Duration::from_secs(30),
            max_retries: 3,
            event_timeout: Duration::from_secs(5),
            store_timeout: Duration::from_secs(1),
            calculated_price_ttl: Duration::from_secs(2 * 60 * 60),
            service_name: "repricer".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        cfg.queue_url = std::env::var("QUEUE_URL").ok().filter(|v| !v.trim().is_empty());
        cfg.dlq_url = std::env::var("DLQ_URL").ok().filter(|v| !v.trim().is_empty());

        if let Ok(v) = std::env::var("BIND_ADDR") {
            if !v.trim().is_empty() {
                cfg.bind_addr = v;
            }
        }
        if let Some(v) = parse_env::<usize>("WORKER_COUNT") {
            if v > 0 {
                cfg.worker_count = v;
            }
        }
        if let Some(v) = parse_env::<usize>("MAX_MESSAGES") {
            if v > 0 {
                cfg.max_messages = v;
            }
        }
        if let Some(v) = parse_env::<u64>("POLL_WAIT_SECS") {
            cfg.poll_wait = Duration::from_secs(v);
        }
        if let Some(v) = parse_env::<u64>("VISIBILITY_TIMEOUT_SECS") {
            if v > 0 {
                cfg.visibility_timeout = Duration::from_secs(v);
            }
        }
        if let Some(v) = parse_env::<u32>("MAX_RETRIES") {
            cfg.max_retries = v;
        }
        if let Some(v) = parse_env::<u64>("EVENT_TIMEOUT_MS") {
            if v > 0 {
                cfg.event_timeout = Duration::from_millis(v);
            }
        }
        if let Some(v) = parse_env::<u64>("STORE_TIMEOUT_MS") {
            if v > 0 {
                cfg.store_timeout = Duration::from_millis(v);
            }
        }
        if let Some(v) = parse_env::<u64>("CALCULATED_PRICE_TTL_SECS") {
            if v > 0 {
                cfg.calculated_price_ttl = Duration::from_secs(v);
            }
        }
        if let Ok(v) = std::env::var("SERVICE_NAME") {
            if !v.trim().is_empty() {
                cfg.service_name = v;
            }
        }

        cfg
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
