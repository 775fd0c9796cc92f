//! Processing counters backing `GET /stats`.
//!
//! Atomic counters only; snapshots are cheap enough to serve on every poll.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

#[derive(Debug)]
pub struct ProcessingStats {
    total_processed: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    processing_time_total_us: AtomicU64,
    last_reset: RwLock<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
    pub average_processing_time_ms: f64,
    pub last_reset: DateTime<Utc>,
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self {
            total_processed: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            processing_time_total_us: AtomicU64::new(0),
            last_reset: RwLock::new(Utc::now()),
        }
    }
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, elapsed: Duration) {
        self.record(elapsed);
        self.successful.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self, elapsed: Duration) {
        self.record(elapsed);
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, elapsed: Duration) {
        self.record(elapsed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record(&self, elapsed: Duration) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        self.processing_time_total_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total_processed.load(Ordering::Relaxed);
        let total_us = self.processing_time_total_us.load(Ordering::Relaxed);
        let average_processing_time_ms = if total > 0 {
            (total_us as f64 / total as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            total_processed: total,
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            average_processing_time_ms,
            last_reset: *self.last_reset.read(),
        }
    }

    pub fn reset(&self) {
        self.total_processed.store(0, Ordering::Relaxed);
        self.successful.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.processing_time_total_us.store(0, Ordering::Relaxed);
        *self.last_reset.write() = Utc::now();
    }
}
