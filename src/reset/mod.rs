//! Reset scheduler: an hourly sweep that, inside each seller's configured
//! window, forces every listing back to its default price and pauses
//! repricing until the resume window.
//!
//! The sweep runs in a single dedicated task so two sweeps for the same
//! seller can never race. Per-product failures are counted, not fatal.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Timelike, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::engine::Persister;
use crate::models::{Marketplace, Product, ResetRuleSet};
use crate::store::Store;

/// Strategy name recorded on reset-driven price writes.
pub const RESET_STRATEGY_NAME: &str = "PriceReset";

/// True while the seller's marketplace-local wall clock is between
/// reset_time and resume_time (window may wrap midnight).
pub fn in_reset_window(rules: &ResetRuleSet, now: DateTime<Utc>) -> bool {
    let local = local_time(rules.marketplace, now);
    let span = wrapped_minutes(rules.reset_time, rules.resume_time);
    let position = wrapped_minutes(rules.reset_time, local);
    position < span
}

/// True while `now` is within the hour starting at `mark`.
fn in_hour_window(mark: NaiveTime, local: NaiveTime) -> bool {
    wrapped_minutes(mark, local) < 60
}

fn wrapped_minutes(from: NaiveTime, to: NaiveTime) -> i64 {
    let from = from.num_seconds_from_midnight() as i64;
    let to = to.num_seconds_from_midnight() as i64;
    (to - from).rem_euclid(24 * 3600) / 60
}

fn local_time(marketplace: Marketplace, now: DateTime<Utc>) -> NaiveTime {
    match marketplace.utc_offset() {
        Some(offset) => now.with_timezone(&offset).time(),
        None => {
            warn!(
                marketplace = marketplace.as_str(),
                "no timezone mapping, evaluating reset window in UTC"
            );
            now.time()
        }
    }
}

/// Aggregated result of one sweep.
#[derive(Debug, Default, Clone)]
pub struct SweepReport {
    pub resets: usize,
    pub pauses: usize,
    pub resumes: usize,
    pub errors: usize,
}

pub struct ResetScheduler {
    store: Arc<dyn Store>,
    persister: Arc<Persister>,
}

impl ResetScheduler {
    pub fn new(store: Arc<dyn Store>, persister: Arc<Persister>) -> Self {
        Self { store, persister }
    }

    /// Tick at minute 0 of every hour until shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("reset scheduler starting (hourly cadence)");
        loop {
            let sleep_for = until_next_hour(Utc::now());
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_sweep(Utc::now()).await;
            info!(
                resets = report.resets,
                pauses = report.pauses,
                resumes = report.resumes,
                errors = report.errors,
                "reset sweep finished"
            );
        }
        info!("reset scheduler stopped");
    }

    /// One pass over every enabled rule set.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        let rule_sets = match self.store.list_reset_rules().await {
            Ok(rules) => rules,
            Err(err) => {
                warn!(error = %err, "could not list reset rules, skipping sweep");
                report.errors += 1;
                return report;
            }
        };

        for rules in rule_sets.iter().filter(|r| r.enabled) {
            let local = local_time(rules.marketplace, now);
            if in_hour_window(rules.reset_time, local) {
                self.reset_seller(rules, &mut report).await;
            } else if in_hour_window(rules.resume_time, local) {
                self.resume_seller(rules, &mut report).await;
            }
        }

        report
    }

    async fn reset_seller(&self, rules: &ResetRuleSet, report: &mut SweepReport) {
        let products = match self.store.products_for_seller(&rules.seller_id).await {
            Ok(products) => products,
            Err(err) => {
                warn!(seller_id = %rules.seller_id, error = %err, "seller listing walk failed");
                report.errors += 1;
                return;
            }
        };

        for product in products {
            if let Some(condition) = rules.product_condition {
                if product.item_condition != condition {
                    continue;
                }
            }
            match self.reset_product(&product).await {
                Ok(true) => report.resets += 1,
                Ok(false) => {}
                Err(()) => report.errors += 1,
            }
            match self
                .store
                .set_paused(&product.seller_id, &product.asin, true)
                .await
            {
                Ok(()) => report.pauses += 1,
                Err(err) => {
                    warn!(
                        seller_id = %product.seller_id,
                        asin = %product.asin,
                        error = %err,
                        "pause flag write failed"
                    );
                    report.errors += 1;
                }
            }
        }
    }

    async fn resume_seller(&self, rules: &ResetRuleSet, report: &mut SweepReport) {
        let products = match self.store.products_for_seller(&rules.seller_id).await {
            Ok(products) => products,
            Err(err) => {
                warn!(seller_id = %rules.seller_id, error = %err, "seller listing walk failed");
                report.errors += 1;
                return;
            }
        };

        for product in products {
            match self
                .store
                .set_paused(&product.seller_id, &product.asin, false)
                .await
            {
                Ok(()) => report.resumes += 1,
                Err(err) => {
                    warn!(
                        seller_id = %product.seller_id,
                        asin = %product.asin,
                        error = %err,
                        "pause flag clear failed"
                    );
                    report.errors += 1;
                }
            }
        }
    }

    /// Write the default price. Reset always writes, even when the default
    /// equals the listed price. Products without a default are left alone.
    async fn reset_product(&self, product: &Product) -> Result<bool, ()> {
        let Some(default_price) = product.default_price.filter(|p| *p > 0.0) else {
            return Ok(false);
        };

        match self
            .persister
            .persist(
                product,
                default_price,
                RESET_STRATEGY_NAME,
                &product.strategy_id,
                None,
                Default::default(),
                Instant::now(),
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                warn!(
                    asin = %product.asin,
                    seller_id = %product.seller_id,
                    error = %err,
                    "default-price reset failed"
                );
                Err(())
            }
        }
    }
}

fn until_next_hour(now: DateTime<Utc>) -> std::time::Duration {
    let next = (now + ChronoDuration::hours(1))
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now + ChronoDuration::hours(1));
    (next - now).to_std().unwrap_or(std::time::Duration::from_secs(3600))
}
