//! The repricing pipeline: eligibility → competitor selection → strategy →
//! bounds → change-only persist.
//!
//! Every stage returns `Result<_, RepriceError>` with skips carried on the
//! Ok side; only the ingress layer decides what an error means for the
//! underlying message.

pub mod bounds;
pub mod competitor;
pub mod eligibility;
pub mod persister;
pub mod strategy;


use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{Outcome, RepriceError, SkipReason};
use crate::models::OfferChange;
use crate::stats::ProcessingStats;
use crate::store::Store;

pub use persister::Persister;

pub struct RepricingEngine {
    store: Arc<dyn Store>,
    persister: Persister,
    stats: Arc<ProcessingStats>,
}

impl RepricingEngine {
    pub fn new(store: Arc<dyn Store>, stats: Arc<ProcessingStats>) -> Self {
        Self {
            persister: Persister::new(store.clone()),
            store,
            stats,
        }
    }

    pub fn persister(&self) -> &Persister {
        &self.persister
    }

    /// Run one offer-change event end to end and record the outcome in the
    /// processing stats.
    pub async fn process(&self, change: &OfferChange) -> Result<Outcome, RepriceError> {
        let started = Instant::now();
        let result = self.run(change, started).await;

        match &result {
            Ok(Outcome::Priced(price)) => {
                self.stats.record_success(started.elapsed());
                info!(
                    asin = %change.product_id,
                    seller_id = %change.seller_id,
                    platform = change.platform.as_str(),
                    old_price = price.old_price,
                    new_price = price.new_price,
                    strategy = %price.strategy_used,
                    "repriced"
                );
            }
            Ok(Outcome::Unchanged { price }) => {
                self.stats.record_skip(started.elapsed());
                debug!(
                    asin = %change.product_id,
                    seller_id = %change.seller_id,
                    price,
                    "price unchanged, not persisting"
                );
            }
            Ok(Outcome::Skipped(reason)) => {
                self.stats.record_skip(started.elapsed());
                if let SkipReason::PriceBounds { candidate, min, max } = reason {
                    warn!(
                        asin = %change.product_id,
                        seller_id = %change.seller_id,
                        candidate = *candidate,
                        min = min.unwrap_or(f64::NAN),
                        max = max.unwrap_or(f64::NAN),
                        "price bounds violation"
                    );
                } else {
                    debug!(
                        asin = %change.product_id,
                        seller_id = %change.seller_id,
                        reason = reason.as_str(),
                        "repricing skipped"
                    );
                }
            }
            Err(err) => {
                self.stats.record_failure(started.elapsed());
                warn!(
                    asin = %change.product_id,
                    seller_id = %change.seller_id,
                    error = %err,
                    "repricing failed"
                );
            }
        }

        result
    }

    async fn run(
        &self,
        change: &OfferChange,
        started: Instant,
    ) -> Result<Outcome, RepriceError> {
        let eligible =
            match eligibility::check(self.store.as_ref(), change, Utc::now()).await? {
                eligibility::Gate::Skip(reason) => return Ok(Outcome::Skipped(reason)),
                eligibility::Gate::Proceed(eligible) => eligible,
            };
        let product = &eligible.product;
        let stored_strategy = &eligible.strategy;

        let kind = strategy::select_kind(change, &change.seller_id);
        let selection = if kind.needs_competitor() {
            match competitor::select(change, product, stored_strategy) {
                Ok(selection) => Some(selection),
                Err(reason) => return Ok(Outcome::Skipped(reason)),
            }
        } else {
            None
        };

        let candidate =
            match strategy::compute(kind, product, stored_strategy, selection.as_ref()) {
                Ok(candidate) => candidate,
                Err(reason) => return Ok(Outcome::Skipped(reason)),
            };

        let final_price = match bounds::apply(
            candidate.price,
            candidate.competitor_price,
            product,
            stored_strategy,
        ) {
            Ok(price) => price,
            Err(reason) => return Ok(Outcome::Skipped(reason)),
        };

        if bounds::is_unchanged(final_price, product.listed_price) {
            return Ok(Outcome::Unchanged { price: final_price });
        }

        let persisted = self
            .persister
            .persist(
                product,
                final_price,
                kind.name(),
                &stored_strategy.id,
                candidate.competitor_price,
                candidate.tier_prices,
                started,
            )
            .await?;

        Ok(Outcome::Priced(persisted))
    }
}
