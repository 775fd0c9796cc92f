//! Persister: builds the `CalculatedPrice` artifact and writes it to the
//! store. Change-only semantics are the pipeline's job; manual and reset
//! writes come straight here and always land.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::info;

use crate::error::RepriceError;
use crate::models::{CalculatedPrice, Product};
use crate::store::{Store, StoreError};

pub struct Persister {
    store: Arc<dyn Store>,
}

impl Persister {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Persist a freshly calculated price. Returns the stored artifact.
    pub async fn persist(
        &self,
        product: &Product,
        new_price: f64,
        strategy_used: &str,
        strategy_id: &str,
        competitor_price: Option<f64>,
        tier_prices: HashMap<String, f64>,
        started: Instant,
    ) -> Result<CalculatedPrice, RepriceError> {
        let price = CalculatedPrice {
            asin: product.asin.clone(),
            sku: product.sku.clone(),
            seller_id: product.seller_id.clone(),
            old_price: product.listed_price,
            new_price,
            strategy_used: strategy_used.to_string(),
            strategy_id: strategy_id.to_string(),
            competitor_price,
            calculated_at: Utc::now(),
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            tier_prices: if tier_prices.is_empty() {
                None
            } else {
                Some(tier_prices)
            },
        };

        let acknowledged = self
            .store
            .save_calculated_price(&product.asin, &product.seller_id, &product.sku, &price)
            .await
            .map_err(map_store_err)?;
        if !acknowledged {
            return Err(RepriceError::Transient(
                "store did not acknowledge calculated-price write".into(),
            ));
        }

        info!(
            asin = %price.asin,
            seller_id = %price.seller_id,
            sku = %price.sku,
            old_price = price.old_price,
            new_price = price.new_price,
            strategy = %price.strategy_used,
            "calculated price persisted"
        );
        Ok(price)
    }
}

fn map_store_err(err: StoreError) -> RepriceError {
    match err {
        StoreError::Transient(msg) => RepriceError::Transient(msg),
        StoreError::Malformed(msg) => RepriceError::Fatal(format!("store record: {msg}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemCondition, Marketplace, ProductStatus};
    use crate::store::MemoryStore;

    fn product() -> Product {
        Product {
            asin: "B07TEST123".into(),
            sku: "T1".into(),
            seller_id: "A1".into(),
            marketplace: Marketplace::US,
            listed_price: 30.0,
            min_price: Some(20.0),
            max_price: Some(40.0),
            default_price: None,
            item_condition: ItemCondition::New,
            quantity: 5,
            status: ProductStatus::Active,
            repricer_enabled: true,
            strategy_id: "s1".into(),
            is_b2b: false,
            business_pricing: HashMap::new(),
            inventory_age_days: None,
        }
    }

    #[tokio::test]
    async fn persist_writes_full_artifact() {
        let store = Arc::new(MemoryStore::default());
        let persister = Persister::new(store.clone());

        let written = persister
            .persist(
                &product(),
                26.48,
                "ChaseBuyBox",
                "s1",
                Some(26.49),
                HashMap::new(),
                Instant::now(),
            )
            .await
            .unwrap();

        assert_eq!(written.old_price, 30.0);
        assert_eq!(written.new_price, 26.48);
        assert!(written.processing_time_ms >= 0.0);

        let stored = store
            .get_calculated_price("A1", "T1")
            .await
            .unwrap()
            .expect("persisted price");
        assert_eq!(stored.new_price, 26.48);
        assert_eq!(stored.strategy_used, "ChaseBuyBox");
        assert_eq!(stored.competitor_price, Some(26.49));
        assert!(stored.tier_prices.is_none());
    }

    #[tokio::test]
    async fn tier_prices_survive_the_write() {
        let store = Arc::new(MemoryStore::default());
        let persister = Persister::new(store.clone());

        persister
            .persist(
                &product(),
                26.48,
                "ChaseBuyBox",
                "s1",
                Some(26.49),
                HashMap::from([("5".to_string(), 23.99)]),
                Instant::now(),
            )
            .await
            .unwrap();

        let stored = store
            .get_calculated_price("A1", "T1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.tier_prices.unwrap()["5"], 23.99);
    }
}
