//! Per-operation timeout wrapper around any store.
//!
//! A store round-trip that exceeds its budget surfaces as
//! `StoreError::Transient`, which the ingress layer turns into redelivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{CalculatedPrice, Marketplace, Product, ResetRuleSet, Strategy};

use super::{Store, StoreError};

pub struct TimedStore {
    inner: Arc<dyn Store>,
    op_timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn Store>, op_timeout: Duration) -> Self {
        Self { inner, op_timeout }
    }

    async fn timed<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Transient(format!(
                "store operation timed out after {:?}",
                self.op_timeout
            ))),
        }
    }
}

#[async_trait]
impl Store for TimedStore {
    async fn get_product(
        &self,
        asin: &str,
        seller_id: &str,
        sku: &str,
    ) -> Result<Option<Product>, StoreError> {
        self.timed(self.inner.get_product(asin, seller_id, sku)).await
    }

    async fn find_sku(&self, asin: &str, seller_id: &str) -> Result<Option<String>, StoreError> {
        self.timed(self.inner.find_sku(asin, seller_id)).await
    }

    async fn get_stock(
        &self,
        asin: &str,
        seller_id: &str,
        sku: &str,
    ) -> Result<Option<i64>, StoreError> {
        self.timed(self.inner.get_stock(asin, seller_id, sku)).await
    }

    async fn get_strategy(&self, id: &str) -> Result<Option<Strategy>, StoreError> {
        self.timed(self.inner.get_strategy(id)).await
    }

    async fn save_calculated_price(
        &self,
        asin: &str,
        seller_id: &str,
        sku: &str,
        price: &CalculatedPrice,
    ) -> Result<bool, StoreError> {
        self.timed(self.inner.save_calculated_price(asin, seller_id, sku, price))
            .await
    }

    async fn get_calculated_price(
        &self,
        seller_id: &str,
        sku: &str,
    ) -> Result<Option<CalculatedPrice>, StoreError> {
        self.timed(self.inner.get_calculated_price(seller_id, sku)).await
    }

    async fn clear_calculated_price(
        &self,
        seller_id: &str,
        sku: &str,
    ) -> Result<bool, StoreError> {
        self.timed(self.inner.clear_calculated_price(seller_id, sku)).await
    }

    async fn is_paused(&self, seller_id: &str, asin: &str) -> Result<bool, StoreError> {
        self.timed(self.inner.is_paused(seller_id, asin)).await
    }

    async fn set_paused(
        &self,
        seller_id: &str,
        asin: &str,
        paused: bool,
    ) -> Result<(), StoreError> {
        self.timed(self.inner.set_paused(seller_id, asin, paused)).await
    }

    async fn get_reset_rules(
        &self,
        seller_id: &str,
        marketplace: Marketplace,
    ) -> Result<Option<ResetRuleSet>, StoreError> {
        self.timed(self.inner.get_reset_rules(seller_id, marketplace)).await
    }

    async fn list_reset_rules(&self) -> Result<Vec<ResetRuleSet>, StoreError> {
        self.timed(self.inner.list_reset_rules()).await
    }

    async fn products_for_seller(&self, seller_id: &str) -> Result<Vec<Product>, StoreError> {
        self.timed(self.inner.products_for_seller(seller_id)).await
    }

    async fn put_product(&self, product: &Product) -> Result<(), StoreError> {
        self.timed(self.inner.put_product(product)).await
    }

    async fn put_strategy(&self, strategy: &Strategy) -> Result<(), StoreError> {
        self.timed(self.inner.put_strategy(strategy)).await
    }

    async fn put_reset_rules(&self, rules: &ResetRuleSet) -> Result<(), StoreError> {
        self.timed(self.inner.put_reset_rules(rules)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct StalledStore;

    #[async_trait]
    impl Store for StalledStore {
        async fn get_product(
            &self,
            _asin: &str,
            _seller_id: &str,
            _sku: &str,
        ) -> Result<Option<Product>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn find_sku(&self, _: &str, _: &str) -> Result<Option<String>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn get_stock(&self, _: &str, _: &str, _: &str) -> Result<Option<i64>, StoreError> {
            Ok(None)
        }

        async fn get_strategy(&self, _: &str) -> Result<Option<Strategy>, StoreError> {
            Ok(None)
        }

        async fn save_calculated_price(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &CalculatedPrice,
        ) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn get_calculated_price(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Option<CalculatedPrice>, StoreError> {
            Ok(None)
        }

        async fn clear_calculated_price(&self, _: &str, _: &str) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn is_paused(&self, _: &str, _: &str) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn set_paused(&self, _: &str, _: &str, _: bool) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get_reset_rules(
            &self,
            _: &str,
            _: Marketplace,
        ) -> Result<Option<ResetRuleSet>, StoreError> {
            Ok(None)
        }

        async fn list_reset_rules(&self) -> Result<Vec<ResetRuleSet>, StoreError> {
            Ok(Vec::new())
        }

        async fn products_for_seller(&self, _: &str) -> Result<Vec<Product>, StoreError> {
            Ok(Vec::new())
        }

        async fn put_product(&self, _: &Product) -> Result<(), StoreError> {
            Ok(())
        }

        async fn put_strategy(&self, _: &Strategy) -> Result<(), StoreError> {
            Ok(())
        }

        async fn put_reset_rules(&self, _: &ResetRuleSet) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn stalled_operation_maps_to_transient() {
        let store = TimedStore::new(Arc::new(StalledStore), Duration::from_millis(50));
        let err = store.find_sku("B07TEST123", "A1").await.unwrap_err();
        assert!(matches!(err, StoreError::Transient(_)));
    }

    #[tokio::test]
    async fn fast_operations_pass_through() {
        let store = TimedStore::new(
            Arc::new(MemoryStore::default()),
            Duration::from_millis(500),
        );
        assert!(store.find_sku("B07TEST123", "A1").await.unwrap().is_none());
    }
}
