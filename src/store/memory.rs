//! In-memory reference store.
//!
//! Mirrors the production key-value layout exactly: products live as JSON
//! strings in per-ASIN hashes, calculated prices as JSON in per-seller
//! hashes with a TTL, pause flags as timestamp strings. Keeping the JSON
//! indirection means serde round-trips are exercised the same way they would
//! be against a real store.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::models::{CalculatedPrice, Marketplace, Product, ResetRuleSet, Strategy};

use super::{Store, StoreError};

#[derive(Default)]
struct Inner {
    /// `ASIN_{asin}` → (`{seller_id}:{sku}` → product JSON)
    asin_hashes: HashMap<String, HashMap<String, String>>,
    /// `CALCULATED_PRICES:{seller_id}` → hash + expiry
    calculated: HashMap<String, PriceHash>,
    /// `repricing_paused:{seller_id}:{asin}` → timestamp string
    paused: HashMap<String, String>,
    /// `strategy:{id}` → strategy JSON
    strategies: HashMap<String, String>,
    /// reset rules keyed by seller id
    reset_rules: HashMap<String, ResetRuleSet>,
}

#[derive(Default)]
struct PriceHash {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
    price_ttl: Duration,
}

impl MemoryStore {
    pub fn new(price_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            price_ttl,
        }
    }

    fn field_key(seller_id: &str, sku: &str) -> String {
        format!("{seller_id}:{sku}")
    }

    fn pause_key(seller_id: &str, asin: &str) -> String {
        format!("repricing_paused:{seller_id}:{asin}")
    }

    fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Malformed(e.to_string()))
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
        serde_json::to_string(value).map_err(|e| StoreError::Malformed(e.to_string()))
    }

    /// Drop an expired price hash before reading it.
    fn purge_expired(hash: &mut HashMap<String, PriceHash>, seller_id: &str) {
        let expired = hash
            .get(seller_id)
            .and_then(|h| h.expires_at)
            .map(|t| t <= Instant::now())
            .unwrap_or(false);
        if expired {
            hash.remove(seller_id);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2 * 60 * 60))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_product(
        &self,
        asin: &str,
        seller_id: &str,
        sku: &str,
    ) -> Result<Option<Product>, StoreError> {
        let inner = self.inner.read();
        let Some(fields) = inner.asin_hashes.get(&format!("ASIN_{asin}")) else {
            return Ok(None);
        };
        match fields.get(&Self::field_key(seller_id, sku)) {
            Some(raw) => Ok(Some(Self::decode(raw)?)),
            None => Ok(None),
        }
    }

    async fn find_sku(&self, asin: &str, seller_id: &str) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read();
        let Some(fields) = inner.asin_hashes.get(&format!("ASIN_{asin}")) else {
            return Ok(None);
        };
        let prefix = format!("{seller_id}:");
        Ok(fields
            .keys()
            .find(|field| field.starts_with(&prefix))
            .map(|field| field[prefix.len()..].to_string()))
    }

    async fn get_stock(
        &self,
        asin: &str,
        seller_id: &str,
        sku: &str,
    ) -> Result<Option<i64>, StoreError> {
        Ok(self
            .get_product(asin, seller_id, sku)
            .await?
            .map(|p| p.quantity))
    }

    async fn get_strategy(&self, id: &str) -> Result<Option<Strategy>, StoreError> {
        let inner = self.inner.read();
        match inner.strategies.get(id) {
            Some(raw) => Ok(Some(Self::decode(raw)?)),
            None => Ok(None),
        }
    }

    async fn save_calculated_price(
        &self,
        _asin: &str,
        seller_id: &str,
        sku: &str,
        price: &CalculatedPrice,
    ) -> Result<bool, StoreError> {
        let raw = Self::encode(price)?;
        let mut inner = self.inner.write();
        // Field write and TTL refresh under one lock: a crash leaves both or
        // neither, matching the pipelined hash-set + expire of a real store.
        let hash = inner.calculated.entry(seller_id.to_string()).or_default();
        hash.fields.insert(sku.to_string(), raw);
        hash.expires_at = Some(Instant::now() + self.price_ttl);
        Ok(true)
    }

    async fn get_calculated_price(
        &self,
        seller_id: &str,
        sku: &str,
    ) -> Result<Option<CalculatedPrice>, StoreError> {
        let mut inner = self.inner.write();
        Self::purge_expired(&mut inner.calculated, seller_id);
        let Some(hash) = inner.calculated.get(seller_id) else {
            return Ok(None);
        };
        match hash.fields.get(sku) {
            Some(raw) => Ok(Some(Self::decode(raw)?)),
            None => Ok(None),
        }
    }

    async fn clear_calculated_price(
        &self,
        seller_id: &str,
        sku: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        Ok(inner
            .calculated
            .get_mut(seller_id)
            .map(|hash| hash.fields.remove(sku).is_some())
            .unwrap_or(false))
    }

    async fn is_paused(&self, seller_id: &str, asin: &str) -> Result<bool, StoreError> {
        let inner = self.inner.read();
        Ok(inner.paused.contains_key(&Self::pause_key(seller_id, asin)))
    }

    async fn set_paused(
        &self,
        seller_id: &str,
        asin: &str,
        paused: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let key = Self::pause_key(seller_id, asin);
        if paused {
            inner.paused.insert(key, Utc::now().to_rfc3339());
        } else {
            inner.paused.remove(&key);
        }
        Ok(())
    }

    async fn get_reset_rules(
        &self,
        seller_id: &str,
        _marketplace: Marketplace,
    ) -> Result<Option<ResetRuleSet>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.reset_rules.get(seller_id).cloned())
    }

    async fn list_reset_rules(&self) -> Result<Vec<ResetRuleSet>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.reset_rules.values().cloned().collect())
    }

    async fn products_for_seller(&self, seller_id: &str) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.read();
        let prefix = format!("{seller_id}:");
        let mut products = Vec::new();
        for fields in inner.asin_hashes.values() {
            for (field, raw) in fields {
                if field.starts_with(&prefix) {
                    products.push(Self::decode(raw)?);
                }
            }
        }
        Ok(products)
    }

    async fn put_product(&self, product: &Product) -> Result<(), StoreError> {
        let raw = Self::encode(product)?;
        let mut inner = self.inner.write();
        inner
            .asin_hashes
            .entry(format!("ASIN_{}", product.asin))
            .or_default()
            .insert(Self::field_key(&product.seller_id, &product.sku), raw);
        Ok(())
    }

    async fn put_strategy(&self, strategy: &Strategy) -> Result<(), StoreError> {
        let raw = Self::encode(strategy)?;
        let mut inner = self.inner.write();
        inner.strategies.insert(strategy.id.clone(), raw);
        Ok(())
    }

    async fn put_reset_rules(&self, rules: &ResetRuleSet) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner
            .reset_rules
            .insert(rules.seller_id.clone(), rules.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::{
        CompeteWith, ItemCondition, PriceRule, ProductStatus, StrategyIntent,
    };

    fn product(asin: &str, seller: &str, sku: &str) -> Product {
        Product {
            asin: asin.into(),
            sku: sku.into(),
            seller_id: seller.into(),
            marketplace: Marketplace::US,
            listed_price: 30.0,
            min_price: Some(20.0),
            max_price: Some(40.0),
            default_price: Some(25.0),
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

    fn calc(asin: &str, seller: &str, sku: &str, new_price: f64) -> CalculatedPrice {
        CalculatedPrice {
            asin: asin.into(),
            sku: sku.into(),
            seller_id: seller.into(),
            old_price: 30.0,
            new_price,
            strategy_used: "ChaseBuyBox".into(),
            strategy_id: "s1".into(),
            competitor_price: Some(26.49),
            calculated_at: Utc::now(),
            processing_time_ms: 1.5,
            tier_prices: None,
        }
    }

    #[tokio::test]
    async fn find_sku_walks_seller_fields() {
        let store = MemoryStore::default();
        store.put_product(&product("B07TEST123", "A1", "T1")).await.unwrap();
        store.put_product(&product("B07TEST123", "A2", "T9")).await.unwrap();

        assert_eq!(
            store.find_sku("B07TEST123", "A1").await.unwrap(),
            Some("T1".to_string())
        );
        assert_eq!(
            store.find_sku("B07TEST123", "A2").await.unwrap(),
            Some("T9".to_string())
        );
        assert_eq!(store.find_sku("B07TEST123", "A3").await.unwrap(), None);
        assert_eq!(store.find_sku("B00MISSING", "A1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn calculated_price_round_trips_all_fields() {
        let store = MemoryStore::default();
        let mut price = calc("B07TEST123", "A1", "T1", 26.48);
        price.tier_prices = Some(HashMap::from([("5".to_string(), 24.99)]));

        store
            .save_calculated_price("B07TEST123", "A1", "T1", &price)
            .await
            .unwrap();
        let read = store
            .get_calculated_price("A1", "T1")
            .await
            .unwrap()
            .expect("saved price");

        assert_eq!(read.asin, price.asin);
        assert_eq!(read.sku, price.sku);
        assert_eq!(read.seller_id, price.seller_id);
        assert_eq!(read.old_price, price.old_price);
        assert_eq!(read.new_price, price.new_price);
        assert_eq!(read.strategy_used, price.strategy_used);
        assert_eq!(read.strategy_id, price.strategy_id);
        assert_eq!(read.competitor_price, price.competitor_price);
        assert_eq!(read.tier_prices, price.tier_prices);
    }

    #[tokio::test]
    async fn calculated_prices_expire_with_the_hash() {
        let store = MemoryStore::new(Duration::from_millis(10));
        store
            .save_calculated_price("B07TEST123", "A1", "T1", &calc("B07TEST123", "A1", "T1", 26.48))
            .await
            .unwrap();
        assert!(store.get_calculated_price("A1", "T1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(store.get_calculated_price("A1", "T1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pause_flag_set_and_clear() {
        let store = MemoryStore::default();
        assert!(!store.is_paused("A1", "B07TEST123").await.unwrap());

        store.set_paused("A1", "B07TEST123", true).await.unwrap();
        assert!(store.is_paused("A1", "B07TEST123").await.unwrap());
        // Different asin stays untouched.
        assert!(!store.is_paused("A1", "B07OTHER00").await.unwrap());

        store.set_paused("A1", "B07TEST123", false).await.unwrap();
        assert!(!store.is_paused("A1", "B07TEST123").await.unwrap());
    }

    #[tokio::test]
    async fn products_for_seller_spans_asins() {
        let store = MemoryStore::default();
        store.put_product(&product("B07AAA0001", "A1", "SKU-A")).await.unwrap();
        store.put_product(&product("B07BBB0002", "A1", "SKU-B")).await.unwrap();
        store.put_product(&product("B07BBB0002", "A2", "SKU-X")).await.unwrap();

        let mut skus: Vec<String> = store
            .products_for_seller("A1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.sku)
            .collect();
        skus.sort();
        assert_eq!(skus, vec!["SKU-A".to_string(), "SKU-B".to_string()]);
    }

    #[tokio::test]
    async fn strategy_round_trip() {
        let store = MemoryStore::default();
        let strategy = Strategy {
            id: "s1".into(),
            seller_id: "A1".into(),
            asin: None,
            intent: StrategyIntent::WinBuybox,
            compete_with: CompeteWith::LowestPrice,
            beat_by: -0.01,
            min_price_rule: PriceRule::JumpToMin,
            max_price_rule: PriceRule::JumpToMax,
            enabled: true,
            conditions: vec![ItemCondition::New],
        };
        store.put_strategy(&strategy).await.unwrap();
        let read = store.get_strategy("s1").await.unwrap().expect("strategy");
        assert_eq!(read.compete_with, CompeteWith::LowestPrice);
        assert_eq!(read.beat_by, -0.01);
        assert!(store.get_strategy("unknown").await.unwrap().is_none());
    }
}
