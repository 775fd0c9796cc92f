//! Typed facade over the key-value store.
//!
//! The store exclusively owns all persistent entities (products, strategies,
//! calculated prices, pause flags, reset rules). The engine never keeps
//! cross-event state in-process.
//!
//! Conceptual layout, matching the external publisher's expectations:
//! - hash `ASIN_{asin}`, fields `"{seller_id}:{sku}"` → product JSON
//! - hash `CALCULATED_PRICES:{seller_id}`, fields `"{sku}"` → price JSON,
//!   TTL 2 hours on the hash
//! - key `repricing_paused:{seller_id}:{asin}` → timestamp string
//! - hash `strategy:{id}` → strategy JSON
//! - reset-rule sets keyed by seller

mod memory;
mod timed;

pub use memory::MemoryStore;
pub use timed::TimedStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CalculatedPrice, Marketplace, Product, ResetRuleSet, Strategy};

/// Store failures. Transient errors are retried via message redelivery;
/// malformed records are fatal for the event.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transient store failure: {0}")]
    Transient(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_product(
        &self,
        asin: &str,
        seller_id: &str,
        sku: &str,
    ) -> Result<Option<Product>, StoreError>;

    /// Walk the `{seller_id}:{sku}` field set under `ASIN_{asin}` and return
    /// the seller's SKU, if listed.
    async fn find_sku(&self, asin: &str, seller_id: &str) -> Result<Option<String>, StoreError>;

    async fn get_stock(
        &self,
        asin: &str,
        seller_id: &str,
        sku: &str,
    ) -> Result<Option<i64>, StoreError>;

    async fn get_strategy(&self, id: &str) -> Result<Option<Strategy>, StoreError>;

    /// Write one calculated price into `CALCULATED_PRICES:{seller_id}` and
    /// refresh the hash TTL. Field write and TTL are applied atomically.
    /// Change-only semantics are enforced by the caller.
    async fn save_calculated_price(
        &self,
        asin: &str,
        seller_id: &str,
        sku: &str,
        price: &CalculatedPrice,
    ) -> Result<bool, StoreError>;

    async fn get_calculated_price(
        &self,
        seller_id: &str,
        sku: &str,
    ) -> Result<Option<CalculatedPrice>, StoreError>;

    async fn clear_calculated_price(
        &self,
        seller_id: &str,
        sku: &str,
    ) -> Result<bool, StoreError>;

    async fn is_paused(&self, seller_id: &str, asin: &str) -> Result<bool, StoreError>;

    async fn set_paused(
        &self,
        seller_id: &str,
        asin: &str,
        paused: bool,
    ) -> Result<(), StoreError>;

    async fn get_reset_rules(
        &self,
        seller_id: &str,
        marketplace: Marketplace,
    ) -> Result<Option<ResetRuleSet>, StoreError>;

    /// All rule sets, for the hourly sweep.
    async fn list_reset_rules(&self) -> Result<Vec<ResetRuleSet>, StoreError>;

    /// Every product of a seller across all ASIN hashes.
    async fn products_for_seller(&self, seller_id: &str) -> Result<Vec<Product>, StoreError>;

    // Listing-sync surface. External jobs own these writes; the core only
    // uses them in tests and the demo binary.
    async fn put_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn put_strategy(&self, strategy: &Strategy) -> Result<(), StoreError>;
    async fn put_reset_rules(&self, rules: &ResetRuleSet) -> Result<(), StoreError>;
}
