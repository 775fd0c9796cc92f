//! Eligibility gate: decides whether an offer-change event proceeds to
//! pricing. Checks run in a fixed order and the first hit short-circuits.
//! The gate only reads; it never mutates store state.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{RepriceError, SkipReason};
use crate::models::{CompeteWith, OfferChange, Product, Strategy};
use crate::reset::in_reset_window;
use crate::store::{Store, StoreError};

/// Gate verdict. `Proceed` carries everything later stages need so they do
/// not have to re-fetch.
pub enum Gate {
    Proceed(Eligible),
    Skip(SkipReason),
}

pub struct Eligible {
    pub product: Product,
    pub strategy: Strategy,
}

pub async fn check(
    store: &dyn Store,
    change: &OfferChange,
    now: DateTime<Utc>,
) -> Result<Gate, RepriceError> {
    // 1. Reset window: sellers inside their configured window are frozen.
    if let Some(rules) = store
        .get_reset_rules(&change.seller_id, change.marketplace)
        .await
        .map_err(map_store_err)?
    {
        if rules.enabled && in_reset_window(&rules, now) {
            return Ok(Gate::Skip(SkipReason::ResetWindow));
        }
    }

    // 2. Resolve the listing. Both platforms address products by ASIN and
    // resolve the seller's SKU from the catalog hash.
    let asin = change.product_id.as_str();
    let Some(sku) = store
        .find_sku(asin, &change.seller_id)
        .await
        .map_err(map_store_err)?
    else {
        return Ok(Gate::Skip(SkipReason::ProductNotFound));
    };
    let Some(product) = store
        .get_product(asin, &change.seller_id, &sku)
        .await
        .map_err(map_store_err)?
    else {
        return Ok(Gate::Skip(SkipReason::ProductNotFound));
    };

    // 3. Pause flag.
    if store
        .is_paused(&change.seller_id, asin)
        .await
        .map_err(map_store_err)?
    {
        return Ok(Gate::Skip(SkipReason::Paused));
    }

    // 4. Stock.
    let quantity = store
        .get_stock(asin, &change.seller_id, &sku)
        .await
        .map_err(map_store_err)?
        .unwrap_or(product.quantity);
    if quantity <= 0 {
        return Ok(Gate::Skip(SkipReason::OutOfStock));
    }

    // 5. Listing status.
    if !product.status.is_active() {
        return Ok(Gate::Skip(SkipReason::Inactive(
            product.status.as_str().to_string(),
        )));
    }
    if !product.repricer_enabled {
        return Ok(Gate::Skip(SkipReason::RepricerDisabled));
    }

    // 6. Strategy lookup and applicability.
    let Some(strategy) = store
        .get_strategy(&product.strategy_id)
        .await
        .map_err(map_store_err)?
    else {
        return Ok(Gate::Skip(SkipReason::StrategyNotFound));
    };
    if !strategy.enabled {
        return Ok(Gate::Skip(SkipReason::StrategyDisabled));
    }
    if !strategy.conditions.is_empty()
        && !strategy.conditions.contains(&product.item_condition)
    {
        return Ok(Gate::Skip(SkipReason::StrategyNotApplicable));
    }

    // 7. Self-competition, strategy-aware: the slot this strategy competes
    // against must not be our own offer. A sole-seller event has no
    // competition to check; it flows to the OnlySeller strategy.
    if change.summary.total_offers != 1
        && is_self_competition(change, &strategy, &change.seller_id)
    {
        debug!(
            asin,
            seller_id = %change.seller_id,
            compete_with = strategy.compete_with.as_str(),
            "self-competition detected"
        );
        return Ok(Gate::Skip(SkipReason::SelfCompetition));
    }

    Ok(Gate::Proceed(Eligible { product, strategy }))
}

fn is_self_competition(change: &OfferChange, strategy: &Strategy, our_seller: &str) -> bool {
    let slot = match strategy.compete_with {
        CompeteWith::LowestPrice => &change.summary.lowest_price_competitor,
        CompeteWith::LowestFbaPrice => &change.summary.lowest_fba_competitor,
        CompeteWith::MatchBuybox => &change.summary.buybox_winner,
    };
    slot.as_ref()
        .map(|offer| offer.seller_id == our_seller)
        .unwrap_or(false)
}

fn map_store_err(err: StoreError) -> RepriceError {
    match err {
        StoreError::Transient(msg) => RepriceError::Transient(msg),
        StoreError::Malformed(msg) => RepriceError::Fatal(format!("store record: {msg}")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::NaiveTime;

    use super::*;
    use crate::models::{
        FulfillmentChannel, ItemCondition, Marketplace, Offer, Platform, PriceRule,
        ProductStatus, ResetRuleSet, StrategyIntent,
    };
    use crate::store::MemoryStore;

    fn offer(seller: &str, price: f64, buybox: bool) -> Offer {
        Offer {
            seller_id: seller.into(),
            price,
            landed_price: None,
            shipping: 0.0,
            condition: ItemCondition::New,
            fulfillment: FulfillmentChannel::Fba,
            is_buybox_winner: buybox,
            is_prime: false,
            quantity_tier: None,
        }
    }

    fn change_with(offers: Vec<Offer>) -> OfferChange {
        let summary = crate::ingest::normalizer::derive_summary(
            &offers,
            ItemCondition::New,
            None,
            None,
        );
        OfferChange {
            product_id: "B07TEST123".into(),
            seller_id: "A1".into(),
            marketplace: Marketplace::US,
            platform: Platform::Amazon,
            event_time: Utc::now(),
            item_condition: ItemCondition::New,
            offers,
            summary,
        }
    }

    fn product() -> Product {
        Product {
            asin: "B07TEST123".into(),
            sku: "T1".into(),
            seller_id: "A1".into(),
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

    fn strategy() -> Strategy {
        Strategy {
            id: "s1".into(),
            seller_id: "A1".into(),
            asin: None,
            intent: StrategyIntent::WinBuybox,
            compete_with: CompeteWith::LowestPrice,
            beat_by: -0.01,
            min_price_rule: PriceRule::JumpToMin,
            max_price_rule: PriceRule::JumpToMax,
            enabled: true,
            conditions: Vec::new(),
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::default());
        store.put_product(&product()).await.unwrap();
        store.put_strategy(&strategy()).await.unwrap();
        store
    }

    fn assert_skip(gate: Gate, expected: SkipReason) {
        match gate {
            Gate::Skip(reason) => assert_eq!(reason, expected),
            Gate::Proceed(_) => panic!("expected skip {expected:?}, got proceed"),
        }
    }

    #[tokio::test]
    async fn happy_path_proceeds() {
        let store = seeded_store().await;
        let change = change_with(vec![offer("C1", 25.99, true), offer("A1", 30.0, false)]);
        match check(store.as_ref(), &change, Utc::now()).await.unwrap() {
            Gate::Proceed(eligible) => {
                assert_eq!(eligible.product.sku, "T1");
                assert_eq!(eligible.strategy.id, "s1");
            }
            Gate::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[tokio::test]
    async fn unknown_product_skips() {
        let store = seeded_store().await;
        let mut change = change_with(vec![offer("C1", 25.99, true)]);
        change.product_id = "B00UNKNOWN0".into();
        assert_skip(
            check(store.as_ref(), &change, Utc::now()).await.unwrap(),
            SkipReason::ProductNotFound,
        );
    }

    #[tokio::test]
    async fn paused_product_skips_before_stock() {
        let store = seeded_store().await;
        store.set_paused("A1", "B07TEST123", true).await.unwrap();

        // Even an out-of-stock product reports paused first.
        let mut oos = product();
        oos.quantity = 0;
        store.put_product(&oos).await.unwrap();

        let change = change_with(vec![offer("C1", 25.99, true)]);
        assert_skip(
            check(store.as_ref(), &change, Utc::now()).await.unwrap(),
            SkipReason::Paused,
        );
    }

    #[tokio::test]
    async fn out_of_stock_skips() {
        let store = seeded_store().await;
        let mut p = product();
        p.quantity = 0;
        store.put_product(&p).await.unwrap();

        let change = change_with(vec![offer("C1", 25.99, true)]);
        assert_skip(
            check(store.as_ref(), &change, Utc::now()).await.unwrap(),
            SkipReason::OutOfStock,
        );
    }

    #[tokio::test]
    async fn inactive_listing_skips() {
        let store = seeded_store().await;
        let mut p = product();
        p.status = ProductStatus::Suppressed;
        store.put_product(&p).await.unwrap();

        let change = change_with(vec![offer("C1", 25.99, true)]);
        assert_skip(
            check(store.as_ref(), &change, Utc::now()).await.unwrap(),
            SkipReason::Inactive("Suppressed".into()),
        );
    }

    #[tokio::test]
    async fn self_competition_skips_for_lowest_price() {
        let store = seeded_store().await;
        // We are the cheapest offer on the listing.
        let change = change_with(vec![offer("A1", 24.99, false), offer("C1", 28.99, true)]);
        assert_skip(
            check(store.as_ref(), &change, Utc::now()).await.unwrap(),
            SkipReason::SelfCompetition,
        );
    }

    #[tokio::test]
    async fn buybox_self_check_only_applies_to_match_buybox() {
        let store = seeded_store().await;
        let mut s = strategy();
        s.compete_with = CompeteWith::MatchBuybox;
        store.put_strategy(&s).await.unwrap();

        // We hold the box; MATCH_BUYBOX has nothing external to match.
        let change = change_with(vec![offer("A1", 24.99, true), offer("C1", 28.99, false)]);
        assert_skip(
            check(store.as_ref(), &change, Utc::now()).await.unwrap(),
            SkipReason::SelfCompetition,
        );
    }

    #[tokio::test]
    async fn reset_window_skips_first() {
        let store = seeded_store().await;
        let now = Utc::now();
        // UK runs on UTC offset 0, so the window brackets `now` directly.
        let tod = now.time();
        let rules = ResetRuleSet {
            seller_id: "A1".into(),
            marketplace: Marketplace::UK,
            reset_time: tod - chrono::Duration::minutes(5),
            resume_time: tod + chrono::Duration::hours(1),
            enabled: true,
            product_condition: None,
        };
        store.put_reset_rules(&rules).await.unwrap();

        let change = change_with(vec![offer("C1", 25.99, true)]);
        assert_skip(
            check(store.as_ref(), &change, now).await.unwrap(),
            SkipReason::ResetWindow,
        );

        // Disabled rules never gate.
        let disabled = ResetRuleSet {
            enabled: false,
            ..rules
        };
        store.put_reset_rules(&disabled).await.unwrap();
        assert!(matches!(
            check(store.as_ref(), &change, now).await.unwrap(),
            Gate::Proceed(_)
        ));
    }

    #[tokio::test]
    async fn missing_strategy_skips() {
        let store = Arc::new(MemoryStore::default());
        store.put_product(&product()).await.unwrap();
        let change = change_with(vec![offer("C1", 25.99, true)]);
        assert_skip(
            check(store.as_ref(), &change, Utc::now()).await.unwrap(),
            SkipReason::StrategyNotFound,
        );
    }

    #[tokio::test]
    async fn repricer_disabled_skips() {
        let store = seeded_store().await;
        let mut p = product();
        p.repricer_enabled = false;
        store.put_product(&p).await.unwrap();
        let change = change_with(vec![offer("C1", 25.99, true)]);
        assert_skip(
            check(store.as_ref(), &change, Utc::now()).await.unwrap(),
            SkipReason::RepricerDisabled,
        );
    }

    #[test]
    fn reset_window_helper_used_by_gate() {
        // The gate leans on reset::in_reset_window; sanity-check the wrap
        // case here because eligibility is its main consumer.
        let rules = ResetRuleSet {
            seller_id: "A1".into(),
            marketplace: Marketplace::UK,
            reset_time: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            resume_time: NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            enabled: true,
            product_condition: None,
        };
        let inside = Utc::now()
            .date_naive()
            .and_hms_opt(23, 30, 0)
            .unwrap()
            .and_utc();
        let outside = Utc::now()
            .date_naive()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc();
        assert!(in_reset_window(&rules, inside));
        assert!(!in_reset_window(&rules, outside));
    }
}
