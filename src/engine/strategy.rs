//! Pricing strategies.
//!
//! The strategy stored on the product is advisory only: the engine selects
//! the concrete strategy per event from the market position (sole seller,
//! buy-box holder, or chaser) and computes a candidate price. Bounds are
//! applied afterwards by the rules module.

use std::collections::HashMap;

use tracing::warn;

use crate::error::SkipReason;
use crate::models::{OfferChange, Product, Strategy};

use super::competitor::Selection;

/// Concrete strategy chosen for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    OnlySeller,
    MaximiseProfit,
    ChaseBuyBox,
}

impl StrategyKind {
    /// Name recorded on the calculated price.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::OnlySeller => "OnlySeller",
            StrategyKind::MaximiseProfit => "MaximiseProfit",
            StrategyKind::ChaseBuyBox => "ChaseBuyBox",
        }
    }

    pub fn needs_competitor(&self) -> bool {
        !matches!(self, StrategyKind::OnlySeller)
    }
}

/// Dynamic strategy selection from the market position.
pub fn select_kind(change: &OfferChange, our_seller: &str) -> StrategyKind {
    if change.summary.total_offers == 1 {
        return StrategyKind::OnlySeller;
    }
    let we_hold_buybox = change
        .summary
        .buybox_winner
        .as_ref()
        .map(|o| o.seller_id == our_seller)
        .unwrap_or(false);
    if we_hold_buybox {
        StrategyKind::MaximiseProfit
    } else {
        StrategyKind::ChaseBuyBox
    }
}

/// Candidate price before bounds and rounding.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub price: f64,
    pub competitor_price: Option<f64>,
    /// B2B quantity-tier prices; already hard-bounded per tier.
    pub tier_prices: HashMap<String, f64>,
}

pub fn compute(
    kind: StrategyKind,
    product: &Product,
    strategy: &Strategy,
    selection: Option<&Selection>,
) -> Result<Candidate, SkipReason> {
    match kind {
        StrategyKind::OnlySeller => only_seller(product),
        StrategyKind::ChaseBuyBox => {
            let selection = selection.ok_or(SkipReason::NoCompetitor)?;
            chase_buybox(product, strategy, selection)
        }
        StrategyKind::MaximiseProfit => {
            let selection = selection.ok_or(SkipReason::NoCompetitor)?;
            maximise_profit(product, selection)
        }
    }
}

/// Sole seller on the listing: return to the default price, or the midpoint
/// of the bounds when no default is configured.
fn only_seller(product: &Product) -> Result<Candidate, SkipReason> {
    let price = match product.default_price.filter(|p| *p > 0.0) {
        Some(default) => default,
        None => match (product.min_price, product.max_price) {
            (Some(min), Some(max)) => (min + max) / 2.0,
            _ => return Err(SkipReason::NoPriceAnchor),
        },
    };
    Ok(Candidate {
        price,
        competitor_price: None,
        tier_prices: HashMap::new(),
    })
}

/// Chase the buy box: competitor's effective price plus the signed beat-by
/// offset. Typical configurations undercut by a cent.
fn chase_buybox(
    product: &Product,
    strategy: &Strategy,
    selection: &Selection,
) -> Result<Candidate, SkipReason> {
    let competitor_price = selection.competitor.effective_price();
    let price = competitor_price + strategy.beat_by;

    let mut tier_prices = HashMap::new();
    for (tier, offer) in &selection.tier_competitors {
        let tier_candidate = offer.effective_price() + strategy.beat_by;
        let bounds = product.business_pricing.get(tier);
        let min_ok = bounds
            .and_then(|b| b.min_price)
            .map(|min| tier_candidate >= min)
            .unwrap_or(true);
        let max_ok = bounds
            .and_then(|b| b.max_price)
            .map(|max| tier_candidate <= max)
            .unwrap_or(true);
        if min_ok && max_ok {
            tier_prices.insert(tier.clone(), super::bounds::round_half_up(tier_candidate));
        } else {
            warn!(
                asin = %product.asin,
                tier,
                candidate = tier_candidate,
                "tier candidate outside tier bounds, dropping tier"
            );
        }
    }

    Ok(Candidate {
        price,
        competitor_price: Some(competitor_price),
        tier_prices,
    })
}

/// We already hold the buy box: drift up toward the competitor, never down.
fn maximise_profit(product: &Product, selection: &Selection) -> Result<Candidate, SkipReason> {
    let competitor_price = selection.competitor.effective_price();
    if competitor_price <= product.listed_price {
        return Err(SkipReason::CompetitorNotHigher);
    }
    Ok(Candidate {
        price: competitor_price,
        competitor_price: Some(competitor_price),
        tier_prices: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::ingest::normalizer::derive_summary;
    use crate::models::{
        CompeteWith, FulfillmentChannel, ItemCondition, Marketplace, Offer, Platform, PriceRule,
        ProductStatus, StrategyIntent, TierPricing,
    };

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

    fn change(offers: Vec<Offer>, total_override: Option<usize>) -> OfferChange {
        let summary = derive_summary(&offers, ItemCondition::New, total_override, None);
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
            max_price: Some(50.0),
            default_price: Some(35.0),
            item_condition: ItemCondition::New,
            quantity: 5,
            status: ProductStatus::Active,
            repricer_enabled: true,
            strategy_id: "s1".into(),
            is_b2b: false,
            business_pricing: std::collections::HashMap::new(),
            inventory_age_days: None,
        }
    }

    fn strategy(beat_by: f64) -> Strategy {
        Strategy {
            id: "s1".into(),
            seller_id: "A1".into(),
            asin: None,
            intent: StrategyIntent::MaximiseProfit, // advisory; ignored at runtime
            compete_with: CompeteWith::LowestPrice,
            beat_by,
            min_price_rule: PriceRule::JumpToMin,
            max_price_rule: PriceRule::JumpToMax,
            enabled: true,
            conditions: Vec::new(),
        }
    }

    fn selection(price: f64) -> Selection {
        Selection {
            competitor: offer("C1", price, false),
            tier_competitors: HashMap::new(),
        }
    }

    #[test]
    fn sole_offer_selects_only_seller_regardless_of_stored_strategy() {
        let change1 = change(vec![offer("A1", 30.0, true)], None);
        assert_eq!(select_kind(&change1, "A1"), StrategyKind::OnlySeller);
        // Summary count overrides raw offer length.
        let change2 = change(vec![offer("A1", 30.0, true), offer("C1", 25.0, false)], Some(1));
        assert_eq!(select_kind(&change2, "A1"), StrategyKind::OnlySeller);
    }

    #[test]
    fn holding_the_box_selects_maximise_profit() {
        let change = change(vec![offer("A1", 27.99, true), offer("C1", 25.99, false)], None);
        assert_eq!(select_kind(&change, "A1"), StrategyKind::MaximiseProfit);
    }

    #[test]
    fn losing_the_box_selects_chase() {
        let change = change(vec![offer("A1", 30.0, false), offer("C1", 25.99, true)], None);
        assert_eq!(select_kind(&change, "A1"), StrategyKind::ChaseBuyBox);
    }

    #[test]
    fn only_seller_uses_default_price() {
        let candidate = compute(StrategyKind::OnlySeller, &product(), &strategy(-0.01), None)
            .unwrap();
        assert_eq!(candidate.price, 35.0);
        assert!(candidate.competitor_price.is_none());
    }

    #[test]
    fn only_seller_falls_back_to_bounds_midpoint() {
        let mut p = product();
        p.default_price = None;
        let candidate =
            compute(StrategyKind::OnlySeller, &p, &strategy(-0.01), None).unwrap();
        assert_eq!(candidate.price, 35.0); // (20 + 50) / 2
    }

    #[test]
    fn only_seller_without_anchors_skips() {
        let mut p = product();
        p.default_price = None;
        p.max_price = None;
        let err = compute(StrategyKind::OnlySeller, &p, &strategy(-0.01), None).unwrap_err();
        assert_eq!(err, SkipReason::NoPriceAnchor);
    }

    #[test]
    fn chase_applies_signed_beat_by() {
        let undercut = compute(
            StrategyKind::ChaseBuyBox,
            &product(),
            &strategy(-0.01),
            Some(&selection(26.49)),
        )
        .unwrap();
        assert!((undercut.price - 26.48).abs() < 1e-9);
        assert_eq!(undercut.competitor_price, Some(26.49));

        let raise = compute(
            StrategyKind::ChaseBuyBox,
            &product(),
            &strategy(0.50),
            Some(&selection(26.49)),
        )
        .unwrap();
        assert!((raise.price - 26.99).abs() < 1e-9);
    }

    #[test]
    fn chase_uses_landed_price_when_present() {
        let mut competitor = offer("C1", 25.99, true);
        competitor.landed_price = Some(26.49);
        let selection = Selection {
            competitor,
            tier_competitors: HashMap::new(),
        };
        let candidate = compute(
            StrategyKind::ChaseBuyBox,
            &product(),
            &strategy(-0.01),
            Some(&selection),
        )
        .unwrap();
        assert!((candidate.price - 26.48).abs() < 1e-9);
    }

    #[test]
    fn maximise_profit_moves_up_to_competitor() {
        let mut p = product();
        p.listed_price = 27.99;
        let candidate = compute(
            StrategyKind::MaximiseProfit,
            &p,
            &strategy(-0.01),
            Some(&selection(29.99)),
        )
        .unwrap();
        assert_eq!(candidate.price, 29.99);
    }

    #[test]
    fn maximise_profit_refuses_to_move_down() {
        let mut p = product();
        p.listed_price = 27.99;
        let err = compute(
            StrategyKind::MaximiseProfit,
            &p,
            &strategy(-0.01),
            Some(&selection(25.99)),
        )
        .unwrap_err();
        assert_eq!(err, SkipReason::CompetitorNotHigher);
    }

    #[test]
    fn chase_computes_tier_prices_within_tier_bounds() {
        let mut p = product();
        p.is_b2b = true;
        p.business_pricing.insert(
            "5".into(),
            TierPricing {
                min_price: Some(20.0),
                max_price: Some(30.0),
                default_price: None,
            },
        );
        p.business_pricing.insert(
            "10".into(),
            TierPricing {
                min_price: Some(25.0),
                max_price: Some(30.0),
                default_price: None,
            },
        );

        let mut tier5 = offer("C1", 24.0, false);
        tier5.quantity_tier = Some(5);
        let mut tier10 = offer("C2", 21.0, false);
        tier10.quantity_tier = Some(10);

        let selection = Selection {
            competitor: offer("C1", 26.49, false),
            tier_competitors: HashMap::from([
                ("5".to_string(), tier5),
                ("10".to_string(), tier10),
            ]),
        };

        let candidate = compute(
            StrategyKind::ChaseBuyBox,
            &p,
            &strategy(-0.01),
            Some(&selection),
        )
        .unwrap();

        // Tier 5: 23.99 within [20, 30]. Tier 10: 20.99 below min 25 → dropped.
        assert_eq!(candidate.tier_prices.len(), 1);
        assert!((candidate.tier_prices["5"] - 23.99).abs() < 1e-9);
    }
}
