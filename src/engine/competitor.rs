//! Competitor selection: one offer per event, chosen by the strategy's
//! compete-with mode from the precomputed summary.

use std::collections::HashMap;

use crate::error::SkipReason;
use crate::models::{CompeteWith, Offer, OfferChange, Product, Strategy};

/// The competitor the strategy will price against, plus per-tier competitors
/// for B2B listings.
#[derive(Debug, Clone)]
pub struct Selection {
    pub competitor: Offer,
    pub tier_competitors: HashMap<String, Offer>,
}

pub fn select(
    change: &OfferChange,
    product: &Product,
    strategy: &Strategy,
) -> Result<Selection, SkipReason> {
    let slot = match strategy.compete_with {
        CompeteWith::LowestPrice => &change.summary.lowest_price_competitor,
        CompeteWith::LowestFbaPrice => &change.summary.lowest_fba_competitor,
        CompeteWith::MatchBuybox => &change.summary.buybox_winner,
    };

    let competitor = match slot {
        Some(offer) if offer.seller_id != product.seller_id => offer.clone(),
        // The summary slot can name us; fall back to the best other seller.
        Some(_) => next_best(change, product, strategy.compete_with)
            .ok_or(SkipReason::SelfCompetition)?,
        None => {
            return Err(match strategy.compete_with {
                CompeteWith::LowestPrice => SkipReason::NoCompetitor,
                CompeteWith::LowestFbaPrice => SkipReason::NoFbaCompetitor,
                CompeteWith::MatchBuybox => SkipReason::NoBuybox,
            })
        }
    };

    let tier_competitors = if product.is_b2b && !product.business_pricing.is_empty() {
        select_tiers(change, product)
    } else {
        HashMap::new()
    };

    Ok(Selection {
        competitor,
        tier_competitors,
    })
}

fn next_best(change: &OfferChange, product: &Product, mode: CompeteWith) -> Option<Offer> {
    let mut candidates: Vec<&Offer> = change
        .offers
        .iter()
        .filter(|o| o.seller_id != product.seller_id)
        .filter(|o| o.condition == change.item_condition)
        .filter(|o| match mode {
            CompeteWith::LowestFbaPrice => {
                o.fulfillment == crate::models::FulfillmentChannel::Fba
            }
            _ => true,
        })
        .collect();
    candidates.sort_by(|a, b| {
        a.effective_price()
            .partial_cmp(&b.effective_price())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.first().map(|o| (*o).clone())
}

/// Per-tier competitor: cheapest other-seller offer tagged with the same
/// quantity tier as a configured business-pricing tier.
fn select_tiers(change: &OfferChange, product: &Product) -> HashMap<String, Offer> {
    let mut tiers = HashMap::new();
    for tier_key in product.business_pricing.keys() {
        let Ok(tier) = tier_key.parse::<u32>() else {
            continue;
        };
        let best = change
            .offers
            .iter()
            .filter(|o| o.quantity_tier == Some(tier))
            .filter(|o| o.seller_id != product.seller_id)
            .filter(|o| o.condition == change.item_condition)
            .min_by(|a, b| {
                a.effective_price()
                    .partial_cmp(&b.effective_price())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        if let Some(offer) = best {
            tiers.insert(tier_key.clone(), offer.clone());
        }
    }
    tiers
}
