//! Payload normalization: marketplace-specific notifications in, uniform
//! `OfferChange` out.
//!
//! Amazon notifications arrive with mixed field casing (PascalCase from the
//! marketplace, camelCase from internal producers). The wire structs below
//! are the single alias layer that absorbs the difference; nothing past this
//! module ever sees a raw payload.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::error::RepriceError;
use crate::models::{
    FulfillmentChannel, ItemCondition, Marketplace, Offer, OfferChange, OfferSummary, Platform,
};

// ============================================================================
// Amazon wire structs (PascalCase with camelCase aliases at every level)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueueEnvelope {
    #[serde(default, rename = "Type", alias = "type")]
    kind: Option<String>,
    /// SNS envelopes wrap the notification as a JSON string.
    #[serde(default, alias = "message")]
    message: Option<String>,
    #[serde(default, alias = "notificationType")]
    notification_type: Option<String>,
    #[serde(default, alias = "payload")]
    payload: Option<NotificationPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NotificationBody {
    #[serde(default, alias = "notificationType")]
    notification_type: Option<String>,
    #[serde(default, alias = "payload")]
    payload: Option<NotificationPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NotificationPayload {
    #[serde(default, alias = "anyOfferChangedNotification")]
    any_offer_changed_notification: Option<AnyOfferChanged>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AnyOfferChanged {
    #[serde(default, rename = "ASIN", alias = "Asin", alias = "asin")]
    asin: Option<String>,
    #[serde(default, alias = "marketplaceId")]
    marketplace_id: Option<String>,
    #[serde(default, alias = "sellerId")]
    seller_id: Option<String>,
    #[serde(default, alias = "itemCondition")]
    item_condition: Option<String>,
    #[serde(default, alias = "timeOfOfferChange")]
    time_of_offer_change: Option<String>,
    #[serde(default, alias = "summary")]
    summary: Option<AmazonSummary>,
    #[serde(default, alias = "offers")]
    offers: Vec<AmazonOffer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmazonSummary {
    #[serde(default, alias = "totalOfferCount")]
    total_offer_count: Option<usize>,
    #[serde(default, alias = "lowestPrices")]
    lowest_prices: Vec<SummaryPrice>,
    #[serde(default, alias = "buyBoxPrices")]
    buy_box_prices: Vec<SummaryPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SummaryPrice {
    #[serde(default, alias = "condition")]
    condition: Option<String>,
    #[serde(default, alias = "fulfillmentChannel")]
    fulfillment_channel: Option<String>,
    #[serde(default, alias = "listingPrice")]
    listing_price: Option<Money>,
    #[serde(default, alias = "landedPrice")]
    landed_price: Option<Money>,
    #[serde(default, alias = "shipping")]
    shipping: Option<Money>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmazonOffer {
    #[serde(default, alias = "sellerId")]
    seller_id: Option<String>,
    #[serde(default, alias = "subCondition", alias = "Condition", alias = "condition")]
    sub_condition: Option<String>,
    #[serde(default, alias = "listingPrice")]
    listing_price: Option<Money>,
    #[serde(default, alias = "landedPrice")]
    landed_price: Option<Money>,
    #[serde(default, alias = "shipping")]
    shipping: Option<Money>,
    #[serde(default, alias = "isFulfilledByAmazon")]
    is_fulfilled_by_amazon: Option<bool>,
    #[serde(default, alias = "fulfillmentChannel")]
    fulfillment_channel: Option<String>,
    #[serde(default, alias = "isBuyBoxWinner")]
    is_buy_box_winner: Option<bool>,
    #[serde(
        default,
        alias = "IsPrime",
        alias = "isPrime",
        alias = "PrimeInformation",
        alias = "primeInformation"
    )]
    prime: Option<serde_json::Value>,
    #[serde(default, alias = "quantityTier")]
    quantity_tier: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Money {
    #[serde(default, alias = "amount")]
    amount: Option<f64>,
}

impl AmazonOffer {
    fn fulfillment(&self) -> FulfillmentChannel {
        if self.is_fulfilled_by_amazon == Some(true) {
            return FulfillmentChannel::Fba;
        }
        self.fulfillment_channel
            .as_deref()
            .map(FulfillmentChannel::parse)
            .unwrap_or_default()
    }

    fn is_prime(&self) -> bool {
        match &self.prime {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::Object(map)) => map
                .get("IsPrime")
                .or_else(|| map.get("isPrime"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            _ => false,
        }
    }
}

// ============================================================================
// Walmart wire structs (flat camelCase webhook)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalmartWebhook {
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub marketplace: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub current_buybox_price: Option<f64>,
    #[serde(default)]
    pub current_buybox_winner: Option<String>,
    #[serde(default)]
    pub offers: Vec<WalmartOffer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalmartOffer {
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub shipping: Option<f64>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub fulfillment_lag_time: Option<u32>,
}

// ============================================================================
// Entry points
// ============================================================================

/// Parse a queue message body (direct payload or SNS envelope) into an
/// `OfferChange`.
pub fn parse_amazon_message(body: &str) -> Result<OfferChange, RepriceError> {
    let envelope: QueueEnvelope = serde_json::from_str(body)
        .map_err(|e| RepriceError::Malformed(format!("queue body is not JSON: {e}")))?;

    let notification: NotificationBody = if envelope.kind.as_deref() == Some("Notification") {
        let wrapped = envelope
            .message
            .ok_or_else(|| RepriceError::Malformed("SNS envelope without Message".into()))?;
        serde_json::from_str(&wrapped)
            .map_err(|e| RepriceError::Malformed(format!("SNS Message is not JSON: {e}")))?
    } else {
        NotificationBody {
            notification_type: envelope.notification_type,
            payload: envelope.payload,
        }
    };

    let _ = notification.notification_type; // informational only
    let change = notification
        .payload
        .and_then(|p| p.any_offer_changed_notification)
        .ok_or_else(|| {
            RepriceError::Malformed("missing Payload.AnyOfferChangedNotification".into())
        })?;

    let asin = require(change.asin, "ASIN")?;
    let seller_id = require(change.seller_id, "SellerId")?;
    let marketplace = Marketplace::from_amazon_id(
        change.marketplace_id.as_deref().unwrap_or_default(),
    );
    let item_condition = change
        .item_condition
        .as_deref()
        .map(ItemCondition::parse)
        .unwrap_or_default();
    let event_time = parse_timestamp(change.time_of_offer_change.as_deref());

    let mut offers: Vec<Offer> = change
        .offers
        .iter()
        .filter_map(|o| {
            let price = o.listing_price.as_ref().and_then(|m| m.amount)?;
            Some(Offer {
                seller_id: o.seller_id.clone().unwrap_or_default(),
                price,
                landed_price: o.landed_price.as_ref().and_then(|m| m.amount),
                shipping: o.shipping.as_ref().and_then(|m| m.amount).unwrap_or(0.0),
                condition: o
                    .sub_condition
                    .as_deref()
                    .map(ItemCondition::parse)
                    .unwrap_or(item_condition),
                fulfillment: o.fulfillment(),
                is_buybox_winner: o.is_buy_box_winner.unwrap_or(false),
                is_prime: o.is_prime(),
                quantity_tier: o.quantity_tier,
            })
        })
        .collect();

    let summary_block = change.summary.unwrap_or_default();

    // Some notifications carry only summary price points. Treat them as
    // anonymous offers so the pipeline still has something to compare.
    if offers.is_empty() {
        offers.extend(summary_prices_as_offers(
            &summary_block.lowest_prices,
            item_condition,
            false,
        ));
        offers.extend(summary_prices_as_offers(
            &summary_block.buy_box_prices,
            item_condition,
            true,
        ));
    }

    let summary = derive_summary(
        &offers,
        item_condition,
        summary_block.total_offer_count,
        None,
    );

    Ok(OfferChange {
        product_id: asin,
        seller_id,
        marketplace,
        platform: Platform::Amazon,
        event_time,
        item_condition,
        offers,
        summary,
    })
}

/// Normalize a Walmart buybox-changed webhook. Our own offers are excluded
/// from the derived summary; the remaining best competitor drives pricing.
pub fn parse_walmart_payload(payload: &WalmartWebhook) -> Result<OfferChange, RepriceError> {
    let item_id = require(payload.item_id.clone(), "itemId")?;
    let seller_id = require(payload.seller_id.clone(), "sellerId")?;
    let marketplace = payload
        .marketplace
        .as_deref()
        .map(Marketplace::parse)
        .unwrap_or(Marketplace::US);
    let event_time = parse_timestamp(payload.event_time.as_deref());
    // Walmart listings are effectively always new.
    let item_condition = ItemCondition::New;

    let buybox_winner_id = payload.current_buybox_winner.as_deref().unwrap_or_default();
    let offers: Vec<Offer> = payload
        .offers
        .iter()
        .filter_map(|o| {
            let offer_seller = o.seller_id.clone()?;
            let price = o.price?;
            Some(Offer {
                is_buybox_winner: offer_seller == buybox_winner_id,
                seller_id: offer_seller,
                price,
                landed_price: None,
                shipping: o.shipping.unwrap_or(0.0),
                condition: o
                    .condition
                    .as_deref()
                    .map(ItemCondition::parse)
                    .unwrap_or(item_condition),
                fulfillment: FulfillmentChannel::Fbm,
                is_prime: false,
                quantity_tier: None,
            })
        })
        .collect();

    let summary = derive_summary(&offers, item_condition, None, Some(&seller_id));

    Ok(OfferChange {
        product_id: item_id,
        seller_id,
        marketplace,
        platform: Platform::Walmart,
        event_time,
        item_condition,
        offers,
        summary,
    })
}

fn require(value: Option<String>, field: &str) -> Result<String, RepriceError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RepriceError::Malformed(format!("{field} is required"))),
    }
}

fn summary_prices_as_offers(
    prices: &[SummaryPrice],
    fallback_condition: ItemCondition,
    buybox: bool,
) -> Vec<Offer> {
    prices
        .iter()
        .filter_map(|p| {
            let price = p.listing_price.as_ref().and_then(|m| m.amount)?;
            Some(Offer {
                seller_id: String::new(),
                price,
                landed_price: p.landed_price.as_ref().and_then(|m| m.amount),
                shipping: p.shipping.as_ref().and_then(|m| m.amount).unwrap_or(0.0),
                condition: p
                    .condition
                    .as_deref()
                    .map(ItemCondition::parse)
                    .unwrap_or(fallback_condition),
                fulfillment: p
                    .fulfillment_channel
                    .as_deref()
                    .map(FulfillmentChannel::parse)
                    .unwrap_or_default(),
                is_buybox_winner: buybox,
                is_prime: false,
                quantity_tier: None,
            })
        })
        .collect()
}

/// Compute the competitor slots from the raw offer list.
///
/// `exclude_seller` removes that seller's offers from the candidate set
/// before picking (Walmart path). When None, self-offers stay in and the
/// eligibility gate handles self-competition.
pub fn derive_summary(
    offers: &[Offer],
    item_condition: ItemCondition,
    total_override: Option<usize>,
    exclude_seller: Option<&str>,
) -> OfferSummary {
    let candidates: Vec<&Offer> = offers
        .iter()
        .filter(|o| match exclude_seller {
            Some(seller) => o.seller_id != seller,
            None => true,
        })
        .collect();

    let matching = |o: &&&Offer| o.condition == item_condition;

    let lowest_price_competitor = candidates
        .iter()
        .filter(matching)
        .min_by(|a, b| {
            a.effective_price()
                .partial_cmp(&b.effective_price())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|o| (*o).clone());

    let lowest_fba_competitor = candidates
        .iter()
        .filter(matching)
        .filter(|o| o.fulfillment == FulfillmentChannel::Fba)
        .min_by(|a, b| {
            a.effective_price()
                .partial_cmp(&b.effective_price())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|o| (*o).clone());

    let buybox_winner = candidates
        .iter()
        .find(|o| o.is_buybox_winner)
        .map(|o| (*o).clone());

    OfferSummary {
        total_offers: total_override.unwrap_or(offers.len()),
        lowest_price_competitor,
        lowest_fba_competitor,
        buybox_winner,
    }
}

/// Tolerant ISO-8601 parsing: trailing `Z`, explicit offsets, or no zone
/// (assumed UTC). Unparsable input substitutes the current time and warns.
pub fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Utc::now();
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return naive.and_utc();
        }
    }

    warn!(timestamp = raw, "failed to parse event timestamp, using now");
    Utc::now()
}
