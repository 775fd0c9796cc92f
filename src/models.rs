//! Core data model shared across the repricing pipeline.
//!
//! Products, strategies and reset rules are owned by the store; the engine
//! only holds `OfferChange` and `CalculatedPrice` values for the duration of
//! a single event.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Source platform of an offer-change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Amazon,
    Walmart,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Amazon => "AMAZON",
            Platform::Walmart => "WALMART",
        }
    }
}

/// Marketplace a listing lives in. Unknown Amazon marketplace ids fall back
/// to US.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marketplace {
    US,
    UK,
    CA,
    AU,
    DE,
    FR,
    IT,
    ES,
    NL,
    PL,
    IN,
    BR,
    MX,
    SA,
    EG,
    TR,
    SG,
    AE,
}

impl Marketplace {
    /// Map an Amazon marketplace id (e.g. `ATVPDKIKX0DER`) to a marketplace.
    /// The mapping is total: unknown ids default to US.
    pub fn from_amazon_id(id: &str) -> Self {
        match id {
            "ATVPDKIKX0DER" => Marketplace::US,
            "A1F83G8C2ARO7P" => Marketplace::UK,
            "A2EUQ1WTGCTBG2" => Marketplace::CA,
            "A39IBJ37TRP1C6" => Marketplace::AU,
            "A1PA6795UKMFR9" => Marketplace::DE,
            "A13V1IB3VIYZZH" => Marketplace::FR,
            "APJ6JRA9NG5V4" => Marketplace::IT,
            "A1RKKUPIHCS9HS" => Marketplace::ES,
            "A1805IZSGTT6HS" => Marketplace::NL,
            "A1C3SOZRARQ6R3" => Marketplace::PL,
            "A21TJRUUN4KGV" => Marketplace::IN,
            "A2Q3Y263D00KWC" => Marketplace::BR,
            "A1AM78C64UM0Y8" => Marketplace::MX,
            "A17E79C6D8DWNP" => Marketplace::SA,
            "ARBP9OOSHTCHU" => Marketplace::EG,
            "A33AVAJ2PDY3EV" => Marketplace::TR,
            "A19VAU5U5O7RUS" => Marketplace::SG,
            "A2VIGQ35RCS4UG" => Marketplace::AE,
            _ => Marketplace::US,
        }
    }

    pub fn parse(code: &str) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "UK" | "GB" => Marketplace::UK,
            "CA" => Marketplace::CA,
            "AU" => Marketplace::AU,
            "DE" => Marketplace::DE,
            "FR" => Marketplace::FR,
            "IT" => Marketplace::IT,
            "ES" => Marketplace::ES,
            "NL" => Marketplace::NL,
            "PL" => Marketplace::PL,
            "IN" => Marketplace::IN,
            "BR" => Marketplace::BR,
            "MX" => Marketplace::MX,
            "SA" => Marketplace::SA,
            "EG" => Marketplace::EG,
            "TR" => Marketplace::TR,
            "SG" => Marketplace::SG,
            "AE" => Marketplace::AE,
            _ => Marketplace::US,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Marketplace::US => "US",
            Marketplace::UK => "UK",
            Marketplace::CA => "CA",
            Marketplace::AU => "AU",
            Marketplace::DE => "DE",
            Marketplace::FR => "FR",
            Marketplace::IT => "IT",
            Marketplace::ES => "ES",
            Marketplace::NL => "NL",
            Marketplace::PL => "PL",
            Marketplace::IN => "IN",
            Marketplace::BR => "BR",
            Marketplace::MX => "MX",
            Marketplace::SA => "SA",
            Marketplace::EG => "EG",
            Marketplace::TR => "TR",
            Marketplace::SG => "SG",
            Marketplace::AE => "AE",
        }
    }

    /// Fixed UTC offset used for seller-local wall-clock checks (reset
    /// windows). Marketplaces without a mapping run on UTC; callers log the
    /// fallback.
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        let hours = match self {
            Marketplace::US | Marketplace::CA => -5,
            Marketplace::MX => -6,
            Marketplace::BR => -3,
            Marketplace::UK => 0,
            Marketplace::DE
            | Marketplace::FR
            | Marketplace::IT
            | Marketplace::ES
            | Marketplace::NL
            | Marketplace::PL => 1,
            Marketplace::EG => 2,
            Marketplace::SA | Marketplace::TR => 3,
            Marketplace::AE => 4,
            Marketplace::IN => return FixedOffset::east_opt(5 * 3600 + 1800),
            Marketplace::SG => 8,
            Marketplace::AU => 10,
        };
        FixedOffset::east_opt(hours * 3600)
    }
}

/// Listing condition. Parsing is case-insensitive; unknown values map to New
/// so a sloppy feed never blocks the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemCondition {
    #[default]
    New,
    Used,
    Collectible,
    Refurbished,
}

impl ItemCondition {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "USED" => ItemCondition::Used,
            "COLLECTIBLE" => ItemCondition::Collectible,
            "REFURBISHED" => ItemCondition::Refurbished,
            _ => ItemCondition::New,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCondition::New => "NEW",
            ItemCondition::Used => "USED",
            ItemCondition::Collectible => "COLLECTIBLE",
            ItemCondition::Refurbished => "REFURBISHED",
        }
    }
}

/// How a competing offer is fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentChannel {
    Fba,
    #[default]
    Fbm,
}

impl FulfillmentChannel {
    /// Accepts both the SP-API spelling ("Amazon"/"Merchant") and the short
    /// form ("FBA"/"FBM").
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "FBA" | "AMAZON" => FulfillmentChannel::Fba,
            _ => FulfillmentChannel::Fbm,
        }
    }
}

/// Listing lifecycle status as reported by the listing-sync jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    Incomplete,
    Suppressed,
}

impl ProductStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inactive" => ProductStatus::Inactive,
            "incomplete" => ProductStatus::Incomplete,
            "suppressed" => ProductStatus::Suppressed,
            _ => ProductStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ProductStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "Active",
            ProductStatus::Inactive => "Inactive",
            ProductStatus::Incomplete => "Incomplete",
            ProductStatus::Suppressed => "Suppressed",
        }
    }
}

/// Which competitor slot a strategy competes against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompeteWith {
    LowestPrice,
    LowestFbaPrice,
    MatchBuybox,
}

impl CompeteWith {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompeteWith::LowestPrice => "LOWEST_PRICE",
            CompeteWith::LowestFbaPrice => "LOWEST_FBA_PRICE",
            CompeteWith::MatchBuybox => "MATCH_BUYBOX",
        }
    }
}

/// Action taken when a candidate price crosses a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceRule {
    JumpToMin,
    JumpToMax,
    MatchCompetitor,
    DefaultPrice,
    DoNothing,
}

/// Seller-configured strategy intent. The engine treats this as advisory and
/// selects the concrete strategy per event from the market position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyIntent {
    WinBuybox,
    MaximiseProfit,
    OnlySeller,
}

/// Per-seller repricing strategy, shared by many products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub seller_id: String,
    /// None = applies to all ASINs of the seller unless overridden.
    #[serde(default)]
    pub asin: Option<String>,
    #[serde(rename = "type")]
    pub intent: StrategyIntent,
    pub compete_with: CompeteWith,
    /// Signed offset added to the competitor price; negative undercuts.
    pub beat_by: f64,
    pub min_price_rule: PriceRule,
    pub max_price_rule: PriceRule,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Item conditions the strategy applies to. Empty = all.
    #[serde(default)]
    pub conditions: Vec<ItemCondition>,
}

fn default_true() -> bool {
    true
}

/// Per-quantity-tier bounds for B2B listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierPricing {
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub default_price: Option<f64>,
}

/// A listing owned by a seller, keyed by (asin, seller_id, sku).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub asin: String,
    pub sku: String,
    pub seller_id: String,
    pub marketplace: Marketplace,
    pub listed_price: f64,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub default_price: Option<f64>,
    #[serde(default)]
    pub item_condition: ItemCondition,
    pub quantity: i64,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default = "default_true")]
    pub repricer_enabled: bool,
    pub strategy_id: String,
    #[serde(default)]
    pub is_b2b: bool,
    /// quantity tier (as string key) → tier bounds.
    #[serde(default)]
    pub business_pricing: HashMap<String, TierPricing>,
    #[serde(default)]
    pub inventory_age_days: Option<i64>,
}

/// A single competing offer, normalized from either platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub seller_id: String,
    pub price: f64,
    #[serde(default)]
    pub landed_price: Option<f64>,
    #[serde(default)]
    pub shipping: f64,
    #[serde(default)]
    pub condition: ItemCondition,
    #[serde(default)]
    pub fulfillment: FulfillmentChannel,
    #[serde(default)]
    pub is_buybox_winner: bool,
    #[serde(default)]
    pub is_prime: bool,
    #[serde(default)]
    pub quantity_tier: Option<u32>,
}

impl Offer {
    /// Landed price when present, else listing price. All downstream
    /// comparisons use this.
    pub fn effective_price(&self) -> f64 {
        self.landed_price.unwrap_or(self.price)
    }
}

/// Best-of slots derived from the raw offer list. Slots may still name our
/// own seller; self-filtering happens downstream in the eligibility gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferSummary {
    pub total_offers: usize,
    #[serde(default)]
    pub lowest_price_competitor: Option<Offer>,
    #[serde(default)]
    pub lowest_fba_competitor: Option<Offer>,
    #[serde(default)]
    pub buybox_winner: Option<Offer>,
}

/// Uniform offer-change record produced by normalization; the pipeline's
/// working unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferChange {
    /// ASIN for Amazon, item id for Walmart.
    pub product_id: String,
    pub seller_id: String,
    pub marketplace: Marketplace,
    pub platform: Platform,
    pub event_time: DateTime<Utc>,
    pub item_condition: ItemCondition,
    pub offers: Vec<Offer>,
    pub summary: OfferSummary,
}

/// Output artifact of a repricing run, consumed by the external publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedPrice {
    pub asin: String,
    pub sku: String,
    pub seller_id: String,
    pub old_price: f64,
    pub new_price: f64,
    pub strategy_used: String,
    pub strategy_id: String,
    #[serde(default)]
    pub competitor_price: Option<f64>,
    pub calculated_at: DateTime<Utc>,
    #[serde(default)]
    pub processing_time_ms: f64,
    /// B2B quantity-tier prices, when computed.
    #[serde(default)]
    pub tier_prices: Option<HashMap<String, f64>>,
}

/// Daily reset/resume window for one seller, wall-clock in the seller's
/// marketplace zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRuleSet {
    pub seller_id: String,
    pub marketplace: Marketplace,
    pub reset_time: NaiveTime,
    pub resume_time: NaiveTime,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Only products in this condition are reset. None = all.
    #[serde(default)]
    pub product_condition: Option<ItemCondition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marketplace_mapping_is_total() {
        assert_eq!(Marketplace::from_amazon_id("ATVPDKIKX0DER"), Marketplace::US);
        assert_eq!(Marketplace::from_amazon_id("A1F83G8C2ARO7P"), Marketplace::UK);
        assert_eq!(Marketplace::from_amazon_id("A2EUQ1WTGCTBG2"), Marketplace::CA);
        assert_eq!(Marketplace::from_amazon_id("A39IBJ37TRP1C6"), Marketplace::AU);
        // Unknown ids never fail; they default to US.
        assert_eq!(Marketplace::from_amazon_id("NOT_A_MARKETPLACE"), Marketplace::US);
        assert_eq!(Marketplace::from_amazon_id(""), Marketplace::US);
    }

    #[test]
    fn condition_parse_is_case_insensitive() {
        assert_eq!(ItemCondition::parse("new"), ItemCondition::New);
        assert_eq!(ItemCondition::parse("USED"), ItemCondition::Used);
        assert_eq!(ItemCondition::parse("Refurbished"), ItemCondition::Refurbished);
        assert_eq!(ItemCondition::parse("collectible"), ItemCondition::Collectible);
        assert_eq!(ItemCondition::parse("open-box"), ItemCondition::New);
    }

    #[test]
    fn effective_price_prefers_landed() {
        let mut offer = Offer {
            seller_id: "C1".into(),
            price: 25.99,
            landed_price: Some(26.49),
            shipping: 0.50,
            condition: ItemCondition::New,
            fulfillment: FulfillmentChannel::Fba,
            is_buybox_winner: false,
            is_prime: false,
            quantity_tier: None,
        };
        assert_eq!(offer.effective_price(), 26.49);
        offer.landed_price = None;
        assert_eq!(offer.effective_price(), 25.99);
    }

    #[test]
    fn fulfillment_accepts_both_spellings() {
        assert_eq!(FulfillmentChannel::parse("Amazon"), FulfillmentChannel::Fba);
        assert_eq!(FulfillmentChannel::parse("FBA"), FulfillmentChannel::Fba);
        assert_eq!(FulfillmentChannel::parse("Merchant"), FulfillmentChannel::Fbm);
        assert_eq!(FulfillmentChannel::parse("FBM"), FulfillmentChannel::Fbm);
    }

    #[test]
    fn status_active_check() {
        assert!(ProductStatus::parse("active").is_active());
        assert!(ProductStatus::parse("ACTIVE").is_active());
        assert!(!ProductStatus::parse("Inactive").is_active());
        assert!(!ProductStatus::parse("Suppressed").is_active());
    }
}
