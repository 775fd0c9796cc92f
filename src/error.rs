//! Pipeline error taxonomy and the per-event outcome sum type.
//!
//! Skips are not errors: every stage returns `Result<_, RepriceError>` where
//! the Ok side may carry `Outcome::Skipped`. Only Ingress decides what an
//! error means for the message (ack / redeliver / DLQ).

use thiserror::Error;

use crate::models::CalculatedPrice;

/// Why an event was intentionally not repriced.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Seller is inside its configured reset window.
    ResetWindow,
    /// No (asin, seller, sku) mapping in the catalog.
    ProductNotFound,
    /// Pause flag set for (seller, asin).
    Paused,
    /// Quantity <= 0.
    OutOfStock,
    /// Listing status is not Active; carries the reported status.
    Inactive(String),
    /// Seller turned the repricer off for this listing.
    RepricerDisabled,
    /// Product references a strategy the store does not know.
    StrategyNotFound,
    /// Strategy exists but is disabled.
    StrategyDisabled,
    /// Strategy's condition filter excludes this product.
    StrategyNotApplicable,
    /// The competitor slot for the strategy names our own seller.
    SelfCompetition,
    /// No competitor offer exists for the compete-with mode.
    NoCompetitor,
    /// No FBA offer exists for the product condition.
    NoFbaCompetitor,
    /// Buy box is suppressed; MATCH_BUYBOX has nothing to match.
    NoBuybox,
    /// MaximiseProfit: competitor is at or below our listed price.
    CompetitorNotHigher,
    /// OnlySeller: neither default price nor both bounds configured.
    NoPriceAnchor,
    /// DEFAULT_PRICE rule fired but the default is missing or non-positive.
    DefaultPriceUnset,
    /// Final price escaped the hard bounds.
    PriceBounds {
        candidate: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl SkipReason {
    /// Stable reason string used in logs, metrics and decision records.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ResetWindow => "reset-window",
            SkipReason::ProductNotFound => "product-not-found",
            SkipReason::Paused => "paused",
            SkipReason::OutOfStock => "out-of-stock",
            SkipReason::Inactive(_) => "inactive",
            SkipReason::RepricerDisabled => "repricer-disabled",
            SkipReason::StrategyNotFound => "strategy-not-found",
            SkipReason::StrategyDisabled => "strategy-disabled",
            SkipReason::StrategyNotApplicable => "strategy-not-applicable",
            SkipReason::SelfCompetition => "self-competition",
            SkipReason::NoCompetitor => "no-competitor",
            SkipReason::NoFbaCompetitor => "no-fba-competitor",
            SkipReason::NoBuybox => "no-buybox",
            SkipReason::CompetitorNotHigher => "competitor not higher",
            SkipReason::NoPriceAnchor => "no-price-anchor",
            SkipReason::DefaultPriceUnset => "default-price-unset",
            SkipReason::PriceBounds { .. } => "price-bounds",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Inactive(status) => write!(f, "inactive ({status})"),
            SkipReason::PriceBounds { candidate, min, max } => {
                write!(
                    f,
                    "price {candidate} outside bounds [{}, {}]",
                    min.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                    max.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                )
            }
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of running one offer-change event through the pipeline.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A new price was calculated and persisted.
    Priced(CalculatedPrice),
    /// Calculation landed within a cent of the listed price; nothing written.
    Unchanged { price: f64 },
    /// An eligibility or strategy rule stopped the event.
    Skipped(SkipReason),
}

impl Outcome {
    pub fn is_priced(&self) -> bool {
        matches!(self, Outcome::Priced(_))
    }
}

/// Failures that abort an event. The variant decides the message's fate at
/// the ingress boundary.
#[derive(Debug, Error)]
pub enum RepriceError {
    /// Payload cannot be parsed or required fields are missing. DLQ, no retry.
    #[error("malformed payload: {0}")]
    Malformed(String),
    /// Store/queue/network hiccup. Redelivered up to max_retries, then DLQ.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Invariant violation. Alert and DLQ.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl RepriceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RepriceError::Transient(_))
    }
}
