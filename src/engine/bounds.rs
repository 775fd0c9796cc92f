//! Bound rules and the hard bounds check.
//!
//! A candidate that crosses a configured bound is rewritten by the
//! per-strategy rule for that bound; the result must still land inside the
//! hard bounds or the event is skipped with the full violation context.

use crate::error::SkipReason;
use crate::models::{PriceRule, Product, Strategy};

/// Round half-up to two decimal places.
pub fn round_half_up(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// Prices within one cent count as unchanged and are not persisted.
pub fn is_unchanged(new_price: f64, old_price: f64) -> bool {
    let new_cents = (new_price * 100.0).round() as i64;
    let old_cents = (old_price * 100.0).round() as i64;
    (new_cents - old_cents).abs() <= 1
}

/// Apply min/max rules, then the hard bounds check, then rounding.
pub fn apply(
    candidate: f64,
    competitor_price: Option<f64>,
    product: &Product,
    strategy: &Strategy,
) -> Result<f64, SkipReason> {
    let mut price = candidate;

    if let Some(min) = product.min_price {
        if price < min {
            price = resolve_rule(strategy.min_price_rule, product, competitor_price, price, min)?;
        }
    }
    if let Some(max) = product.max_price {
        if price > max {
            price = resolve_rule(strategy.max_price_rule, product, competitor_price, price, max)?;
        }
    }

    let price = round_half_up(price);

    // Hard bounds: each side checked only when configured.
    let below_min = product.min_price.map(|min| price < min).unwrap_or(false);
    let above_max = product.max_price.map(|max| price > max).unwrap_or(false);
    if below_min || above_max {
        return Err(SkipReason::PriceBounds {
            candidate: price,
            min: product.min_price,
            max: product.max_price,
        });
    }

    Ok(price)
}

fn resolve_rule(
    rule: PriceRule,
    product: &Product,
    competitor_price: Option<f64>,
    candidate: f64,
    violated_bound: f64,
) -> Result<f64, SkipReason> {
    match rule {
        PriceRule::JumpToMin => Ok(product.min_price.unwrap_or(violated_bound)),
        PriceRule::JumpToMax => Ok(product.max_price.unwrap_or(violated_bound)),
        PriceRule::MatchCompetitor => competitor_price.ok_or(SkipReason::NoCompetitor),
        PriceRule::DefaultPrice => product
            .default_price
            .filter(|p| *p > 0.0)
            .ok_or(SkipReason::DefaultPriceUnset),
        // Leave the candidate untouched; the hard bounds check below turns
        // the still-violating price into a skip with full context.
        PriceRule::DoNothing => Ok(candidate),
    }
}
