//! Quantity normalization and the price-derived step policy.
//!
//! # Invariants
//!
//! - Untrusted input never fails: anything that is not a positive number
//!   normalizes to 0.
//! - 0 always stays 0, whatever the step ("remove" is never turned into
//!   "buy one batch").
//! - With step > 1 a positive quantity rounds **up** to a multiple of the
//!   step, with a floor of one full step.
//! - The step is derived from the product's display price on every call;
//!   nothing is cached from render time.
//!
//! Prices are carried as `i64` integer micros (1 unit = 1_000_000 micros).
//! `f64` only appears at the config / seed-data boundary.

use serde::{Deserialize, Serialize};

use crate::Quantity;

/// Scale factor: 1 price unit = 1_000_000 micros (6 decimal places).
pub const MICROS_PER_UNIT: i64 = 1_000_000;

// ---------------------------------------------------------------------------
// Raw quantity parsing
// ---------------------------------------------------------------------------

/// Parse an untrusted quantity from a form field.
///
/// Integers pass through (negatives become 0). A decimal is truncated toward
/// zero, so `"6.0"` reads as 6 and `"0.9"` as 0. Anything else reads as 0.
pub fn parse_raw_quantity(raw: &str) -> Quantity {
    let t = raw.trim();
    if t.is_empty() {
        return 0;
    }
    if let Ok(n) = t.parse::<i64>() {
        return n.max(0) as Quantity;
    }
    if let Ok(n) = t.parse::<u64>() {
        return n;
    }
    match t.parse::<f64>() {
        // `as` saturates at u64::MAX for absurdly large inputs.
        Ok(f) if f.is_finite() && f > 0.0 => f.trunc() as Quantity,
        _ => 0,
    }
}

/// Map a parsed quantity onto the product's step.
///
/// `normalized = max(step, ceil(quantity / step) * step)` for quantity > 0
/// and step > 1; otherwise the quantity is returned unchanged.
pub fn normalize_quantity(quantity: Quantity, step: u64) -> Quantity {
    if quantity == 0 || step <= 1 {
        return quantity;
    }
    quantity.div_ceil(step).saturating_mul(step).max(step)
}

// ---------------------------------------------------------------------------
// Step policy
// ---------------------------------------------------------------------------

/// Price-derived ordering step.
///
/// Products displayed below `price_threshold_micros` are sold in batches of
/// `batch_size`; everything at or above the threshold has step 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPolicy {
    pub price_threshold_micros: i64,
    pub batch_size: u64,
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            price_threshold_micros: 20 * MICROS_PER_UNIT,
            batch_size: 6,
        }
    }
}

impl StepPolicy {
    pub fn new(price_threshold_micros: i64, batch_size: u64) -> Self {
        Self {
            price_threshold_micros,
            batch_size,
        }
    }

    /// Step for a product currently displayed at `display_price_micros`.
    pub fn step_for_price(&self, display_price_micros: i64) -> u64 {
        if display_price_micros < self.price_threshold_micros {
            self.batch_size.max(1)
        } else {
            1
        }
    }

    /// Parse `raw` and normalize it against the step for `display_price_micros`.
    pub fn normalize(&self, raw: &str, display_price_micros: i64) -> Quantity {
        normalize_quantity(
            parse_raw_quantity(raw),
            self.step_for_price(display_price_micros),
        )
    }
}

// ---------------------------------------------------------------------------
// Price conversion (boundary only)
// ---------------------------------------------------------------------------

/// Errors returned by [`price_to_micros`] when the input is not representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Input was `NaN` or infinite.
    NotFinite,
    /// Input would overflow `i64` after scaling by [`MICROS_PER_UNIT`].
    OutOfRange,
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingError::NotFinite => {
                write!(f, "price_to_micros: non-finite input (NaN or Inf)")
            }
            PricingError::OutOfRange => {
                write!(f, "price_to_micros: price out of i64 range after scaling")
            }
        }
    }
}

impl std::error::Error for PricingError {}

/// Convert integer micros to a display `f64`.
pub fn micros_to_price(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_UNIT as f64
}

/// Convert a decimal price from config or seed data into integer micros,
/// rounding to the nearest micro.
pub fn price_to_micros(price: f64) -> Result<i64, PricingError> {
    if !price.is_finite() {
        return Err(PricingError::NotFinite);
    }
    let scaled = price * MICROS_PER_UNIT as f64;
    // Rust casts saturate; out-of-range must be rejected instead.
    if scaled > i64::MAX as f64 || scaled < i64::MIN as f64 {
        return Err(PricingError::OutOfRange);
    }
    Ok(scaled.round() as i64)
}
