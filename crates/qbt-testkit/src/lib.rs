//! qbt-testkit
//!
//! Fixtures shared by the cross-crate scenario tests under `tests/`:
//!
//! - [`TestShop`]: a seeded in-memory shop and reconcilers wired to it
//! - [`Shopper`]: one browser tab that renders the form, edits it and posts it
//! - [`FlakyCart`]: a live cart that goes away after N mutations
//!
//! No network I/O, no randomness; every scenario is deterministic.

use std::fs;

use anyhow::{Context, Result};
use qbt_store_memory::StoreSeed;

mod flaky_cart;
mod shop;
mod shopper;

pub use flaky_cart::FlakyCart;
pub use shop::{sample_products, session, ShopReconciler, TestShop, TEST_SECRET};
pub use shopper::{form_pairs, Shopper};

/// Parse a seed document from a JSON string, for scenarios that describe
/// their starting shop inline.
pub fn seed_from_json(raw: &str) -> Result<StoreSeed> {
    serde_json::from_str(raw).context("parse seed json")
}

/// Write `seed` to `path` in the format `qbt_store_memory::load_seed_json`
/// reads back.
pub fn write_seed_json(path: &str, seed: &serde_json::Value) -> Result<()> {
    let body = serde_json::to_string_pretty(seed)?;
    fs::write(path, body).with_context(|| format!("write seed: {path}"))
}
