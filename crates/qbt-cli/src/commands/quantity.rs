//! `qbt quantity normalize`.

use anyhow::Result;
use qbt_config::StorefrontSettings;
use qbt_reconcile::price_to_micros;

use super::load_config;

pub struct Normalized {
    pub step: u64,
    pub quantity: u64,
}

/// Apply the configured step policy to one raw quantity.
pub fn normalize(config_paths: &[String], raw_qty: &str, price: f64) -> Result<Normalized> {
    let loaded = load_config(config_paths)?;
    let settings = StorefrontSettings::from_config_json(&loaded.config_json)?;
    let micros = price_to_micros(price)?;
    Ok(Normalized {
        step: settings.step_policy.step_for_price(micros),
        quantity: settings.step_policy.normalize(raw_qty, micros),
    })
}
