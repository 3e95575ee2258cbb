//! Typed storefront settings read from the merged config JSON.

use anyhow::{bail, Context, Result};
use qbt_reconcile::{price_to_micros, StepPolicy};
use serde::Serialize;
use serde_json::Value;

use crate::keys::{ConfigKey, BATCH_SIZE, CHECKOUT_URL, FORM_URL, STEP_PRICE_THRESHOLD};

pub const DEFAULT_CHECKOUT_URL: &str = "/checkout";
pub const DEFAULT_FORM_URL: &str = "/quick-order";
pub const DEFAULT_STEP_PRICE_THRESHOLD: f64 = 20.0;
pub const DEFAULT_BATCH_SIZE: u64 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorefrontSettings {
    /// Redirect target after an applied submission.
    pub checkout_url: String,
    /// Redirect target after a rejected submission.
    pub form_url: String,
    pub step_policy: StepPolicy,
}

impl Default for StorefrontSettings {
    fn default() -> Self {
        Self {
            checkout_url: DEFAULT_CHECKOUT_URL.to_string(),
            form_url: DEFAULT_FORM_URL.to_string(),
            step_policy: StepPolicy::default(),
        }
    }
}

impl StorefrontSettings {
    /// Read `/storefront/*` and `/quantity/*`; absent keys take defaults.
    ///
    /// Redirect targets must be site-relative paths (leading `/`, not `//`).
    pub fn from_config_json(config: &Value) -> Result<Self> {
        let checkout_url = read_path(config, CHECKOUT_URL, DEFAULT_CHECKOUT_URL)?;
        let form_url = read_path(config, FORM_URL, DEFAULT_FORM_URL)?;

        let at = STEP_PRICE_THRESHOLD.pointer;
        let threshold = match STEP_PRICE_THRESHOLD.lookup(config) {
            None => DEFAULT_STEP_PRICE_THRESHOLD,
            Some(v) => v
                .as_f64()
                .with_context(|| format!("CONFIG_INVALID {at}: expected a number"))?,
        };
        if threshold < 0.0 {
            bail!("CONFIG_INVALID {at}: must be >= 0");
        }
        let threshold_micros = price_to_micros(threshold)
            .map_err(|e| anyhow::anyhow!("CONFIG_INVALID {at}: {e}"))?;

        let at = BATCH_SIZE.pointer;
        let batch_size = match BATCH_SIZE.lookup(config) {
            None => DEFAULT_BATCH_SIZE,
            Some(v) => v
                .as_u64()
                .with_context(|| format!("CONFIG_INVALID {at}: expected an integer"))?,
        };
        if batch_size == 0 {
            bail!("CONFIG_INVALID {at}: must be >= 1");
        }

        Ok(Self {
            checkout_url,
            form_url,
            step_policy: StepPolicy::new(threshold_micros, batch_size),
        })
    }
}

fn read_path(config: &Value, key: ConfigKey, default: &str) -> Result<String> {
    let pointer = key.pointer;
    let raw = match key.lookup(config) {
        None => return Ok(default.to_string()),
        Some(v) => v
            .as_str()
            .with_context(|| format!("CONFIG_INVALID {pointer}: expected a string"))?,
    };
    let t = raw.trim();
    if !t.starts_with('/') || t.starts_with("//") {
        bail!("CONFIG_INVALID {pointer}: must be a site-relative path starting with '/'");
    }
    Ok(t.to_string())
}
