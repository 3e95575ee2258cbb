//! Command handler modules for qbt-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod quantity;
pub mod token;

use anyhow::{Context, Result};
use qbt_config::{load_layered_yaml, load_layered_yaml_from_strings, ConfigMode, LoadedConfig};
use qbt_reconcile::CartSnapshot;
use serde_json::Value;

pub const ENV_MODE: &str = "QBT_MODE";
pub const ENV_CONFIG: &str = "QBT_CONFIG";

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// `--mode` wins, then `QBT_MODE`, then DEV.
pub fn resolve_mode(flag: Option<&str>) -> Result<ConfigMode> {
    if let Some(raw) = flag {
        return ConfigMode::parse(raw).context("invalid --mode");
    }
    match std::env::var(ENV_MODE) {
        Ok(raw) if !raw.trim().is_empty() => ConfigMode::parse(&raw),
        _ => Ok(ConfigMode::Dev),
    }
}

/// Load `--config` layers, falling back to comma-separated `QBT_CONFIG`.
/// No layers at all yields the empty config.
pub fn load_config(flag_paths: &[String]) -> Result<LoadedConfig> {
    let paths: Vec<String> = if flag_paths.is_empty() {
        std::env::var(ENV_CONFIG)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    } else {
        flag_paths.to_vec()
    };

    if paths.is_empty() {
        return load_layered_yaml_from_strings(&[]);
    }
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    load_layered_yaml(&refs)
}

/// Parse a snapshot given as a JSON object of `"<id>": <qty>`.
///
/// Same normalization as every other snapshot constructor: ids <= 0 are
/// dropped and negative quantities clamp to 0.
pub fn parse_snapshot_json(raw: &str) -> Result<CartSnapshot> {
    let v: Value = serde_json::from_str(raw.trim()).context("snapshot must be valid JSON")?;
    let obj = v
        .as_object()
        .context("snapshot must be a JSON object of product id -> quantity")?;

    let mut pairs = Vec::with_capacity(obj.len());
    for (k, qty) in obj {
        let id: i64 = k
            .trim()
            .parse()
            .with_context(|| format!("snapshot key '{k}' is not a product id"))?;
        let qty = qty
            .as_i64()
            .with_context(|| format!("snapshot quantity for '{k}' must be an integer"))?;
        pairs.push((id, qty));
    }
    Ok(CartSnapshot::from_raw(pairs))
}
