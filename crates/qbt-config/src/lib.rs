use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub mod keys;
pub mod secrets;
pub mod settings;

pub use keys::{
    consumed_pointers_for_mode, report_unused_keys, ConfigKey, ConfigSection, UnusedKeyPolicy,
    UnusedKeyReport, CONFIG_KEYS,
};
pub use settings::StorefrontSettings;

/// Value prefixes of credentials that must never be written into YAML.
/// Config carries env var NAMES; the token secret itself comes from the env.
const CREDENTIAL_PREFIXES: &[&str] = &[
    "sk-",        // Stripe / OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "ck_",        // store REST consumer key
    "cs_",        // store REST consumer secret
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
];

/// Deployment mode. Decides which keys are consumed and whether the token
/// secret is mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Dev,
    Production,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Dev => "DEV",
            ConfigMode::Production => "PRODUCTION",
        }
    }

    /// Case-insensitive parse of `DEV` / `PRODUCTION`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEV" => Ok(ConfigMode::Dev),
            "PRODUCTION" | "PROD" => Ok(ConfigMode::Production),
            other => bail!(
                "CONFIG_UNKNOWN_MODE: unrecognised mode '{}'; expected one of: DEV | PRODUCTION",
                other
            ),
        }
    }
}

/// Effective config after layering, with its identity hash.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Hex SHA-256 of `canonical_json`.
    pub config_hash: String,
    /// Compact JSON with sorted object keys.
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| std::fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// Layer YAML documents left to right: later documents win per leaf, objects
/// merge key by key, and any other value replaces wholesale.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for (idx, raw) in yaml_docs.iter().enumerate() {
        let layer: serde_yaml::Value = serde_yaml::from_str(raw)
            .with_context(|| format!("invalid yaml in config layer {idx}"))?;
        // Empty document.
        if layer.is_null() {
            continue;
        }
        let layer = serde_json::to_value(layer)
            .with_context(|| format!("config layer {idx} is not representable as json"))?;
        overlay(&mut merged, layer);
    }

    refuse_secret_literals(&merged)?;

    // serde_json's Map is ordered, so this is canonical across YAML key order.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                match into.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        into.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// `CONFIG_SECRET_DETECTED` when a leaf holds a credential, or when the
/// token secret env key holds something that cannot be an env var name.
/// Errors name the pointer, never the value.
fn refuse_secret_literals(config: &Value) -> Result<()> {
    for (pointer, value) in keys::config_leaves(config) {
        if let Value::String(s) = value {
            if is_credential_literal(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", pointer);
            }
        }
    }

    if let Some(Value::String(name)) = keys::TOKEN_SECRET_ENV.lookup(config) {
        let name = name.trim();
        if !name.is_empty() && !is_env_var_name(name) {
            bail!(
                "CONFIG_SECRET_DETECTED leaf={} value=REDACTED: expected an env var name",
                keys::TOKEN_SECRET_ENV.pointer
            );
        }
    }
    Ok(())
}

fn is_credential_literal(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 8 && CREDENTIAL_PREFIXES.iter().any(|p| t.starts_with(p))
}

fn is_env_var_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
