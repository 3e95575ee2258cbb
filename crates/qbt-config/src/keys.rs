//! The storefront's config keys and the unused-key check built on them.
//!
//! Every key the crate reads is listed in [`CONFIG_KEYS`]. Settings and
//! secret resolution read through these constants, so the list cannot drift
//! from what is actually consumed.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ConfigMode;

/// Top-level config sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSection {
    /// Redirect targets.
    Storefront,
    /// Step policy for requested quantities.
    Quantity,
    /// Env var names and secret length policy.
    Security,
}

impl ConfigSection {
    pub fn name(self) -> &'static str {
        match self {
            ConfigSection::Storefront => "storefront",
            ConfigSection::Quantity => "quantity",
            ConfigSection::Security => "security",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "storefront" => Some(ConfigSection::Storefront),
            "quantity" => Some(ConfigSection::Quantity),
            "security" => Some(ConfigSection::Security),
            _ => None,
        }
    }
}

/// One scalar key the crate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigKey {
    pub section: ConfigSection,
    /// JSON pointer of the leaf, e.g. `/quantity/batch_size`.
    pub pointer: &'static str,
    /// Read only when booting in PRODUCTION.
    pub production_only: bool,
}

impl ConfigKey {
    const fn new(section: ConfigSection, pointer: &'static str) -> Self {
        Self {
            section,
            pointer,
            production_only: false,
        }
    }

    pub fn is_read_in(&self, mode: ConfigMode) -> bool {
        !self.production_only || mode == ConfigMode::Production
    }

    pub fn lookup<'a>(&self, config: &'a Value) -> Option<&'a Value> {
        config.pointer(self.pointer).filter(|v| !v.is_null())
    }
}

pub const CHECKOUT_URL: ConfigKey = ConfigKey::new(ConfigSection::Storefront, "/storefront/checkout_url");
pub const FORM_URL: ConfigKey = ConfigKey::new(ConfigSection::Storefront, "/storefront/form_url");
pub const STEP_PRICE_THRESHOLD: ConfigKey =
    ConfigKey::new(ConfigSection::Quantity, "/quantity/step_price_threshold");
pub const BATCH_SIZE: ConfigKey = ConfigKey::new(ConfigSection::Quantity, "/quantity/batch_size");
pub const TOKEN_SECRET_ENV: ConfigKey =
    ConfigKey::new(ConfigSection::Security, "/security/token_secret_env");
pub const MIN_SECRET_LEN: ConfigKey = ConfigKey {
    section: ConfigSection::Security,
    pointer: "/security/min_secret_len",
    production_only: true,
};

pub const CONFIG_KEYS: &[ConfigKey] = &[
    CHECKOUT_URL,
    FORM_URL,
    STEP_PRICE_THRESHOLD,
    BATCH_SIZE,
    TOKEN_SECRET_ENV,
    MIN_SECRET_LEN,
];

/// Pointers of the keys read in `mode`, in table order.
pub fn consumed_pointers_for_mode(mode: ConfigMode) -> Vec<&'static str> {
    CONFIG_KEYS
        .iter()
        .filter(|k| k.is_read_in(mode))
        .map(|k| k.pointer)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub mode: String,
    pub consumed_keys: Vec<String>,
    /// Sorted leaf pointers nothing reads.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }

    /// Unused leaves sitting under a known section (likely typos of real keys).
    pub fn unused_in(&self, section: ConfigSection) -> Vec<&str> {
        self.unused_leaf_pointers
            .iter()
            .map(String::as_str)
            .filter(|p| section_of(p) == Some(section))
            .collect()
    }
}

/// Compare the config's leaves against the keys read in `mode`.
///
/// A leaf is consumed only when its pointer equals a known key exactly;
/// anything nested below a scalar key is reported too.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed = consumed_pointers_for_mode(mode);

    let mut unused: Vec<String> = config_leaves(config_json)
        .into_iter()
        .map(|(pointer, _)| pointer)
        .filter(|p| !consumed.iter().any(|c| *c == p.as_str()))
        .collect();
    unused.sort();

    let report = UnusedKeyReport {
        mode: mode.as_str().to_string(),
        consumed_keys: consumed.iter().map(|p| p.to_string()).collect(),
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let shown: Vec<&String> = report.unused_leaf_pointers.iter().take(12).collect();
        bail!(
            "CONFIG_UNUSED_KEYS (mode={}): {} config key(s) are not read by the storefront: {:?}",
            report.mode,
            report.unused_leaf_pointers.len(),
            shown
        );
    }

    Ok(report)
}

/// Section a pointer belongs to, if it is one of ours.
pub fn section_of(pointer: &str) -> Option<ConfigSection> {
    let head = pointer.strip_prefix('/')?.split('/').next()?;
    ConfigSection::from_name(head)
}

/// Every scalar leaf of `root` with its JSON pointer. Empty objects and
/// arrays contribute nothing; a scalar root is reported as `/`.
pub(crate) fn config_leaves(root: &Value) -> Vec<(String, &Value)> {
    let mut leaves = Vec::new();
    let mut pending: Vec<(String, &Value)> = vec![(String::new(), root)];

    while let Some((pointer, value)) = pending.pop() {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let token = key.replace('~', "~0").replace('/', "~1");
                    pending.push((format!("{pointer}/{token}"), child));
                }
            }
            Value::Array(items) => {
                for (idx, child) in items.iter().enumerate() {
                    pending.push((format!("{pointer}/{idx}"), child));
                }
            }
            scalar if pointer.is_empty() => leaves.push(("/".to_string(), scalar)),
            scalar => leaves.push((pointer, scalar)),
        }
    }
    leaves
}
