//! Boot sequence: config layers → mode checks → secrets → store.
//!
//! Fails closed: a PRODUCTION boot with a missing token secret, a literal
//! secret in YAML, or unused config keys never reaches `bind`.

use std::path::Path;

use anyhow::{Context, Result};
use qbt_config::secrets::{resolve_secrets_for_mode, SecretSource};
use qbt_config::{
    load_layered_yaml, load_layered_yaml_from_strings, report_unused_keys, ConfigMode,
    StorefrontSettings, UnusedKeyPolicy,
};
use qbt_store_memory::{load_seed_json, MemoryStore};
use tracing::{info, warn};

use crate::state::{AppState, DaemonSettings};

pub const ENV_CONFIG: &str = "QBT_CONFIG";
pub const ENV_MODE: &str = "QBT_MODE";
pub const ENV_SEED_PATH: &str = "QBT_SEED_PATH";
pub const ENV_DAEMON_ADDR: &str = "QBT_DAEMON_ADDR";

/// Inputs that normally come from the environment.
#[derive(Debug, Clone)]
pub struct BootOptions {
    pub mode: ConfigMode,
    pub config_paths: Vec<String>,
    pub seed_path: Option<String>,
}

impl BootOptions {
    pub fn from_env() -> Result<Self> {
        let mode = match std::env::var(ENV_MODE) {
            Ok(raw) if !raw.trim().is_empty() => ConfigMode::parse(&raw)?,
            _ => ConfigMode::Dev,
        };
        let config_paths = std::env::var(ENV_CONFIG)
            .map(|raw| split_paths(&raw))
            .unwrap_or_default();
        let seed_path = std::env::var(ENV_SEED_PATH)
            .ok()
            .filter(|p| !p.trim().is_empty());
        Ok(Self {
            mode,
            config_paths,
            seed_path,
        })
    }
}

/// Comma-separated list; blanks dropped.
pub fn split_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn boot(opts: &BootOptions) -> Result<AppState> {
    let loaded = if opts.config_paths.is_empty() {
        load_layered_yaml_from_strings(&[])?
    } else {
        let refs: Vec<&str> = opts.config_paths.iter().map(String::as_str).collect();
        load_layered_yaml(&refs)?
    };

    let policy = match opts.mode {
        ConfigMode::Dev => UnusedKeyPolicy::Warn,
        ConfigMode::Production => UnusedKeyPolicy::Fail,
    };
    let unused = report_unused_keys(opts.mode, &loaded.config_json, policy)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "unused config keys");
    }

    let secrets = resolve_secrets_for_mode(&loaded.config_json, opts.mode)?;
    if secrets.source == SecretSource::Ephemeral {
        warn!("tokens will not verify across restarts");
    }
    let storefront = StorefrontSettings::from_config_json(&loaded.config_json)?;

    let store = match &opts.seed_path {
        Some(p) => MemoryStore::from_seed(load_seed_json(Path::new(p))?)
            .with_context(|| format!("seed store from {p}"))?,
        None => MemoryStore::new(),
    };

    info!(
        mode = opts.mode.as_str(),
        config_hash = %loaded.config_hash,
        checkout_url = %storefront.checkout_url,
        "qbt-daemon configured"
    );

    AppState::new(
        DaemonSettings {
            mode: opts.mode,
            config_hash: loaded.config_hash,
            storefront,
            token_secret: secrets.token_secret,
        },
        store,
    )
}
