//! Runtime secret resolution.
//!
//! This module is the **single source of truth** for the token secret.
//!
//! # Contract
//! - Config YAML stores only the env var NAME (`/security/token_secret_env`).
//! - At startup, callers invoke [`resolve_secrets_for_mode`] once and pass the
//!   result into constructors; never scatter `std::env::var` calls.
//! - `Debug` impls **redact** values; error messages carry the NAME only.
//!
//! # Mode-aware enforcement
//! - `PRODUCTION`: the token secret is **required** and must be at least
//!   `/security/min_secret_len` bytes (default 32).
//! - `DEV`: optional. When absent an ephemeral per-process secret is minted;
//!   tokens then stop verifying across restarts, which is fine for dev.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::keys::{MIN_SECRET_LEN, TOKEN_SECRET_ENV};
use crate::ConfigMode;

/// Default env var holding the token secret.
pub const DEFAULT_TOKEN_SECRET_ENV: &str = "QBT_TOKEN_SECRET";
/// Default minimum secret length enforced in PRODUCTION.
pub const DEFAULT_MIN_SECRET_LEN: usize = 32;

/// Where the token secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Environment,
    Ephemeral,
}

/// All runtime-resolved secrets for one process.
///
/// Built **once** at startup. **Values are redacted in `Debug` output.**
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Env var NAME the secret was (or would have been) read from.
    pub token_secret_var: String,
    /// Keying material for snapshot tags and form nonces.
    pub token_secret: String,
    pub source: SecretSource,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("token_secret_var", &self.token_secret_var)
            .field("token_secret", &"<REDACTED>")
            .field("source", &self.source)
            .finish()
    }
}

/// Non-blank env var name configured for the token secret.
fn configured_var_name(config: &Value) -> Option<String> {
    let s = TOKEN_SECRET_ENV.lookup(config)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Resolve a named environment variable.
/// Returns `None` if the variable is unset or its value is blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn ephemeral_secret() -> String {
    // Two v4 UUIDs = 244 random bits, hex without dashes.
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Resolve the token secret for `mode`.
///
/// # Errors
/// PRODUCTION only: returns `Err` naming the **env var** when it is missing
/// (`SECRETS_MISSING`) or shorter than the configured minimum
/// (`SECRETS_TOO_SHORT`). The value is never mentioned.
pub fn resolve_secrets_for_mode(config_json: &Value, mode: ConfigMode) -> Result<ResolvedSecrets> {
    let var = configured_var_name(config_json)
        .unwrap_or_else(|| DEFAULT_TOKEN_SECRET_ENV.to_string());

    let found = resolve_env(&var);

    match mode {
        ConfigMode::Production => {
            let Some(secret) = found else {
                bail!(
                    "SECRETS_MISSING mode=PRODUCTION: required env var '{}' \
                     (token secret) is not set or empty",
                    var,
                );
            };
            let min_len = MIN_SECRET_LEN
                .lookup(config_json)
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_MIN_SECRET_LEN);
            if secret.len() < min_len {
                bail!(
                    "SECRETS_TOO_SHORT mode=PRODUCTION: env var '{}' holds fewer than {} bytes",
                    var,
                    min_len,
                );
            }
            Ok(ResolvedSecrets {
                token_secret_var: var,
                token_secret: secret,
                source: SecretSource::Environment,
            })
        }
        ConfigMode::Dev => match found {
            Some(secret) => Ok(ResolvedSecrets {
                token_secret_var: var,
                token_secret: secret,
                source: SecretSource::Environment,
            }),
            None => {
                tracing::warn!(
                    var = %var,
                    "token secret env var not set; using an ephemeral DEV secret"
                );
                Ok(ResolvedSecrets {
                    token_secret_var: var,
                    token_secret: ephemeral_secret(),
                    source: SecretSource::Ephemeral,
                })
            }
        },
    }
}
