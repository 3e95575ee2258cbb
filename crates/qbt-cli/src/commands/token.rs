//! `qbt token mint|verify`.
//!
//! Secrets resolve exactly as the daemon resolves them, except that an
//! ephemeral DEV secret is refused: a token minted with a throwaway key can
//! never be verified by anything else.

use anyhow::{bail, Context, Result};
use qbt_config::secrets::{resolve_secrets_for_mode, SecretSource};
use qbt_config::ConfigMode;
use qbt_reconcile::CartSnapshot;
use qbt_token::{SessionIdentity, SnapshotCodec, SnapshotToken, TokenKey};

use super::{load_config, parse_snapshot_json};

pub struct Minted {
    pub token: SnapshotToken,
    pub nonce: String,
}

fn session_of(raw: &str) -> Result<SessionIdentity> {
    SessionIdentity::new(raw.trim()).context("--session must not be blank")
}

fn codec_for(mode: ConfigMode, config_paths: &[String]) -> Result<SnapshotCodec> {
    let loaded = load_config(config_paths)?;
    let secrets = resolve_secrets_for_mode(&loaded.config_json, mode)?;
    if secrets.source == SecretSource::Ephemeral {
        tracing::warn!(
            var = %secrets.token_secret_var,
            mode = mode.as_str(),
            "refusing ephemeral token secret for token command"
        );
        bail!(
            "SECRETS_MISSING: token commands need a shared secret; set env var '{}'",
            secrets.token_secret_var
        );
    }
    let key = TokenKey::from_secret(&secrets.token_secret).context("token key")?;
    Ok(SnapshotCodec::new(key))
}

pub fn mint(
    mode: ConfigMode,
    config_paths: &[String],
    session: &str,
    snapshot_json: &str,
) -> Result<Minted> {
    let session = session_of(session)?;
    let snapshot = parse_snapshot_json(snapshot_json)?;
    let codec = codec_for(mode, config_paths)?;
    let token = codec.encode(&snapshot, &session)?;
    let nonce = codec.issue_nonce(&session);
    Ok(Minted { token, nonce })
}

pub fn verify(
    mode: ConfigMode,
    config_paths: &[String],
    session: &str,
    payload: &str,
    tag: &str,
) -> Result<CartSnapshot> {
    let session = session_of(session)?;
    let codec = codec_for(mode, config_paths)?;
    codec
        .decode(payload, tag, &session)
        .map_err(|e| anyhow::anyhow!("INVALID_TOKEN reason={}: {e}", e.reason.as_str()))
}
