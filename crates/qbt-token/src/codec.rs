use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use qbt_reconcile::{CartSnapshot, ProductId, Quantity};
use serde::Serialize;
use sha2::Sha256;

use crate::{SessionIdentity, TokenKey};

type HmacSha256 = Hmac<Sha256>;

/// Leading label of every snapshot tag message. Form nonces are keyed with
/// the same secret under `nonce|`, so the two never share a message.
const TAG_DOMAIN: &[u8] = b"cart_state|";
/// Separator between payload and session identity in the tagged message.
/// Cannot occur inside a base64url payload.
const TAG_SEPARATOR: &[u8] = b"|";
/// Hex length of an HMAC-SHA256 tag.
const TAG_HEX_LEN: usize = 64;
/// Upper bound on an accepted `cart_state` field.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Token + errors
// ---------------------------------------------------------------------------

/// The two opaque form fields carrying a render-time snapshot.
///
/// Created fresh on every render, consumed once at submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotToken {
    /// `cart_state` field: base64url of the canonical snapshot JSON.
    pub payload: String,
    /// `cart_state_hash` field: hex HMAC tag.
    pub tag: String,
}

/// Why a submitted token was not trusted. For logging only: callers must
/// treat every variant the same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidTokenReason {
    Missing,
    Oversized,
    MalformedTag,
    TagMismatch,
    MalformedPayload,
    InvalidEntry,
}

impl InvalidTokenReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Oversized => "oversized",
            Self::MalformedTag => "malformed_tag",
            Self::TagMismatch => "tag_mismatch",
            Self::MalformedPayload => "malformed_payload",
            Self::InvalidEntry => "invalid_entry",
        }
    }
}

/// Sentinel returned by [`SnapshotCodec::decode`] for anything untrusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidToken {
    pub reason: InvalidTokenReason,
}

impl InvalidToken {
    fn new(reason: InvalidTokenReason) -> Self {
        Self { reason }
    }
}

impl std::fmt::Display for InvalidToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "untrusted cart snapshot token ({})", self.reason.as_str())
    }
}

impl std::error::Error for InvalidToken {}

#[derive(Debug)]
pub enum EncodeError {
    Serialize(serde_json::Error),
    Mac(String),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::Serialize(e) => write!(f, "snapshot serialize failed: {e}"),
            EncodeError::Mac(e) => write!(f, "snapshot tag init failed: {e}"),
        }
    }
}

impl std::error::Error for EncodeError {}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encodes and verifies integrity-tagged cart snapshots.
///
/// Constructed once per process with the server secret and shared by all
/// requests; holds no per-request state.
#[derive(Clone, Debug)]
pub struct SnapshotCodec {
    key: TokenKey,
}

impl SnapshotCodec {
    pub fn new(key: TokenKey) -> Self {
        Self { key }
    }

    /// Encode `snapshot` for `session`.
    ///
    /// Deterministic: snapshots with equal contents produce byte-identical
    /// payload and tag, whatever order they were built in.
    pub fn encode(
        &self,
        snapshot: &CartSnapshot,
        session: &SessionIdentity,
    ) -> Result<SnapshotToken, EncodeError> {
        let json = serde_json::to_vec(snapshot).map_err(EncodeError::Serialize)?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let mac = self
            .tag_mac(payload.as_bytes(), session)
            .map_err(|e| EncodeError::Mac(e.to_string()))?;
        let tag = hex::encode(mac.finalize().into_bytes());
        Ok(SnapshotToken { payload, tag })
    }

    /// Verify and decode a submitted `(payload, tag)` pair for `session`.
    ///
    /// The tag is checked in constant time before the payload is parsed.
    /// Returns the [`InvalidToken`] sentinel on any failure; never panics.
    pub fn decode(
        &self,
        payload: &str,
        tag: &str,
        session: &SessionIdentity,
    ) -> Result<CartSnapshot, InvalidToken> {
        let payload = payload.trim();
        let tag = tag.trim();

        if payload.is_empty() || tag.is_empty() {
            return Err(InvalidToken::new(InvalidTokenReason::Missing));
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(InvalidToken::new(InvalidTokenReason::Oversized));
        }
        if tag.len() != TAG_HEX_LEN {
            return Err(InvalidToken::new(InvalidTokenReason::MalformedTag));
        }
        let tag_bytes =
            hex::decode(tag).map_err(|_| InvalidToken::new(InvalidTokenReason::MalformedTag))?;

        let mac = self
            .tag_mac(payload.as_bytes(), session)
            .map_err(|_| InvalidToken::new(InvalidTokenReason::TagMismatch))?;
        mac.verify_slice(&tag_bytes)
            .map_err(|_| InvalidToken::new(InvalidTokenReason::TagMismatch))?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| InvalidToken::new(InvalidTokenReason::MalformedPayload))?;
        // Negative or fractional quantities, non-numeric keys and non-object
        // documents all fail here.
        let entries: BTreeMap<ProductId, Quantity> = serde_json::from_slice(&json)
            .map_err(|_| InvalidToken::new(InvalidTokenReason::MalformedPayload))?;

        if entries.contains_key(&0) {
            return Err(InvalidToken::new(InvalidTokenReason::InvalidEntry));
        }

        Ok(CartSnapshot::from_entries(entries))
    }

    fn tag_mac(
        &self,
        payload: &[u8],
        session: &SessionIdentity,
    ) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes())?;
        mac.update(TAG_DOMAIN);
        mac.update(payload);
        mac.update(TAG_SEPARATOR);
        mac.update(session.as_str().as_bytes());
        Ok(mac)
    }

    pub(crate) fn key(&self) -> &TokenKey {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> SnapshotCodec {
        SnapshotCodec::new(TokenKey::from_secret("unit-test-secret-0123456789abcdef").unwrap())
    }

    fn session(s: &str) -> SessionIdentity {
        SessionIdentity::new(s).unwrap()
    }

    #[test]
    fn payload_is_form_and_attribute_safe() {
        let snap = CartSnapshot::from_entries([(101, 2), (102, 0), (9_999_999, 600)]);
        let token = codec().encode(&snap, &session("user:1")).unwrap();
        assert!(token
            .payload
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(token.tag.len(), TAG_HEX_LEN);
        assert!(token.tag.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn payload_carries_sorted_canonical_json() {
        let snap = CartSnapshot::from_raw([(205, 1), (101, 2)]);
        let token = codec().encode(&snap, &session("user:1")).unwrap();
        let json = URL_SAFE_NO_PAD.decode(&token.payload).unwrap();
        assert_eq!(String::from_utf8(json).unwrap(), r#"{"101":2,"205":1}"#);
    }

    #[test]
    fn empty_snapshot_round_trips() {
        let c = codec();
        let s = session("user:1");
        let token = c.encode(&CartSnapshot::empty(), &s).unwrap();
        assert_eq!(c.decode(&token.payload, &token.tag, &s), Ok(CartSnapshot::empty()));
    }

    #[test]
    fn missing_fields_are_invalid() {
        let c = codec();
        let s = session("user:1");
        assert_eq!(
            c.decode("", "", &s).unwrap_err().reason,
            InvalidTokenReason::Missing
        );
        let token = c.encode(&CartSnapshot::empty(), &s).unwrap();
        assert_eq!(
            c.decode(&token.payload, " ", &s).unwrap_err().reason,
            InvalidTokenReason::Missing
        );
    }

    #[test]
    fn non_hex_tag_is_malformed() {
        let c = codec();
        let s = session("user:1");
        let token = c.encode(&CartSnapshot::empty(), &s).unwrap();
        let bad = "z".repeat(TAG_HEX_LEN);
        assert_eq!(
            c.decode(&token.payload, &bad, &s).unwrap_err().reason,
            InvalidTokenReason::MalformedTag
        );
    }

    #[test]
    fn oversized_payload_is_refused_before_mac() {
        let c = codec();
        let s = session("user:1");
        let huge = "A".repeat(MAX_PAYLOAD_LEN + 1);
        assert_eq!(
            c.decode(&huge, &"0".repeat(TAG_HEX_LEN), &s)
                .unwrap_err()
                .reason,
            InvalidTokenReason::Oversized
        );
    }

    #[test]
    fn nonce_is_never_a_valid_tag() {
        let c = codec();
        let s = session("user:1");
        let nonce = c.issue_nonce(&s);
        let mac = c.tag_mac(b"nonce|update_cart", &s).unwrap();
        assert_ne!(hex::encode(mac.finalize().into_bytes()), nonce);

        let mut raw = HmacSha256::new_from_slice(c.key.as_bytes()).unwrap();
        raw.update(b"cart_state|e30|user:1");
        let token = c.encode(&CartSnapshot::empty(), &s).unwrap();
        assert_eq!(token.payload, "e30");
        assert_eq!(token.tag, hex::encode(raw.finalize().into_bytes()));
    }

    /// Sign an arbitrary payload the way `encode` would, to exercise the
    /// post-verification validation paths.
    fn sign_raw(c: &SnapshotCodec, json: &str, s: &SessionIdentity) -> (String, String) {
        let payload = URL_SAFE_NO_PAD.encode(json.as_bytes());
        let mac = c.tag_mac(payload.as_bytes(), s).unwrap();
        (payload, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn correctly_signed_but_invalid_structure_is_rejected() {
        let c = codec();
        let s = session("user:1");
        for (json, reason) in [
            (r#"{"101":-2}"#, InvalidTokenReason::MalformedPayload),
            (r#"{"abc":2}"#, InvalidTokenReason::MalformedPayload),
            (r#"{"101":2.5}"#, InvalidTokenReason::MalformedPayload),
            (r#"[1,2,3]"#, InvalidTokenReason::MalformedPayload),
            (r#"not json"#, InvalidTokenReason::MalformedPayload),
            (r#"{"0":2}"#, InvalidTokenReason::InvalidEntry),
        ] {
            let (payload, tag) = sign_raw(&c, json, &s);
            assert_eq!(
                c.decode(&payload, &tag, &s).unwrap_err().reason,
                reason,
                "payload {json}"
            );
        }
    }

    #[test]
    fn uppercase_hex_tag_is_accepted() {
        let c = codec();
        let s = session("user:1");
        let snap = CartSnapshot::from_entries([(3, 4)]);
        let token = c.encode(&snap, &s).unwrap();
        let upper = token.tag.to_ascii_uppercase();
        assert_eq!(c.decode(&token.payload, &upper, &s), Ok(snap));
    }
}
