//! CSRF-style form nonce.
//!
//! `nonce = hex(HMAC-SHA256(key, "nonce|update_cart|" + session))`
//!
//! The nonce is per session and per action; it does not expire on its own.
//! It is verified before the snapshot token and a failure is a hard refusal,
//! not a reconcile rejection.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{SessionIdentity, SnapshotCodec};

type HmacSha256 = Hmac<Sha256>;

/// Action name bound into every form nonce.
pub const UPDATE_CART_ACTION: &str = "update_cart";

const NONCE_DOMAIN: &[u8] = b"nonce|";

impl SnapshotCodec {
    /// Nonce to embed in the form rendered for `session`.
    pub fn issue_nonce(&self, session: &SessionIdentity) -> String {
        match self.nonce_mac(session) {
            Ok(mac) => hex::encode(mac.finalize().into_bytes()),
            // HMAC accepts keys of any length; an empty string never verifies.
            Err(_) => String::new(),
        }
    }

    /// Constant-time check of a submitted nonce.
    pub fn verify_nonce(&self, nonce: &str, session: &SessionIdentity) -> bool {
        let Ok(bytes) = hex::decode(nonce.trim()) else {
            return false;
        };
        match self.nonce_mac(session) {
            Ok(mac) => mac.verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }

    fn nonce_mac(&self, session: &SessionIdentity) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        let mut mac = HmacSha256::new_from_slice(self.key().as_bytes())?;
        mac.update(NONCE_DOMAIN);
        mac.update(UPDATE_CART_ACTION.as_bytes());
        mac.update(b"|");
        mac.update(session.as_str().as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use crate::{SessionIdentity, SnapshotCodec, TokenKey};

    fn codec(secret: &str) -> SnapshotCodec {
        SnapshotCodec::new(TokenKey::from_secret(secret).unwrap())
    }

    #[test]
    fn nonce_verifies_for_issuing_session_only() {
        let c = codec("nonce-secret-abcdefghijklmnop");
        let a = SessionIdentity::new("user:1").unwrap();
        let b = SessionIdentity::new("user:2").unwrap();
        let n = c.issue_nonce(&a);
        assert!(c.verify_nonce(&n, &a));
        assert!(!c.verify_nonce(&n, &b));
    }

    #[test]
    fn nonce_depends_on_server_key() {
        let s = SessionIdentity::new("user:1").unwrap();
        let n = codec("key-one-aaaaaaaaaaaaaaaa").issue_nonce(&s);
        assert!(!codec("key-two-bbbbbbbbbbbbbbbb").verify_nonce(&n, &s));
    }

    #[test]
    fn garbage_nonce_is_refused() {
        let c = codec("nonce-secret-abcdefghijklmnop");
        let s = SessionIdentity::new("user:1").unwrap();
        assert!(!c.verify_nonce("", &s));
        assert!(!c.verify_nonce("not-hex", &s));
        assert!(!c.verify_nonce("00", &s));
    }

    #[test]
    fn nonce_never_equals_a_snapshot_tag() {
        let c = codec("nonce-secret-abcdefghijklmnop");
        let s = SessionIdentity::new("user:1").unwrap();
        let token = c
            .encode(&qbt_reconcile::CartSnapshot::empty(), &s)
            .unwrap();
        assert_ne!(token.tag, c.issue_nonce(&s));
    }
}
