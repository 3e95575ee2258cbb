use sha2::{Digest, Sha256};

/// Opaque identity of the authenticated shopper session.
///
/// Stable for the lifetime of one session, distinct across users. Used as
/// keying input for snapshot tags and to address the shopper's cart.
/// `Debug` prints a short fingerprint, never the identity itself.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    /// Returns `None` for a blank identity: an anonymous request has no
    /// session to bind a token to.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return None;
        }
        Some(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars of SHA-256(identity). Safe for log lines.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut out = hex::encode(digest);
        out.truncate(12);
        out
    }
}

impl std::fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionIdentity")
            .field(&self.fingerprint())
            .finish()
    }
}
