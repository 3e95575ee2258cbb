use qbt_token::EncodeError;

use crate::CollaboratorError;

/// Hard failures of a render or submission.
///
/// `Rejected` is not here: a concurrent cart change or an untrusted snapshot
/// is an ordinary outcome, recoverable by re-rendering.
#[derive(Debug)]
pub enum StorefrontError {
    /// Form nonce missing or not issued for this session.
    BadNonce,
    /// Cart, catalog or curated list could not be reached. Nothing was
    /// compared; mutations already made in this request stay.
    Unavailable(CollaboratorError),
    /// Snapshot token could not be produced for a render.
    Encode(EncodeError),
}

impl StorefrontError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorefrontError::Unavailable(_))
    }
}

impl std::fmt::Display for StorefrontError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorefrontError::BadNonce => write!(f, "NONCE_REFUSED: form nonce missing or invalid"),
            StorefrontError::Unavailable(e) => write!(f, "{e}"),
            StorefrontError::Encode(e) => write!(f, "TOKEN_ENCODE_FAILED: {e}"),
        }
    }
}

impl std::error::Error for StorefrontError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorefrontError::BadNonce => None,
            StorefrontError::Unavailable(e) => Some(e),
            StorefrontError::Encode(e) => Some(e),
        }
    }
}

impl From<CollaboratorError> for StorefrontError {
    fn from(e: CollaboratorError) -> Self {
        StorefrontError::Unavailable(e)
    }
}

impl From<EncodeError> for StorefrontError {
    fn from(e: EncodeError) -> Self {
        StorefrontError::Encode(e)
    }
}
