//! qbt-token
//!
//! Snapshot codec for the quick order form.
//!
//! A render-time [`CartSnapshot`](qbt_reconcile::CartSnapshot) travels through
//! the shopper's browser as two opaque form fields:
//!
//! - `cart_state`: base64url (no padding) of the snapshot's canonical JSON
//! - `cart_state_hash`: hex HMAC-SHA256 over `"cart_state|" + cart_state | session`, keyed
//!   with a server-side secret
//!
//! The tag binds the payload to the session that rendered it, so a token
//! cannot be forged without the secret nor replayed under another session.
//! Decoding never panics and never distinguishes "tampered" from "absent"
//! for the caller's control flow; the reason is kept for logging only.
//!
//! The same key also signs the CSRF-style form nonce (see [`nonce`]).

mod codec;
mod key;
pub mod nonce;
mod session;

pub use codec::{
    EncodeError, InvalidToken, InvalidTokenReason, SnapshotCodec, SnapshotToken,
    MAX_PAYLOAD_LEN,
};
pub use key::{KeyError, TokenKey};
pub use session::SessionIdentity;
