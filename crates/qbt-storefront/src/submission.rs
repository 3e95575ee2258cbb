//! Form submission boundary.
//!
//! Accepts the decoded `application/x-www-form-urlencoded` pairs of a quick
//! order post:
//!
//! - `action` (must be `update_cart`)
//! - `cart_state`, `cart_state_hash` (snapshot token)
//! - `nonce`
//! - `quantities[<product_id>]` (one per row)
//!
//! Absent token or nonce fields parse as empty strings; they are refused
//! further in, by the nonce check and the codec, so that a missing field and
//! a forged one take the same path.

use qbt_reconcile::ProductId;
use qbt_token::nonce::UPDATE_CART_ACTION;

use crate::QuantityRequest;

pub const FIELD_ACTION: &str = "action";
pub const FIELD_CART_STATE: &str = "cart_state";
pub const FIELD_CART_STATE_HASH: &str = "cart_state_hash";
pub const FIELD_NONCE: &str = "nonce";
const QUANTITIES_PREFIX: &str = "quantities[";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuickOrderSubmission {
    pub cart_state: String,
    pub cart_state_hash: String,
    pub nonce: String,
    pub quantities: QuantityRequest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionError {
    MissingAction,
    UnsupportedAction(String),
}

impl std::fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionError::MissingAction => write!(f, "SUBMISSION_REFUSED: missing action"),
            SubmissionError::UnsupportedAction(a) => {
                write!(f, "SUBMISSION_REFUSED: unsupported action '{a}'")
            }
        }
    }
}

impl std::error::Error for SubmissionError {}

/// Parse submitted form pairs. Later duplicates win; unknown fields are
/// ignored.
pub fn parse_submission<I, K, V>(pairs: I) -> Result<QuickOrderSubmission, SubmissionError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut action: Option<String> = None;
    let mut out = QuickOrderSubmission {
        cart_state: String::new(),
        cart_state_hash: String::new(),
        nonce: String::new(),
        quantities: QuantityRequest::new(),
    };

    for (k, v) in pairs {
        let key = k.as_ref();
        match key {
            FIELD_ACTION => action = Some(v.into()),
            FIELD_CART_STATE => out.cart_state = v.into(),
            FIELD_CART_STATE_HASH => out.cart_state_hash = v.into(),
            FIELD_NONCE => out.nonce = v.into(),
            _ => {
                if let Some(id) = quantity_field_id(key) {
                    out.quantities.insert(id, v);
                }
            }
        }
    }

    match action {
        None => Err(SubmissionError::MissingAction),
        Some(a) if a.trim() == UPDATE_CART_ACTION => Ok(out),
        Some(a) => Err(SubmissionError::UnsupportedAction(a)),
    }
}

/// `quantities[<id>]` → id, for positive integer ids only.
fn quantity_field_id(key: &str) -> Option<ProductId> {
    let inner = key.strip_prefix(QUANTITIES_PREFIX)?.strip_suffix(']')?;
    match inner.trim().parse::<i64>() {
        Ok(n) if n > 0 => Some(n as ProductId),
        _ => None,
    }
}
