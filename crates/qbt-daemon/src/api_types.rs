//! Request and response types for all qbt-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests.  No business logic lives here.

use qbt_storefront::QuickOrderForm;
use serde::{Deserialize, Serialize};

/// Header carrying the authenticated shopper session, set by the fronting
/// storefront after login.
pub const SESSION_HEADER: &str = "x-qbt-session";

/// Query value appended to the form URL after a rejected submission.
pub const NOTICE_CART_CHANGED: &str = "cart_changed";

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Errors (400 / 401 / 403 / 503)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// "session_required" | "bad_submission" | "nonce_refused" |
    /// "collaborator_unavailable" | "internal"
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// /v1/quick-order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuickOrderQuery {
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickOrderResponse {
    /// Echoed `notice` query, e.g. `cart_changed` after a rejection.
    pub notice: Option<String>,
    pub form: QuickOrderForm,
}
