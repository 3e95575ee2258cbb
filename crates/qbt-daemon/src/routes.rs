//! Axum router and all HTTP handlers for qbt-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Scenario tests in `tests/` drive the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Form, Json, Router,
};
use futures_util::{Stream, StreamExt};
use qbt_storefront::{parse_submission, ReconcileOutcome, StorefrontError};
use qbt_token::SessionIdentity;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    api_types::{
        ErrorResponse, HealthResponse, QuickOrderQuery, QuickOrderResponse, NOTICE_CART_CHANGED,
        SESSION_HEADER,
    },
    state::{uptime_secs, AppState, BusMsg, ReconcileEvent},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/quick-order", get(quick_order_form).post(quick_order_submit))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut snap = st.status.read().await.clone();
    snap.daemon_uptime_secs = uptime_secs();
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// Session + error helpers
// ---------------------------------------------------------------------------

fn session_from_headers(headers: &HeaderMap) -> Option<SessionIdentity> {
    let raw = headers.get(SESSION_HEADER)?.to_str().ok()?;
    SessionIdentity::new(raw.trim())
}

fn session_required() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(
            "session_required",
            format!("missing or blank {SESSION_HEADER} header"),
        )),
    )
        .into_response()
}

fn storefront_error_response(err: &StorefrontError) -> Response {
    let (status, code) = match err {
        StorefrontError::BadNonce => (StatusCode::FORBIDDEN, "nonce_refused"),
        StorefrontError::Unavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "collaborator_unavailable")
        }
        StorefrontError::Encode(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (status, Json(ErrorResponse::new(code, err.to_string()))).into_response()
}

fn see_other(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(v) => (StatusCode::SEE_OTHER, [(header::LOCATION, v)]).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("internal", "redirect target is not a valid header")),
        )
            .into_response(),
    }
}

fn with_notice(url: &str, notice: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}notice={notice}")
}

// ---------------------------------------------------------------------------
// GET /v1/quick-order
// ---------------------------------------------------------------------------

/// Render model for the session's quick order form, with a fresh token.
pub(crate) async fn quick_order_form(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<QuickOrderQuery>,
) -> Response {
    let Some(session) = session_from_headers(&headers) else {
        return session_required();
    };

    match st.reconciler.render_form(&session) {
        Ok(form) => {
            // Only echo notices this service issues.
            let notice = q.notice.filter(|n| n == NOTICE_CART_CHANGED);
            (StatusCode::OK, Json(QuickOrderResponse { notice, form })).into_response()
        }
        Err(e) => {
            warn!(session = %session.fingerprint(), error = %e, "quick order render failed");
            storefront_error_response(&e)
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/quick-order
// ---------------------------------------------------------------------------

/// Submit the form.
///
/// - Applied → 303 to the checkout URL
/// - Rejected → 303 back to the form URL with `notice=cart_changed`
/// - Bad nonce → 403, collaborator down → 503 (never redirected to checkout)
pub(crate) async fn quick_order_submit(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let Some(session) = session_from_headers(&headers) else {
        return session_required();
    };
    let fp = session.fingerprint();

    let submission = match parse_submission(pairs) {
        Ok(s) => s,
        Err(e) => {
            st.publish(ReconcileEvent {
                outcome: "refused".to_string(),
                session: fp,
                reason: Some(e.to_string()),
                ..ReconcileEvent::default()
            })
            .await;
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("bad_submission", e.to_string())),
            )
                .into_response();
        }
    };

    match st.reconciler.submit_form(&session, &submission) {
        Ok(ReconcileOutcome::Applied(report)) => {
            st.publish(ReconcileEvent {
                outcome: "applied".to_string(),
                session: fp,
                reason: None,
                inserted: report.inserted.len(),
                updated: report.updated.len(),
                removed: report.removed.len(),
                skipped: report.skipped.len(),
                diffs: 0,
            })
            .await;
            see_other(&st.storefront.checkout_url)
        }
        Ok(ReconcileOutcome::Rejected { reason, report }) => {
            info!(session = %fp, reason = %reason, "quick order sent back to form");
            st.publish(ReconcileEvent {
                outcome: "rejected".to_string(),
                session: fp,
                reason: Some(reason.as_str().to_string()),
                diffs: report.diffs.len(),
                ..ReconcileEvent::default()
            })
            .await;
            see_other(&with_notice(&st.storefront.form_url, NOTICE_CART_CHANGED))
        }
        Err(e) => {
            let outcome = if e.is_unavailable() { "unavailable" } else { "refused" };
            st.publish(ReconcileEvent {
                outcome: outcome.to_string(),
                session: fp,
                reason: Some(e.to_string()),
                ..ReconcileEvent::default()
            })
            .await;
            storefront_error_response(&e)
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Reconcile(_) => "reconcile",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
