//! In-process scenario tests for qbt-daemon HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`; no network I/O.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use qbt_config::{ConfigMode, StorefrontSettings};
use qbt_daemon::{
    routes,
    state::{self, AppState, BusMsg, DaemonSettings},
};
use qbt_reconcile::CartSnapshot;
use qbt_storefront::{CuratedList, LiveCart, NewCartLine, Product};
use qbt_store_memory::MemoryStore;
use qbt_token::SessionIdentity;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SESSION: &str = "user:42";

fn make_state() -> Arc<AppState> {
    let store = MemoryStore::new();
    store
        .catalog
        .insert(Product::simple(101, "House red", 9_950_000));
    store
        .catalog
        .insert(Product::simple(102, "Reserve", 42_000_000));
    store
        .curated
        .set_product_ids(&session(), &[101, 102])
        .unwrap();
    let settings = DaemonSettings {
        mode: ConfigMode::Dev,
        config_hash: "test-hash".to_string(),
        storefront: StorefrontSettings::default(),
        token_secret: "daemon-route-test-secret-0123456789".to_string(),
    };
    Arc::new(state::AppState::new(settings, store).expect("state"))
}

/// Drive the router with a single request and return (status, headers, body).
async fn call(
    st: &Arc<AppState>,
    req: Request<axum::body::Body>,
) -> (StatusCode, axum::http::HeaderMap, bytes::Bytes) {
    let resp = routes::build_router(Arc::clone(st))
        .oneshot(req)
        .await
        .expect("oneshot failed");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, headers, body)
}

/// Parse body bytes as a `serde_json::Value`.
fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn get_form(session: Option<&str>) -> Request<axum::body::Body> {
    let mut b = Request::builder().method("GET").uri("/v1/quick-order");
    if let Some(s) = session {
        b = b.header("x-qbt-session", s);
    }
    b.body(axum::body::Body::empty()).unwrap()
}

fn post_form(session: Option<&str>, body: String) -> Request<axum::body::Body> {
    let mut b = Request::builder()
        .method("POST")
        .uri("/v1/quick-order")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(s) = session {
        b = b.header("x-qbt-session", s);
    }
    b.body(axum::body::Body::from(body)).unwrap()
}

/// Render the form and return its hidden fields.
async fn hidden_fields(st: &Arc<AppState>) -> BTreeMap<String, String> {
    let (status, _, body) = call(st, get_form(Some(SESSION))).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    serde_json::from_value(json["form"]["hidden"].clone()).unwrap()
}

fn encode_body(hidden: &BTreeMap<String, String>, quantities: &[(u64, &str)]) -> String {
    let mut parts: Vec<String> = hidden
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    for (id, q) in quantities {
        parts.push(format!("quantities%5B{id}%5D={q}"));
    }
    parts.join("&")
}

fn session() -> SessionIdentity {
    SessionIdentity::new(SESSION).unwrap()
}

// ---------------------------------------------------------------------------
// GET /v1/health, /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let st = make_state();
    let req = Request::builder()
        .method("GET")
        .uri("/v1/health")
        .body(axum::body::Body::empty())
        .unwrap();

    let (status, _, body) = call(&st, req).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "qbt-daemon");
}

#[tokio::test]
async fn status_reports_mode_and_config_hash() {
    let st = make_state();
    let req = Request::builder()
        .method("GET")
        .uri("/v1/status")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _, body) = call(&st, req).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["mode"], "DEV");
    assert_eq!(json["config_hash"], "test-hash");
    assert_eq!(json["applied"], 0);
}

// ---------------------------------------------------------------------------
// GET /v1/quick-order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn render_requires_session() {
    let st = make_state();
    let (status, _, body) = call(&st, get_form(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(parse_json(body)["code"], "session_required");
}

#[tokio::test]
async fn render_returns_rows_and_hidden_fields() {
    let st = make_state();
    let (status, _, body) = call(&st, get_form(Some(SESSION))).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    let form = &json["form"];
    assert_eq!(form["is_empty"], false);
    assert_eq!(form["hidden"]["action"], "update_cart");
    assert_eq!(form["groups"][0]["label"], "Other products");
    let rows = form["groups"][0]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "House red");
    assert_eq!(rows[0]["step"], 6);
    assert_eq!(rows[1]["step"], 1);
    assert!(json["notice"].is_null());
}

#[tokio::test]
async fn render_echoes_only_known_notices() {
    let st = make_state();
    let req = |uri: &str| {
        Request::builder()
            .method("GET")
            .uri(uri)
            .header("x-qbt-session", SESSION)
            .body(axum::body::Body::empty())
            .unwrap()
    };
    let (_, _, body) = call(&st, req("/v1/quick-order?notice=cart_changed")).await;
    assert_eq!(parse_json(body)["notice"], "cart_changed");
    let (_, _, body) = call(&st, req("/v1/quick-order?notice=%3Cscript%3E")).await;
    assert!(parse_json(body)["notice"].is_null());
}

#[tokio::test]
async fn render_is_503_when_cart_is_down() {
    let st = make_state();
    st.store.cart.set_unavailable(true);
    let (status, _, body) = call(&st, get_form(Some(SESSION))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(parse_json(body)["code"], "collaborator_unavailable");
}

// ---------------------------------------------------------------------------
// POST /v1/quick-order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn applied_submission_redirects_to_checkout() {
    let st = make_state();
    let mut rx = st.bus.subscribe();
    let hidden = hidden_fields(&st).await;

    let body = encode_body(&hidden, &[(101, "1"), (102, "2")]);
    let (status, headers, _) = call(&st, post_form(Some(SESSION), body)).await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers[header::LOCATION], "/checkout");
    let live = CartSnapshot::from_lines(&st.store.cart.list_lines(&session()).unwrap());
    assert_eq!(live, CartSnapshot::from_entries([(101, 6), (102, 2)]));

    match rx.try_recv().unwrap() {
        BusMsg::Reconcile(ev) => {
            assert_eq!(ev.outcome, "applied");
            assert_eq!(ev.inserted, 2);
            assert_eq!(ev.session, session().fingerprint());
        }
        other => panic!("unexpected bus message: {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_change_redirects_back_with_notice() {
    let st = make_state();
    let hidden = hidden_fields(&st).await;

    // Another tab adds a bottle after the form was rendered.
    st.store
        .cart
        .external_set(
            &session(),
            NewCartLine {
                product_id: 102,
                quantity: 1,
                variant_id: None,
                attributes: BTreeMap::new(),
            },
        )
        .unwrap();

    let body = encode_body(&hidden, &[(101, "6")]);
    let (status, headers, _) = call(&st, post_form(Some(SESSION), body)).await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        headers[header::LOCATION],
        "/quick-order?notice=cart_changed"
    );
    let live = CartSnapshot::from_lines(&st.store.cart.list_lines(&session()).unwrap());
    assert_eq!(live, CartSnapshot::from_entries([(102, 1)]));
}

#[tokio::test]
async fn bad_nonce_is_403_and_cart_untouched() {
    let st = make_state();
    let mut hidden = hidden_fields(&st).await;
    hidden.insert("nonce".to_string(), "00".repeat(32));

    let body = encode_body(&hidden, &[(101, "6")]);
    let (status, _, body) = call(&st, post_form(Some(SESSION), body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(parse_json(body)["code"], "nonce_refused");
    assert_eq!(st.store.cart.mutation_count(), 0);
}

#[tokio::test]
async fn submission_without_session_is_401() {
    let st = make_state();
    let hidden = hidden_fields(&st).await;
    let (status, _, _) = call(&st, post_form(None, encode_body(&hidden, &[]))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn form_from_another_session_is_refused() {
    let st = make_state();
    let hidden = hidden_fields(&st).await;
    let (status, _, _) = call(
        &st,
        post_form(Some("user:43"), encode_body(&hidden, &[(101, "6")])),
    )
    .await;
    // The nonce is session-bound, so this stops before the token is read.
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn wrong_action_is_400() {
    let st = make_state();
    let mut hidden = hidden_fields(&st).await;
    hidden.insert("action".to_string(), "empty_cart".to_string());
    let (status, _, body) = call(&st, post_form(Some(SESSION), encode_body(&hidden, &[]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(body)["code"], "bad_submission");
}

#[tokio::test]
async fn cart_down_at_submit_is_503_not_a_redirect() {
    let st = make_state();
    let hidden = hidden_fields(&st).await;
    st.store.cart.set_unavailable(true);
    let (status, headers, _) =
        call(&st, post_form(Some(SESSION), encode_body(&hidden, &[(101, "6")]))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(headers.get(header::LOCATION).is_none());

    let req = Request::builder()
        .method("GET")
        .uri("/v1/status")
        .body(axum::body::Body::empty())
        .unwrap();
    let (_, _, body) = call(&st, req).await;
    assert_eq!(parse_json(body)["unavailable"], 1);
}
