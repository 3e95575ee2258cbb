//! Shared runtime state for qbt-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use qbt_config::{ConfigMode, StorefrontSettings};
use qbt_storefront::Reconciler;
use qbt_store_memory::{MemoryCart, MemoryCatalog, MemoryCuratedList, MemoryStore};
use qbt_token::{SnapshotCodec, TokenKey};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

/// Reconciler wired to the in-memory collaborators.
pub type StoreReconciler =
    Reconciler<Arc<MemoryCatalog>, Arc<MemoryCart>, Arc<MemoryCuratedList>>;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Reconcile(ReconcileEvent),
}

/// Terminal state of one submission, for operators. Never carries the
/// session identity itself, only its fingerprint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileEvent {
    /// "applied" | "rejected" | "unavailable" | "refused"
    pub outcome: String,
    pub session: String,
    pub reason: Option<String>,
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
    pub diffs: usize,
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time daemon status, returned by GET /v1/status.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub mode: String,
    pub config_hash: String,
    pub applied: u64,
    pub rejected: u64,
    pub unavailable: u64,
    pub refused: u64,
}

impl StatusSnapshot {
    pub fn record(&mut self, event: &ReconcileEvent) {
        match event.outcome.as_str() {
            "applied" => self.applied += 1,
            "rejected" => self.rejected += 1,
            "unavailable" => self.unavailable += 1,
            _ => self.refused += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Everything resolved at boot that the handlers need.
#[derive(Clone)]
pub struct DaemonSettings {
    pub mode: ConfigMode,
    pub config_hash: String,
    pub storefront: StorefrontSettings,
    /// Resolved token secret. Never logged.
    pub token_secret: String,
}

impl std::fmt::Debug for DaemonSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonSettings")
            .field("mode", &self.mode)
            .field("config_hash", &self.config_hash)
            .field("storefront", &self.storefront)
            .field("token_secret", &"<REDACTED>")
            .finish()
    }
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    pub mode: ConfigMode,
    pub storefront: StorefrontSettings,
    /// Built once; shared by every request.
    pub reconciler: Arc<StoreReconciler>,
    /// Handles to the same collaborators the reconciler uses.
    pub store: MemoryStore,
    pub status: Arc<RwLock<StatusSnapshot>>,
}

impl AppState {
    pub fn new(settings: DaemonSettings, store: MemoryStore) -> anyhow::Result<Self> {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let key = TokenKey::from_secret(&settings.token_secret).context("token key")?;
        let reconciler = Reconciler::new(
            SnapshotCodec::new(key),
            settings.storefront.step_policy,
            Arc::clone(&store.catalog),
            Arc::clone(&store.cart),
            Arc::clone(&store.curated),
        );

        let status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            mode: settings.mode.as_str().to_string(),
            config_hash: settings.config_hash.clone(),
            ..StatusSnapshot::default()
        };

        Ok(Self {
            bus,
            build: BuildInfo {
                service: "qbt-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            mode: settings.mode,
            storefront: settings.storefront,
            reconciler: Arc::new(reconciler),
            store,
            status: Arc::new(RwLock::new(status)),
        })
    }

    /// Count the event and push it to SSE subscribers.
    pub async fn publish(&self, event: ReconcileEvent) {
        self.status.write().await.record(&event);
        let _ = self.bus.send(BusMsg::Reconcile(event));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
