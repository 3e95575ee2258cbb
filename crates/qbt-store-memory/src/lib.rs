//! Deterministic in-memory storefront collaborators.
//!
//! Design decisions (kept simple/deterministic):
//! - Line keys are `LINE-{seq:06}`, per session, starting at 1.
//! - `add_line` for an item that already has a line adds to that line and
//!   returns its key, the way a store cart merges identical items.
//! - No randomness. No timestamps. No IO except [`load_seed_json`].
//! - Every collaborator has an `unavailable` switch so callers can exercise
//!   the hard-failure path.
//!
//! Used by the daemon in DEV mode and by scenario tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Context, Result};
use qbt_reconcile::{CartLine, ProductId, Quantity};
use qbt_storefront::{
    Catalog, CollabResult, CollaboratorError, CuratedList, LiveCart, NewCartLine, Product,
};
use qbt_token::SessionIdentity;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    products: RwLock<BTreeMap<ProductId, Product>>,
    unavailable: AtomicBool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products<I: IntoIterator<Item = Product>>(products: I) -> Self {
        let cat = Self::new();
        for p in products {
            cat.insert(p);
        }
        cat
    }

    pub fn insert(&self, product: Product) {
        if let Ok(mut map) = self.products.write() {
            map.insert(product.id, product);
        }
    }

    /// Change a display price in place (e.g. a price rule kicking in between
    /// render and submission). Returns false for an unknown id.
    pub fn set_price(&self, id: ProductId, display_price_micros: i64) -> bool {
        let Ok(mut map) = self.products.write() else {
            return false;
        };
        match map.get_mut(&id) {
            Some(p) => {
                p.display_price_micros = display_price_micros;
                true
            }
            None => false,
        }
    }

    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }
}

impl Catalog for MemoryCatalog {
    fn get_product(&self, id: ProductId) -> CollabResult<Option<Product>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::catalog("memory catalog switched off"));
        }
        let map = self
            .products
            .read()
            .map_err(|_| CollaboratorError::catalog("catalog lock poisoned"))?;
        Ok(map.get(&id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Live cart
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
struct SessionCart {
    lines: Vec<CartLine>,
    next_seq: u64,
}

impl SessionCart {
    fn next_key(&mut self) -> String {
        self.next_seq += 1;
        format!("LINE-{:06}", self.next_seq)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCart {
    carts: Mutex<BTreeMap<String, SessionCart>>,
    unavailable: AtomicBool,
    mutations: std::sync::atomic::AtomicU64,
}

impl MemoryCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    /// Number of successful set/remove/add calls so far.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Put `quantity` of `item` into the cart outside any submission, the way
    /// another tab or a back-office process would. Quantity 0 removes.
    pub fn external_set(&self, session: &SessionIdentity, line: NewCartLine) -> CollabResult<()> {
        let mut carts = self.lock()?;
        let cart = carts.entry(session.as_str().to_string()).or_default();
        let item = line.item_id();
        if line.quantity == 0 {
            cart.lines.retain(|l| l.item_id() != item);
            return Ok(());
        }
        match cart.lines.iter_mut().find(|l| l.item_id() == item) {
            Some(l) => l.quantity = line.quantity,
            None => {
                let key = cart.next_key();
                cart.lines.push(to_cart_line(key, line));
            }
        }
        Ok(())
    }

    fn lock(&self) -> CollabResult<std::sync::MutexGuard<'_, BTreeMap<String, SessionCart>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::cart("memory cart switched off"));
        }
        self.carts
            .lock()
            .map_err(|_| CollaboratorError::cart("cart lock poisoned"))
    }

    fn bump(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

fn to_cart_line(line_key: String, line: NewCartLine) -> CartLine {
    CartLine {
        line_key,
        product_id: line.product_id,
        variant_id: line.variant_id,
        quantity: line.quantity,
    }
}

impl LiveCart for MemoryCart {
    fn list_lines(&self, session: &SessionIdentity) -> CollabResult<Vec<CartLine>> {
        let carts = self.lock()?;
        Ok(carts
            .get(session.as_str())
            .map(|c| c.lines.clone())
            .unwrap_or_default())
    }

    fn set_quantity(
        &self,
        session: &SessionIdentity,
        line_key: &str,
        quantity: Quantity,
    ) -> CollabResult<()> {
        let mut carts = self.lock()?;
        let line = carts
            .get_mut(session.as_str())
            .and_then(|c| c.lines.iter_mut().find(|l| l.line_key == line_key))
            .ok_or_else(|| CollaboratorError::cart(format!("no cart line {line_key}")))?;
        line.quantity = quantity;
        drop(carts);
        self.bump();
        Ok(())
    }

    fn remove_line(&self, session: &SessionIdentity, line_key: &str) -> CollabResult<()> {
        let mut carts = self.lock()?;
        if let Some(c) = carts.get_mut(session.as_str()) {
            c.lines.retain(|l| l.line_key != line_key);
        }
        drop(carts);
        self.bump();
        Ok(())
    }

    fn add_line(&self, session: &SessionIdentity, line: NewCartLine) -> CollabResult<String> {
        let mut carts = self.lock()?;
        let cart = carts.entry(session.as_str().to_string()).or_default();
        let item = line.item_id();
        let key = match cart.lines.iter_mut().find(|l| l.item_id() == item) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
                existing.line_key.clone()
            }
            None => {
                let key = cart.next_key();
                cart.lines.push(to_cart_line(key.clone(), line));
                key
            }
        };
        drop(carts);
        self.bump();
        Ok(key)
    }
}

// ---------------------------------------------------------------------------
// Curated list
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryCuratedList {
    lists: Mutex<BTreeMap<String, Vec<ProductId>>>,
    unavailable: AtomicBool,
}

impl MemoryCuratedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    fn lock(&self) -> CollabResult<std::sync::MutexGuard<'_, BTreeMap<String, Vec<ProductId>>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::curated_list("memory curated list switched off"));
        }
        self.lists
            .lock()
            .map_err(|_| CollaboratorError::curated_list("curated list lock poisoned"))
    }
}

impl CuratedList for MemoryCuratedList {
    fn product_ids(&self, session: &SessionIdentity) -> CollabResult<Vec<ProductId>> {
        Ok(self
            .lock()?
            .get(session.as_str())
            .cloned()
            .unwrap_or_default())
    }

    fn set_product_ids(&self, session: &SessionIdentity, ids: &[ProductId]) -> CollabResult<()> {
        self.lock()?
            .insert(session.as_str().to_string(), ids.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

/// JSON seed for a dev store.
///
/// ```json
/// {
///   "products": [{ "id": 101, "name": "House red", "display_price_micros": 9950000 }],
///   "curated": { "user:1": [101] },
///   "carts": { "user:1": [{ "product_id": 101, "quantity": 6 }] }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub curated: BTreeMap<String, Vec<ProductId>>,
    #[serde(default)]
    pub carts: BTreeMap<String, Vec<SeedLine>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<ProductId>,
    pub quantity: Quantity,
}

pub fn load_seed_json(path: impl AsRef<Path>) -> Result<StoreSeed> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).with_context(|| format!("read seed: {}", path.display()))?;
    let seed: StoreSeed = serde_json::from_str(&s).context("parse seed json")?;
    Ok(seed)
}

/// The three collaborators, shareable across request handlers.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    pub catalog: Arc<MemoryCatalog>,
    pub cart: Arc<MemoryCart>,
    pub curated: Arc<MemoryCuratedList>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from seed data. Blank session names are skipped.
    pub fn from_seed(seed: StoreSeed) -> Result<Self> {
        let store = Self::new();
        for p in seed.products {
            store.catalog.insert(p);
        }
        for (raw, ids) in seed.curated {
            let Some(session) = SessionIdentity::new(raw) else {
                continue;
            };
            store.curated.set_product_ids(&session, &ids)?;
        }
        for (raw, lines) in seed.carts {
            let Some(session) = SessionIdentity::new(raw) else {
                continue;
            };
            for l in lines {
                store.cart.external_set(
                    &session,
                    NewCartLine {
                        product_id: l.product_id,
                        quantity: l.quantity,
                        variant_id: l.variant_id,
                        attributes: BTreeMap::new(),
                    },
                )?;
            }
        }
        Ok(store)
    }
}
