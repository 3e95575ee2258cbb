use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use qbt_reconcile::{CartSnapshot, ProductId, Quantity, StepPolicy, MICROS_PER_UNIT};
use qbt_store_memory::{MemoryCart, MemoryCatalog, MemoryCuratedList, MemoryStore, StoreSeed};
use qbt_storefront::{
    Catalog, Category, CuratedList, LiveCart, NewCartLine, Product, ProductKind, Reconciler,
};
use qbt_token::{SessionIdentity, SnapshotCodec, TokenKey};

/// Key material for every reconciler the kit builds.
pub const TEST_SECRET: &str = "qbt-testkit-secret-0123456789abcdef";

pub type ShopReconciler = Reconciler<Arc<MemoryCatalog>, Arc<MemoryCart>, Arc<MemoryCuratedList>>;

/// Non-blank session identity for tests.
pub fn session(raw: &str) -> SessionIdentity {
    match SessionIdentity::new(raw) {
        Some(s) => s,
        None => panic!("test session must not be blank: {raw:?}"),
    }
}

fn price(major: i64, cents: i64) -> i64 {
    major * MICROS_PER_UNIT + cents * (MICROS_PER_UNIT / 100)
}

fn category(id: u64, name: &str) -> Category {
    Category {
        id,
        name: name.to_string(),
        group: 0,
    }
}

fn in_category(mut p: Product, c: &Category) -> Product {
    p.categories.push(c.clone());
    p
}

/// A small wine shop. With the default step policy (threshold 20.00,
/// batch 6) only 102 "House red" sells in batches.
///
/// | id  | name          | price | notes                      |
/// |-----|---------------|-------|----------------------------|
/// | 101 | Reserve Rioja | 24.00 |                            |
/// | 102 | House red     |  9.95 | step 6                     |
/// | 201 | Crémant       | 21.00 |                            |
/// | 202 | Champagne     | 35.00 |                            |
/// | 300 | Estate white  | 18.00 | variable: 301, 302         |
/// | 301 | (0.75l)       | 18.00 | variant of 300, step 6     |
/// | 302 | (1.5l)        | 34.00 | variant of 300             |
/// | 400 | Gift card     | 25.00 | not purchasable            |
pub fn sample_products() -> Vec<Product> {
    let red = category(10, "Red wine");
    let sparkling = category(20, "Sparkling");
    let white = category(30, "White wine");

    let variant = |id: ProductId, size: &str, micros: i64| Product {
        kind: ProductKind::Variant {
            parent_id: 300,
            attributes: BTreeMap::from([("size".to_string(), size.to_string())]),
        },
        ..Product::simple(id, format!("Estate white {size}"), micros)
    };

    let mut gift = Product::simple(400, "Gift card", price(25, 0));
    gift.purchasable = false;

    vec![
        in_category(Product::simple(101, "Reserve Rioja", price(24, 0)), &red),
        in_category(Product::simple(102, "House red", price(9, 95)), &red),
        in_category(Product::simple(201, "Crémant", price(21, 0)), &sparkling),
        in_category(Product::simple(202, "Champagne", price(35, 0)), &sparkling),
        in_category(
            Product {
                kind: ProductKind::Variable {
                    children: vec![301, 302],
                },
                ..Product::simple(300, "Estate white", price(18, 0))
            },
            &white,
        ),
        variant(301, "0.75l", price(18, 0)),
        variant(302, "1.5l", price(34, 0)),
        gift,
    ]
}

/// In-memory shop plus the policy and key its reconcilers use.
pub struct TestShop {
    pub store: MemoryStore,
    pub policy: StepPolicy,
}

impl Default for TestShop {
    fn default() -> Self {
        Self::new()
    }
}

impl TestShop {
    /// Shop stocked with [`sample_products`].
    pub fn new() -> Self {
        Self::with_products(sample_products())
    }

    pub fn with_products<I: IntoIterator<Item = Product>>(products: I) -> Self {
        let store = MemoryStore::new();
        for p in products {
            store.catalog.insert(p);
        }
        Self {
            store,
            policy: StepPolicy::default(),
        }
    }

    pub fn from_seed(seed: StoreSeed) -> Result<Self> {
        Ok(Self {
            store: MemoryStore::from_seed(seed)?,
            policy: StepPolicy::default(),
        })
    }

    pub fn codec(&self) -> Result<SnapshotCodec> {
        Ok(SnapshotCodec::new(TokenKey::from_secret(TEST_SECRET)?))
    }

    /// Reconciler over the shop's own collaborators.
    pub fn reconciler(&self) -> Result<ShopReconciler> {
        self.reconciler_with_cart(Arc::clone(&self.store.cart))
    }

    /// Same, with a substitute live cart (e.g. [`crate::FlakyCart`]).
    pub fn reconciler_with_cart<K: LiveCart>(
        &self,
        cart: K,
    ) -> Result<Reconciler<Arc<MemoryCatalog>, K, Arc<MemoryCuratedList>>> {
        Ok(Reconciler::new(
            self.codec()?,
            self.policy,
            Arc::clone(&self.store.catalog),
            cart,
            Arc::clone(&self.store.curated),
        ))
    }

    /// Put `quantity` of `id` in the cart from outside any submission, as
    /// another tab would. Variants land under their parent.
    pub fn put_in_cart(&self, s: &SessionIdentity, id: ProductId, quantity: Quantity) -> Result<()> {
        let line = match self.store.catalog.get_product(id)? {
            Some(p) => NewCartLine::for_product(&p, quantity),
            None => NewCartLine {
                product_id: id,
                quantity,
                variant_id: None,
                attributes: BTreeMap::new(),
            },
        };
        self.store
            .cart
            .external_set(s, line)
            .with_context(|| format!("put {id} in cart"))
    }

    pub fn curate(&self, s: &SessionIdentity, ids: &[ProductId]) -> Result<()> {
        Ok(self.store.curated.set_product_ids(s, ids)?)
    }

    pub fn curated_ids(&self, s: &SessionIdentity) -> Result<Vec<ProductId>> {
        Ok(self.store.curated.product_ids(s)?)
    }

    /// Live snapshot as the reconciler would read it.
    pub fn live(&self, s: &SessionIdentity) -> Result<CartSnapshot> {
        Ok(CartSnapshot::from_lines(&self.store.cart.list_lines(s)?))
    }
}
