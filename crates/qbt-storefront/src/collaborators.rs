//! Collaborator contracts: catalog lookup, live cart and curated list.
//!
//! Declared `pub` so external crates provide implementations (in-memory for
//! dev and tests, a real store behind HTTP in production). The reconciler
//! never caches anything read through these traits across requests.

use std::collections::BTreeMap;

use qbt_reconcile::{CartLine, ProductId, Quantity};
use qbt_token::SessionIdentity;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Catalog types
// ---------------------------------------------------------------------------

/// Product category as attached by the catalog. `group == 0` marks the
/// category the store considers primary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub group: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductKind {
    Simple,
    /// Parent of a set of variants. Never added to the cart directly.
    Variable { children: Vec<ProductId> },
    Variant {
        parent_id: ProductId,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    /// Current display price (tax-adjusted as shown to the shopper), micros.
    pub display_price_micros: i64,
    #[serde(default = "default_true")]
    pub purchasable: bool,
    #[serde(default = "default_kind")]
    pub kind: ProductKind,
    #[serde(default)]
    pub categories: Vec<Category>,
}

fn default_true() -> bool {
    true
}

fn default_kind() -> ProductKind {
    ProductKind::Simple
}

impl Product {
    pub fn simple(id: ProductId, name: impl Into<String>, display_price_micros: i64) -> Self {
        Self {
            id,
            name: name.into(),
            sku: None,
            display_price_micros,
            purchasable: true,
            kind: ProductKind::Simple,
            categories: Vec::new(),
        }
    }

    pub fn is_purchasable(&self) -> bool {
        self.purchasable
    }

    pub fn is_variant(&self) -> bool {
        matches!(self.kind, ProductKind::Variant { .. })
    }

    pub fn parent_id(&self) -> Option<ProductId> {
        match &self.kind {
            ProductKind::Variant { parent_id, .. } => Some(*parent_id),
            _ => None,
        }
    }

    pub fn children_ids(&self) -> &[ProductId] {
        match &self.kind {
            ProductKind::Variable { children } => children,
            _ => &[],
        }
    }

    /// Variant attributes; empty for anything that is not a variant.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        match &self.kind {
            ProductKind::Variant { attributes, .. } => attributes.clone(),
            _ => BTreeMap::new(),
        }
    }

    /// Whether a positive quantity of this product may be put in the cart.
    pub fn is_orderable(&self) -> bool {
        self.purchasable && !matches!(self.kind, ProductKind::Variable { .. })
    }
}

/// Line to add to the live cart. Variants are added under their parent with
/// `variant_id` and `attributes` set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub variant_id: Option<ProductId>,
    pub attributes: BTreeMap<String, String>,
}

impl NewCartLine {
    /// Build the add-line request for `product`, resolving variants to
    /// parent + variant id.
    pub fn for_product(product: &Product, quantity: Quantity) -> Self {
        match &product.kind {
            ProductKind::Variant {
                parent_id,
                attributes,
            } => Self {
                product_id: *parent_id,
                quantity,
                variant_id: Some(product.id),
                attributes: attributes.clone(),
            },
            _ => Self {
                product_id: product.id,
                quantity,
                variant_id: None,
                attributes: BTreeMap::new(),
            },
        }
    }

    /// Id this line will count under in a snapshot.
    pub fn item_id(&self) -> ProductId {
        self.variant_id.unwrap_or(self.product_id)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    Catalog,
    Cart,
    CuratedList,
}

impl Collaborator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collaborator::Catalog => "catalog",
            Collaborator::Cart => "cart",
            Collaborator::CuratedList => "curated_list",
        }
    }
}

/// A collaborator could not be reached or refused the call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollaboratorError {
    pub collaborator: Collaborator,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        Self::new(Collaborator::Catalog, message)
    }

    pub fn cart(message: impl Into<String>) -> Self {
        Self::new(Collaborator::Cart, message)
    }

    pub fn curated_list(message: impl Into<String>) -> Self {
        Self::new(Collaborator::CuratedList, message)
    }
}

impl std::fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "COLLABORATOR_UNAVAILABLE collaborator={}: {}",
            self.collaborator.as_str(),
            self.message
        )
    }
}

impl std::error::Error for CollaboratorError {}

pub type CollabResult<T> = std::result::Result<T, CollaboratorError>;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Product lookup. `Ok(None)` is "not found"; `Err` is "catalog unreachable".
pub trait Catalog {
    fn get_product(&self, id: ProductId) -> CollabResult<Option<Product>>;
}

/// The shopper's live, shared, mutable cart.
///
/// Every call names the session whose cart is addressed, so one
/// implementation instance serves all shoppers.
pub trait LiveCart {
    fn list_lines(&self, session: &SessionIdentity) -> CollabResult<Vec<CartLine>>;
    fn set_quantity(
        &self,
        session: &SessionIdentity,
        line_key: &str,
        quantity: Quantity,
    ) -> CollabResult<()>;
    fn remove_line(&self, session: &SessionIdentity, line_key: &str) -> CollabResult<()>;
    /// Returns the key of the line holding the item afterwards.
    fn add_line(&self, session: &SessionIdentity, line: NewCartLine) -> CollabResult<String>;
}

/// The shopper's curated product list (the "order list" the form is built
/// from). Order is meaningful and preserved.
pub trait CuratedList {
    fn product_ids(&self, session: &SessionIdentity) -> CollabResult<Vec<ProductId>>;
    fn set_product_ids(&self, session: &SessionIdentity, ids: &[ProductId]) -> CollabResult<()>;
}

impl<T: Catalog + ?Sized> Catalog for std::sync::Arc<T> {
    fn get_product(&self, id: ProductId) -> CollabResult<Option<Product>> {
        (**self).get_product(id)
    }
}

impl<T: LiveCart + ?Sized> LiveCart for std::sync::Arc<T> {
    fn list_lines(&self, session: &SessionIdentity) -> CollabResult<Vec<CartLine>> {
        (**self).list_lines(session)
    }
    fn set_quantity(
        &self,
        session: &SessionIdentity,
        line_key: &str,
        quantity: Quantity,
    ) -> CollabResult<()> {
        (**self).set_quantity(session, line_key, quantity)
    }
    fn remove_line(&self, session: &SessionIdentity, line_key: &str) -> CollabResult<()> {
        (**self).remove_line(session, line_key)
    }
    fn add_line(&self, session: &SessionIdentity, line: NewCartLine) -> CollabResult<String> {
        (**self).add_line(session, line)
    }
}

impl<T: CuratedList + ?Sized> CuratedList for std::sync::Arc<T> {
    fn product_ids(&self, session: &SessionIdentity) -> CollabResult<Vec<ProductId>> {
        (**self).product_ids(session)
    }
    fn set_product_ids(&self, session: &SessionIdentity, ids: &[ProductId]) -> CollabResult<()> {
        (**self).set_product_ids(session, ids)
    }
}
