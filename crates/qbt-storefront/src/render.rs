//! Render model of the quick order form.
//!
//! Produces everything a template needs (rows, groups, hidden fields) and
//! nothing presentational. Markup, labels in other languages and assets are
//! the caller's business.

use std::collections::{BTreeMap, BTreeSet};

use qbt_reconcile::{CartSnapshot, ProductId, Quantity};
use qbt_token::nonce::UPDATE_CART_ACTION;
use qbt_token::SessionIdentity;
use serde::Serialize;
use tracing::debug;

use crate::curated::dedup_ids;
use crate::{Catalog, Category, CuratedList, LiveCart, Product, Reconciler, StorefrontError};

pub const CART_GROUP_LABEL: &str = "In your cart";
pub const FALLBACK_GROUP_LABEL: &str = "Other products";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormRow {
    pub product_id: ProductId,
    /// Display name; the parent's name for a variant.
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub sku: Option<String>,
    pub price_micros: i64,
    pub step: u64,
    pub cart_quantity: Quantity,
    pub in_cart: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormGroup {
    pub label: String,
    pub is_cart: bool,
    pub rows: Vec<FormRow>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HiddenFields {
    pub action: String,
    pub cart_state: String,
    pub cart_state_hash: String,
    pub nonce: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuickOrderForm {
    pub groups: Vec<FormGroup>,
    pub hidden: HiddenFields,
    pub is_empty: bool,
}

impl QuickOrderForm {
    pub fn rows(&self) -> impl Iterator<Item = &FormRow> + '_ {
        self.groups.iter().flat_map(|g| g.rows.iter())
    }
}

impl<C, K, L> Reconciler<C, K, L>
where
    C: Catalog,
    K: LiveCart,
    L: CuratedList,
{
    /// Build the form for `session` with a fresh snapshot token.
    pub fn render_form(&self, session: &SessionIdentity) -> Result<QuickOrderForm, StorefrontError> {
        let lines = self.cart().list_lines(session)?;
        let live = CartSnapshot::from_lines(&lines);
        let token = self.codec().encode(&live, session)?;
        let hidden = HiddenFields {
            action: UPDATE_CART_ACTION.to_string(),
            cart_state: token.payload,
            cart_state_hash: token.tag,
            nonce: self.codec().issue_nonce(session),
        };

        let mut products: Vec<Product> = Vec::new();
        let mut seen: BTreeSet<ProductId> = BTreeSet::new();

        for id in dedup_ids(&self.curated().product_ids(session)?) {
            match self.catalog().get_product(id)? {
                Some(p) if p.is_purchasable() => {
                    seen.insert(p.id);
                    products.push(p);
                }
                _ => debug!(product_id = id, "curated product missing or not purchasable"),
            }
        }

        // Cart-only products: in the cart but not on the list.
        for (id, qty) in live.iter() {
            if qty == 0 || seen.contains(&id) {
                continue;
            }
            if let Some(p) = self.catalog().get_product(id)? {
                seen.insert(p.id);
                products.push(p);
            }
        }

        if products.is_empty() {
            return Ok(QuickOrderForm {
                groups: Vec::new(),
                hidden,
                is_empty: true,
            });
        }

        let mut by_category: BTreeMap<u64, FormGroup> = BTreeMap::new();
        for product in &products {
            let display = match product.parent_id() {
                Some(parent) => self.catalog().get_product(parent)?,
                None => None,
            };
            let display = display.as_ref().unwrap_or(product);

            let (cat_id, label) = match primary_category(&display.categories) {
                Some(c) => (c.id, c.name.clone()),
                None => (0, FALLBACK_GROUP_LABEL.to_string()),
            };
            let cart_quantity = cart_quantity_for(product, &live);

            by_category
                .entry(cat_id)
                .or_insert_with(|| FormGroup {
                    label,
                    is_cart: false,
                    rows: Vec::new(),
                })
                .rows
                .push(FormRow {
                    product_id: product.id,
                    name: display.name.clone(),
                    attributes: product.attributes(),
                    sku: product.sku.clone(),
                    price_micros: product.display_price_micros,
                    step: self.policy().step_for_price(product.display_price_micros),
                    cart_quantity,
                    in_cart: cart_quantity > 0,
                });
        }

        let mut groups: Vec<FormGroup> = by_category.into_values().collect();
        groups.sort_by_key(|g| g.label.to_lowercase());

        Ok(QuickOrderForm {
            groups: elevate_cart_rows(groups),
            hidden,
            is_empty: false,
        })
    }
}

/// First category with group 0, else the first one.
fn primary_category(categories: &[Category]) -> Option<&Category> {
    categories
        .iter()
        .find(|c| c.group == 0)
        .or_else(|| categories.first())
}

/// Own quantity when the cart holds the item; a variable product sums its
/// children.
fn cart_quantity_for(product: &Product, live: &CartSnapshot) -> Quantity {
    if live.contains(product.id) {
        return live.quantity_of(product.id);
    }
    product
        .children_ids()
        .iter()
        .map(|c| live.quantity_of(*c))
        .fold(0, Quantity::saturating_add)
}

/// Sort rows by name, then lift in-cart rows into a leading group and drop
/// groups left empty.
fn elevate_cart_rows(groups: Vec<FormGroup>) -> Vec<FormGroup> {
    let mut cart_rows: Vec<FormRow> = Vec::new();
    let mut rest: Vec<FormGroup> = Vec::new();

    for mut group in groups {
        group.rows.sort_by_key(|r| r.name.to_lowercase());
        let (in_cart, remaining): (Vec<FormRow>, Vec<FormRow>) =
            group.rows.into_iter().partition(|r| r.in_cart);
        cart_rows.extend(in_cart);
        if !remaining.is_empty() {
            group.rows = remaining;
            rest.push(group);
        }
    }

    let mut out = Vec::with_capacity(rest.len() + 1);
    if !cart_rows.is_empty() {
        cart_rows.sort_by_key(|r| r.name.to_lowercase());
        out.push(FormGroup {
            label: CART_GROUP_LABEL.to_string(),
            is_cart: true,
            rows: cart_rows,
        });
    }
    out.extend(rest);
    out
}
