//! Per-product apply planning.
//!
//! Apply uses absolute, idempotent upsert/remove semantics: re-planning the
//! same request against the cart it produced yields only `Unchanged` or
//! `SetQuantity` to the same value.

use crate::{CartLine, ProductId, Quantity};

/// Mutation the caller must perform on the live cart for one product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineMutation {
    /// No line yet and quantity > 0: add a new line.
    Insert { quantity: Quantity },
    /// Existing line and quantity > 0: overwrite (absolute, not increment).
    SetQuantity { line_key: String, quantity: Quantity },
    /// Existing line and quantity == 0: remove it.
    Remove { line_key: String },
    /// No line and quantity == 0.
    Unchanged,
}

impl LineMutation {
    pub fn is_noop(&self) -> bool {
        matches!(self, LineMutation::Unchanged)
    }
}

/// Locate the cart line for `item_id` (variant id for variants).
///
/// The first matching line wins, the same way the storefront cart resolves
/// an item to a single line key.
pub fn find_line(lines: &[CartLine], item_id: ProductId) -> Option<&CartLine> {
    lines.iter().find(|line| line.item_id() == item_id)
}

/// Decide the mutation for one product given its existing line (if any) and
/// the already-normalized requested quantity.
pub fn plan_line_mutation(existing: Option<&CartLine>, quantity: Quantity) -> LineMutation {
    match (existing, quantity) {
        (Some(line), 0) => LineMutation::Remove {
            line_key: line.line_key.clone(),
        },
        (Some(line), q) => LineMutation::SetQuantity {
            line_key: line.line_key.clone(),
            quantity: q,
        },
        (None, 0) => LineMutation::Unchanged,
        (None, q) => LineMutation::Insert { quantity: q },
    }
}
