use std::collections::BTreeSet;

use crate::{
    CartSnapshot, ProductId, ReconcileAction, ReconcileDiff, ReconcileReason, ReconcileReport,
};

/// Deterministic reconciliation of the render-time snapshot against the
/// live cart:
/// - any product whose quantity differs => BLOCKED (cart changed)
/// - an id missing on one side reads as quantity 0, so `{102: 0}` and an
///   absent 102 are equal
pub fn reconcile(rendered: &CartSnapshot, live: &CartSnapshot) -> ReconcileReport {
    let mut diffs: Vec<ReconcileDiff> = Vec::new();

    // Compare union of ids deterministically.
    let ids: BTreeSet<ProductId> = rendered.product_ids().chain(live.product_ids()).collect();

    for product_id in ids {
        let rendered_qty = rendered.quantity_of(product_id);
        let live_qty = live.quantity_of(product_id);
        if rendered_qty != live_qty {
            diffs.push(ReconcileDiff::QuantityMismatch {
                product_id,
                rendered_qty,
                live_qty,
            });
        }
    }

    if diffs.is_empty() {
        return ReconcileReport::clean();
    }

    diffs.sort();
    ReconcileReport {
        action: ReconcileAction::Blocked,
        reasons: vec![ReconcileReason::CartChanged],
        diffs,
    }
}

/// Gate for cart mutation: must be a clean reconcile.
pub fn is_clean_reconcile(rendered: &CartSnapshot, live: &CartSnapshot) -> bool {
    reconcile(rendered, live).is_clean()
}
