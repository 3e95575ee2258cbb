//! Curated list upkeep.

use qbt_reconcile::ProductId;

/// Append `additions` to `existing`, skipping ids already present, zero ids
/// and repeats within `additions`. Existing order is preserved.
///
/// Returns `None` when nothing would change, so callers can skip the write.
pub fn merge_curated(existing: &[ProductId], additions: &[ProductId]) -> Option<Vec<ProductId>> {
    let mut merged: Vec<ProductId> = existing.to_vec();
    let mut changed = false;
    for &id in additions {
        if id == 0 || merged.contains(&id) {
            continue;
        }
        merged.push(id);
        changed = true;
    }
    changed.then_some(merged)
}

/// Deduplicate a stored list, keeping first occurrences and dropping zeros.
pub fn dedup_ids(ids: &[ProductId]) -> Vec<ProductId> {
    let mut out: Vec<ProductId> = Vec::with_capacity(ids.len());
    for &id in ids {
        if id != 0 && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
