use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Catalog identifier of a product or of a variant. Variants carry their own
/// id, never their parent's. `0` is never a valid id.
pub type ProductId = u64;

/// Cart quantity. Never negative by construction.
pub type Quantity = u64;

/// Normalized mapping of product id -> cart quantity at one point in time.
///
/// Invariants (upheld by every constructor):
/// - keys are strictly positive
/// - keys iterate in ascending order (BTreeMap), so serialization is stable
///
/// Zero quantities may be stored. Comparison treats a stored zero and an
/// absent key as the same thing (see [`crate::reconcile`]).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CartSnapshot {
    entries: BTreeMap<ProductId, Quantity>,
}

impl CartSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from untrusted `(id, quantity)` pairs.
    ///
    /// Ids <= 0 are dropped, negative quantities clamp to 0. When an id is
    /// repeated the last pair wins.
    pub fn from_raw<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let mut snap = Self::empty();
        for (id, qty) in pairs {
            if id <= 0 {
                continue;
            }
            snap.entries.insert(id as ProductId, qty.max(0) as Quantity);
        }
        snap
    }

    /// Build from already-typed entries. Id 0 is dropped.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ProductId, Quantity)>,
    {
        let mut snap = Self::empty();
        for (id, qty) in entries {
            snap.set(id, qty);
        }
        snap
    }

    /// Derive the snapshot of a live cart.
    ///
    /// Each line is keyed by its variant id when it has one, else by its
    /// product id. Lines that resolve to id 0 are skipped and quantities of
    /// lines sharing an id are summed.
    pub fn from_lines(lines: &[CartLine]) -> Self {
        let mut snap = Self::empty();
        for line in lines {
            let id = line.item_id();
            if id == 0 {
                continue;
            }
            let slot = snap.entries.entry(id).or_insert(0);
            *slot = slot.saturating_add(line.quantity);
        }
        snap
    }

    /// Set the quantity for `id`. Returns `false` (and stores nothing) for id 0.
    pub fn set(&mut self, id: ProductId, qty: Quantity) -> bool {
        if id == 0 {
            return false;
        }
        self.entries.insert(id, qty);
        true
    }

    /// Quantity held for `id`; absent ids read as 0.
    pub fn quantity_of(&self, id: ProductId) -> Quantity {
        self.entries.get(&id).copied().unwrap_or(0)
    }

    pub fn contains(&self, id: ProductId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductId, Quantity)> + '_ {
        self.entries.iter().map(|(id, qty)| (*id, *qty))
    }

    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.entries.keys().copied()
    }

    pub fn entries(&self) -> &BTreeMap<ProductId, Quantity> {
        &self.entries
    }
}

/// One line of the live cart as reported by the cart collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Opaque key the cart uses to address this line.
    pub line_key: String,
    /// Product id, or the parent product id for a variant line.
    pub product_id: ProductId,
    /// Variant id for variant lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<ProductId>,
    pub quantity: Quantity,
}

impl CartLine {
    pub fn new(line_key: impl Into<String>, product_id: ProductId, quantity: Quantity) -> Self {
        Self {
            line_key: line_key.into(),
            product_id,
            variant_id: None,
            quantity,
        }
    }

    pub fn variant(
        line_key: impl Into<String>,
        parent_id: ProductId,
        variant_id: ProductId,
        quantity: Quantity,
    ) -> Self {
        Self {
            line_key: line_key.into(),
            product_id: parent_id,
            variant_id: Some(variant_id),
            quantity,
        }
    }

    /// The id this line counts under in a [`CartSnapshot`].
    pub fn item_id(&self) -> ProductId {
        match self.variant_id {
            Some(v) if v > 0 => v,
            _ => self.product_id,
        }
    }
}

/// What the engine tells the caller to do with a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    Clean,
    Blocked,
}

/// Why a submission was blocked. Stable ordering enforced by engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileReason {
    /// Render-time snapshot failed verification or was missing.
    UntrustedSnapshot,
    /// Render-time snapshot differs from the live cart.
    CartChanged,
}

impl ReconcileReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileReason::UntrustedSnapshot => "untrusted or missing snapshot",
            ReconcileReason::CartChanged => "cart changed concurrently",
        }
    }
}

impl std::fmt::Display for ReconcileReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence of a mismatch.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileDiff {
    QuantityMismatch {
        product_id: ProductId,
        rendered_qty: Quantity,
        live_qty: Quantity,
    },
}

/// Full report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub action: ReconcileAction,
    pub reasons: Vec<ReconcileReason>,
    pub diffs: Vec<ReconcileDiff>,
}

impl ReconcileReport {
    pub fn clean() -> Self {
        Self {
            action: ReconcileAction::Clean,
            reasons: Vec::new(),
            diffs: Vec::new(),
        }
    }

    /// Report for a snapshot that could not be trusted. Carries no diffs:
    /// nothing is known about what the shopper saw.
    pub fn untrusted() -> Self {
        Self {
            action: ReconcileAction::Blocked,
            reasons: vec![ReconcileReason::UntrustedSnapshot],
            diffs: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.action == ReconcileAction::Clean
    }
}
