//! Reconciler: gate cart mutation behind the snapshot compare, then apply.
//!
//! Per submission (nothing persisted across requests):
//!
//! ```text
//! Start ──► Validate token ──Invalid──────────────► Rejected(UntrustedSnapshot)
//!                │
//!                ▼
//!           Fetch live cart ──Err─────────────────► Unavailable (no compare)
//!                │
//!                ▼
//!           Compare ──mismatch────────────────────► Rejected(CartChanged)
//!                │
//!                ▼
//!           Apply (per product, independent) ─Err─► Unavailable (partial apply stays)
//!                │
//!                ▼
//!             Applied ──► curated list upkeep (best effort)
//! ```
//!
//! No cart mutation can happen before the gate returns `Permitted`.

use qbt_reconcile::{
    check_submission_gate, find_line, normalize_quantity, parse_raw_quantity, plan_line_mutation,
    CartSnapshot, LineMutation, ProductId, ReconcileReason, ReconcileReport, StepPolicy,
    SubmissionGate,
};
use qbt_token::{SessionIdentity, SnapshotCodec};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::curated::merge_curated;
use crate::submission::QuickOrderSubmission;
use crate::{Catalog, CuratedList, LiveCart, NewCartLine, StorefrontError};

// ---------------------------------------------------------------------------
// Request / outcome types
// ---------------------------------------------------------------------------

/// Requested raw quantities keyed by product id, in form order. Untrusted;
/// never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuantityRequest {
    entries: Vec<(ProductId, String)>,
}

impl QuantityRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repeated id replaces the earlier value but keeps its first
    /// position. Id 0 is ignored.
    pub fn insert(&mut self, product_id: ProductId, raw: impl Into<String>) {
        if product_id == 0 {
            return;
        }
        let raw = raw.into();
        match self.entries.iter_mut().find(|(id, _)| *id == product_id) {
            Some((_, slot)) => *slot = raw,
            None => self.entries.push((product_id, raw)),
        }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (ProductId, S)>,
        S: Into<String>,
    {
        let mut req = Self::new();
        for (id, raw) in pairs {
            req.insert(id, raw);
        }
        req
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductId, &str)> + '_ {
        self.entries.iter().map(|(id, raw)| (*id, raw.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Id did not resolve in the catalog.
    UnknownProduct,
    /// Positive quantity for a product that cannot be put in the cart
    /// (not purchasable, or a variable parent).
    NotOrderable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedProduct {
    pub product_id: ProductId,
    pub reason: SkipReason,
}

/// What Apply did. Skips never demote the outcome.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub inserted: Vec<ProductId>,
    pub updated: Vec<ProductId>,
    pub removed: Vec<ProductId>,
    pub unchanged: usize,
    pub skipped: Vec<SkippedProduct>,
    /// Products left with a positive quantity, in request order.
    pub ordered: Vec<ProductId>,
}

impl ApplyReport {
    pub fn mutation_count(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.removed.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Changes committed; proceed to checkout.
    Applied(ApplyReport),
    /// Nothing touched; re-render and tell the shopper the cart changed.
    Rejected {
        reason: ReconcileReason,
        report: ReconcileReport,
    },
}

impl ReconcileOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ReconcileOutcome::Rejected { .. })
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Constructed once per process with its collaborators and shared by all
/// requests.
pub struct Reconciler<C, K, L>
where
    C: Catalog,
    K: LiveCart,
    L: CuratedList,
{
    codec: SnapshotCodec,
    policy: StepPolicy,
    catalog: C,
    cart: K,
    curated: L,
}

impl<C, K, L> Reconciler<C, K, L>
where
    C: Catalog,
    K: LiveCart,
    L: CuratedList,
{
    pub fn new(codec: SnapshotCodec, policy: StepPolicy, catalog: C, cart: K, curated: L) -> Self {
        Self {
            codec,
            policy,
            catalog,
            cart,
            curated,
        }
    }

    pub fn codec(&self) -> &SnapshotCodec {
        &self.codec
    }

    pub fn policy(&self) -> StepPolicy {
        self.policy
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn cart(&self) -> &K {
        &self.cart
    }

    pub fn curated(&self) -> &L {
        &self.curated
    }

    /// Live snapshot for `session`, read fresh from the cart.
    pub fn live_snapshot(&self, session: &SessionIdentity) -> Result<CartSnapshot, StorefrontError> {
        let lines = self.cart.list_lines(session)?;
        Ok(CartSnapshot::from_lines(&lines))
    }

    /// Boundary entry point: nonce first, then [`Reconciler::submit`].
    pub fn submit_form(
        &self,
        session: &SessionIdentity,
        form: &QuickOrderSubmission,
    ) -> Result<ReconcileOutcome, StorefrontError> {
        if !self.codec.verify_nonce(&form.nonce, session) {
            warn!(session = %session.fingerprint(), "quick order nonce refused");
            return Err(StorefrontError::BadNonce);
        }
        self.submit(session, &form.cart_state, &form.cart_state_hash, &form.quantities)
    }

    /// Run one submission through validate → compare → apply.
    ///
    /// Only collaborator failures are errors; untrusted tokens and
    /// concurrent changes come back as [`ReconcileOutcome::Rejected`].
    pub fn submit(
        &self,
        session: &SessionIdentity,
        token_payload: &str,
        token_tag: &str,
        request: &QuantityRequest,
    ) -> Result<ReconcileOutcome, StorefrontError> {
        let fp = session.fingerprint();

        let rendered = match self.codec.decode(token_payload, token_tag, session) {
            Ok(s) => s,
            Err(invalid) => {
                info!(
                    session = %fp,
                    reason = %ReconcileReason::UntrustedSnapshot,
                    detail = invalid.reason.as_str(),
                    "quick order rejected"
                );
                return Ok(ReconcileOutcome::Rejected {
                    reason: ReconcileReason::UntrustedSnapshot,
                    report: ReconcileReport::untrusted(),
                });
            }
        };

        let lines = match self.cart.list_lines(session) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(session = %fp, error = %e, "quick order unavailable");
                return Err(e.into());
            }
        };
        let live = CartSnapshot::from_lines(&lines);

        if let SubmissionGate::Blocked { report } = check_submission_gate(Some(&rendered), &live) {
            let reason = report
                .reasons
                .first()
                .copied()
                .unwrap_or(ReconcileReason::CartChanged);
            info!(
                session = %fp,
                reason = %reason,
                diffs = report.diffs.len(),
                "quick order rejected"
            );
            return Ok(ReconcileOutcome::Rejected { reason, report });
        }

        let mut applied = ApplyReport::default();
        for (product_id, raw) in request.iter() {
            if let Err(e) = self.apply_one(session, &lines, product_id, raw, &mut applied) {
                warn!(
                    session = %fp,
                    product_id,
                    applied = applied.mutation_count(),
                    error = %e,
                    "quick order unavailable mid-apply"
                );
                return Err(e.into());
            }
        }

        info!(
            session = %fp,
            inserted = applied.inserted.len(),
            updated = applied.updated.len(),
            removed = applied.removed.len(),
            unchanged = applied.unchanged,
            skipped = applied.skipped.len(),
            "quick order applied"
        );

        self.keep_curated_list(session, &applied.ordered);

        Ok(ReconcileOutcome::Applied(applied))
    }

    fn apply_one(
        &self,
        session: &SessionIdentity,
        lines: &[qbt_reconcile::CartLine],
        product_id: ProductId,
        raw: &str,
        applied: &mut ApplyReport,
    ) -> Result<(), crate::CollaboratorError> {
        let Some(product) = self.catalog.get_product(product_id)? else {
            warn!(product_id, "unknown product in quick order; skipped");
            applied.skipped.push(SkippedProduct {
                product_id,
                reason: SkipReason::UnknownProduct,
            });
            return Ok(());
        };

        // Step follows the price shown now, not the price at render time.
        let step = self.policy.step_for_price(product.display_price_micros);
        let quantity = normalize_quantity(parse_raw_quantity(raw), step);

        if quantity > 0 && !product.is_orderable() {
            warn!(product_id, "product not orderable; skipped");
            applied.skipped.push(SkippedProduct {
                product_id,
                reason: SkipReason::NotOrderable,
            });
            return Ok(());
        }

        let existing = find_line(lines, product.id);
        match plan_line_mutation(existing, quantity) {
            LineMutation::Insert { quantity } => {
                self.cart
                    .add_line(session, NewCartLine::for_product(&product, quantity))?;
                applied.inserted.push(product_id);
            }
            LineMutation::SetQuantity { line_key, quantity } => {
                if existing.map(|l| l.quantity) == Some(quantity) {
                    applied.unchanged += 1;
                } else {
                    self.cart.set_quantity(session, &line_key, quantity)?;
                    applied.updated.push(product_id);
                }
            }
            LineMutation::Remove { line_key } => {
                self.cart.remove_line(session, &line_key)?;
                applied.removed.push(product_id);
            }
            LineMutation::Unchanged => applied.unchanged += 1,
        }

        if quantity > 0 {
            applied.ordered.push(product.id);
        }
        debug!(product_id, step, quantity, "quick order line applied");
        Ok(())
    }

    /// Append ordered products to the curated list. Failures are logged and
    /// never undo or demote an applied submission.
    fn keep_curated_list(&self, session: &SessionIdentity, ordered: &[ProductId]) {
        if ordered.is_empty() {
            return;
        }
        let existing = match self.curated.product_ids(session) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(session = %session.fingerprint(), error = %e, "curated list read failed");
                return;
            }
        };
        if let Some(merged) = merge_curated(&existing, ordered) {
            if let Err(e) = self.curated.set_product_ids(session, &merged) {
                warn!(session = %session.fingerprint(), error = %e, "curated list write failed");
            }
        }
    }
}
