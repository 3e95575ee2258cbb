//! A simulated browser tab.
//!
//! `open` renders the form the way the daemon does and keeps it; `set`
//! edits a quantity input; `submit` posts the form through the same
//! boundary parser the daemon uses. The kept form goes stale as soon as
//! anything else touches the cart, which is the race under test.

use std::collections::BTreeMap;

use qbt_reconcile::ProductId;
use qbt_storefront::{
    parse_submission, Catalog, CuratedList, LiveCart, QuickOrderForm, ReconcileOutcome, Reconciler,
    StorefrontError, FIELD_ACTION, FIELD_CART_STATE, FIELD_CART_STATE_HASH, FIELD_NONCE,
};
use qbt_token::SessionIdentity;

/// Name/value pairs a browser would post for `form` with `quantities`.
pub fn form_pairs(form: &QuickOrderForm, quantities: &BTreeMap<ProductId, String>) -> Vec<(String, String)> {
    let h = &form.hidden;
    let mut pairs = vec![
        (FIELD_ACTION.to_string(), h.action.clone()),
        (FIELD_CART_STATE.to_string(), h.cart_state.clone()),
        (FIELD_CART_STATE_HASH.to_string(), h.cart_state_hash.clone()),
        (FIELD_NONCE.to_string(), h.nonce.clone()),
    ];
    for (id, raw) in quantities {
        pairs.push((format!("quantities[{id}]"), raw.clone()));
    }
    pairs
}

pub struct Shopper {
    pub session: SessionIdentity,
    pub form: QuickOrderForm,
    inputs: BTreeMap<ProductId, String>,
}

impl Shopper {
    /// Render the form for `session`. Inputs start empty: a row the shopper
    /// never touches is not posted.
    pub fn open<C, K, L>(
        reconciler: &Reconciler<C, K, L>,
        session: &SessionIdentity,
    ) -> Result<Self, StorefrontError>
    where
        C: Catalog,
        K: LiveCart,
        L: CuratedList,
    {
        Ok(Self {
            session: session.clone(),
            form: reconciler.render_form(session)?,
            inputs: BTreeMap::new(),
        })
    }

    /// Type `raw` into the quantity input for `id`.
    pub fn set(&mut self, id: ProductId, raw: &str) -> &mut Self {
        self.inputs.insert(id, raw.to_string());
        self
    }

    /// Overwrite a hidden field, as a tampering client would.
    pub fn tamper(&mut self, field: &str, value: &str) -> &mut Self {
        let h = &mut self.form.hidden;
        match field {
            FIELD_CART_STATE => h.cart_state = value.to_string(),
            FIELD_CART_STATE_HASH => h.cart_state_hash = value.to_string(),
            FIELD_NONCE => h.nonce = value.to_string(),
            _ => h.action = value.to_string(),
        }
        self
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        form_pairs(&self.form, &self.inputs)
    }

    /// Post the form. A malformed post would be a 400 at the daemon; here it
    /// cannot happen unless `tamper` broke the action, so it panics.
    pub fn submit<C, K, L>(
        &self,
        reconciler: &Reconciler<C, K, L>,
    ) -> Result<ReconcileOutcome, StorefrontError>
    where
        C: Catalog,
        K: LiveCart,
        L: CuratedList,
    {
        let submission = match parse_submission(self.pairs()) {
            Ok(s) => s,
            Err(e) => panic!("shopper posted a malformed form: {e}"),
        };
        reconciler.submit_form(&self.session, &submission)
    }
}
