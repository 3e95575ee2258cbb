//! Live cart that fails once a mutation budget is spent.
//!
//! Reads always delegate. The `n`th and later mutations return
//! `COLLABORATOR_UNAVAILABLE` without touching the inner cart, which models
//! a cart backend dropping out halfway through a batch.

use std::sync::atomic::{AtomicU64, Ordering};

use qbt_reconcile::{CartLine, Quantity};
use qbt_storefront::{CollabResult, CollaboratorError, LiveCart, NewCartLine};
use qbt_token::SessionIdentity;

pub struct FlakyCart<K: LiveCart> {
    inner: K,
    budget: AtomicU64,
}

impl<K: LiveCart> FlakyCart<K> {
    /// Allow `mutations` successful calls, then fail.
    pub fn new(inner: K, mutations: u64) -> Self {
        Self {
            inner,
            budget: AtomicU64::new(mutations),
        }
    }

    fn spend(&self) -> CollabResult<()> {
        self.budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| b.checked_sub(1))
            .map(|_| ())
            .map_err(|_| CollaboratorError::cart("flaky cart: backend went away"))
    }
}

impl<K: LiveCart> LiveCart for FlakyCart<K> {
    fn list_lines(&self, session: &SessionIdentity) -> CollabResult<Vec<CartLine>> {
        self.inner.list_lines(session)
    }

    fn set_quantity(
        &self,
        session: &SessionIdentity,
        line_key: &str,
        quantity: Quantity,
    ) -> CollabResult<()> {
        self.spend()?;
        self.inner.set_quantity(session, line_key, quantity)
    }

    fn remove_line(&self, session: &SessionIdentity, line_key: &str) -> CollabResult<()> {
        self.spend()?;
        self.inner.remove_line(session, line_key)
    }

    fn add_line(&self, session: &SessionIdentity, line: NewCartLine) -> CollabResult<String> {
        self.spend()?;
        self.inner.add_line(session, line)
    }
}
