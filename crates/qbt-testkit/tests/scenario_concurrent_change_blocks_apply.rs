//! Scenario: the render-time snapshot guards every mutation
//!
//! GREEN when:
//! 1. A cart changed by another tab after render ({101:2} -> {101:3}) makes
//!    a submission of {101:5} come back Rejected(CartChanged) with the live
//!    cart still at {101:3} and zero cart mutations.
//! 2. Re-rendering picks up the new state and the same edit then applies.
//! 3. A tampered token is Rejected(UntrustedSnapshot) before the cart is read.
//! 4. A form rendered for one session cannot be replayed by another.

use qbt_reconcile::{CartSnapshot, ReconcileDiff, ReconcileReason};
use qbt_storefront::{ReconcileOutcome, StorefrontError, FIELD_CART_STATE};
use qbt_testkit::{session, Shopper, TestShop};

#[test]
fn changed_cart_blocks_and_rerender_recovers() -> anyhow::Result<()> {
    let shop = TestShop::new();
    let s = session("user:race-1");
    shop.put_in_cart(&s, 101, 2)?;
    let r = shop.reconciler()?;

    let mut tab = Shopper::open(&r, &s)?;
    tab.set(101, "5");

    // Second tab bumps the quantity.
    shop.put_in_cart(&s, 101, 3)?;
    let before = shop.store.cart.mutation_count();

    let outcome = tab.submit(&r)?;
    let ReconcileOutcome::Rejected { reason, report } = outcome else {
        panic!("expected Rejected, got {outcome:?}");
    };
    assert_eq!(reason, ReconcileReason::CartChanged);
    assert_eq!(
        report.diffs,
        vec![ReconcileDiff::QuantityMismatch {
            product_id: 101,
            rendered_qty: 2,
            live_qty: 3,
        }]
    );
    assert_eq!(shop.live(&s)?, CartSnapshot::from_entries([(101, 3)]));
    assert_eq!(shop.store.cart.mutation_count(), before);

    // Fresh form, same intent.
    let mut tab = Shopper::open(&r, &s)?;
    tab.set(101, "5");
    assert!(tab.submit(&r)?.is_applied());
    assert_eq!(shop.live(&s)?, CartSnapshot::from_entries([(101, 5)]));
    Ok(())
}

#[test]
fn tampered_token_is_untrusted() -> anyhow::Result<()> {
    let shop = TestShop::new();
    let s = session("user:race-2");
    shop.put_in_cart(&s, 101, 2)?;
    let r = shop.reconciler()?;

    let mut tab = Shopper::open(&r, &s)?;
    // Claim the cart was empty when rendered.
    let forged = r.codec().encode(&CartSnapshot::empty(), &session("user:other"))?;
    tab.tamper(FIELD_CART_STATE, &forged.payload).set(202, "1");

    let outcome = tab.submit(&r)?;
    let ReconcileOutcome::Rejected { reason, report } = outcome else {
        panic!("expected Rejected, got {outcome:?}");
    };
    assert_eq!(reason, ReconcileReason::UntrustedSnapshot);
    assert!(report.diffs.is_empty());
    assert_eq!(shop.store.cart.mutation_count(), 0);
    Ok(())
}

#[test]
fn untrusted_token_wins_over_a_down_cart() -> anyhow::Result<()> {
    let shop = TestShop::new();
    let s = session("user:race-3");
    let r = shop.reconciler()?;
    let mut tab = Shopper::open(&r, &s)?;
    tab.tamper(FIELD_CART_STATE, "not-base64!");

    shop.store.cart.set_unavailable(true);
    // The token is checked first, so the down cart is never consulted.
    assert!(tab.submit(&r)?.is_rejected());
    Ok(())
}

#[test]
fn form_is_bound_to_its_session() -> anyhow::Result<()> {
    let shop = TestShop::new();
    let alice = session("user:alice");
    let bob = session("user:bob");
    let r = shop.reconciler()?;

    let mut tab = Shopper::open(&r, &alice)?;
    tab.set(202, "1");
    tab.session = bob.clone();

    // Bob's session fails the nonce before the token is even decoded.
    assert!(matches!(tab.submit(&r), Err(StorefrontError::BadNonce)));

    // With a valid nonce for Bob, the token itself is still Alice's.
    tab.form.hidden.nonce = r.codec().issue_nonce(&bob);
    let outcome = tab.submit(&r)?;
    assert!(outcome.is_rejected(), "{outcome:?}");
    assert!(shop.live(&bob)?.is_empty());
    Ok(())
}
