//! Scenario: form rendering
//!
//! GREEN when:
//! 1. Rows come from the curated list plus products only in the cart;
//!    unpurchasable and missing curated ids are dropped.
//! 2. Rows are grouped by primary category, groups sorted by label, and
//!    everything already in the cart is lifted into a leading group.
//! 3. Variants display under their parent's name and category with their
//!    own attributes; a variable parent shows the sum of its variants.
//! 4. An empty list and empty cart render as an empty form that still
//!    carries a valid token.

use qbt_storefront::{CART_GROUP_LABEL, FALLBACK_GROUP_LABEL};
use qbt_testkit::{session, Shopper, TestShop};

#[test]
fn groups_and_cart_elevation() -> anyhow::Result<()> {
    let shop = TestShop::new();
    let s = session("user:render-1");
    shop.curate(&s, &[102, 201, 300, 400, 999, 102])?;
    shop.put_in_cart(&s, 101, 2)?;
    shop.put_in_cart(&s, 301, 6)?;
    let r = shop.reconciler()?;

    let form = r.render_form(&s)?;
    assert!(!form.is_empty);

    let labels: Vec<&str> = form.groups.iter().map(|g| g.label.as_str()).collect();
    assert_eq!(labels, vec![CART_GROUP_LABEL, "Red wine", "Sparkling"]);
    assert!(form.groups[0].is_cart);

    let cart_ids: Vec<u64> = form.groups[0].rows.iter().map(|r| r.product_id).collect();
    assert_eq!(cart_ids, vec![300, 301, 101]);

    let parent = &form.groups[0].rows[0];
    assert_eq!(parent.cart_quantity, 6);
    assert!(parent.attributes.is_empty());

    let variant = &form.groups[0].rows[1];
    assert_eq!(variant.name, "Estate white");
    assert_eq!(variant.attributes.get("size").map(String::as_str), Some("0.75l"));
    assert_eq!(variant.step, 6);

    let rioja = &form.groups[0].rows[2];
    assert_eq!((rioja.cart_quantity, rioja.step), (2, 1));

    let rest: Vec<u64> = form.groups[1..]
        .iter()
        .flat_map(|g| g.rows.iter().map(|r| r.product_id))
        .collect();
    assert_eq!(rest, vec![102, 201]);
    assert!(form.rows().all(|r| r.product_id != 400 && r.product_id != 999));
    Ok(())
}

#[test]
fn uncategorized_products_use_the_fallback_group() -> anyhow::Result<()> {
    let shop = TestShop::with_products([qbt_storefront::Product::simple(7, "Corkscrew", 5_000_000)]);
    let s = session("user:render-2");
    shop.curate(&s, &[7])?;

    let form = shop.reconciler()?.render_form(&s)?;
    assert_eq!(form.groups.len(), 1);
    assert_eq!(form.groups[0].label, FALLBACK_GROUP_LABEL);
    Ok(())
}

#[test]
fn empty_form_still_submits() -> anyhow::Result<()> {
    let shop = TestShop::new();
    let s = session("user:render-3");
    let r = shop.reconciler()?;

    let tab = Shopper::open(&r, &s)?;
    assert!(tab.form.is_empty);
    assert!(tab.form.groups.is_empty());
    assert!(!tab.form.hidden.cart_state.is_empty());
    assert!(tab.submit(&r)?.is_applied());
    Ok(())
}

#[test]
fn rendered_token_matches_the_live_cart() -> anyhow::Result<()> {
    let shop = TestShop::new();
    let s = session("user:render-4");
    shop.put_in_cart(&s, 202, 3)?;
    let r = shop.reconciler()?;

    let form = r.render_form(&s)?;
    let decoded = r
        .codec()
        .decode(&form.hidden.cart_state, &form.hidden.cart_state_hash, &s)?;
    assert_eq!(decoded, shop.live(&s)?);
    assert!(r.codec().verify_nonce(&form.hidden.nonce, &s));
    Ok(())
}
