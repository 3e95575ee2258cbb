//! qbt-reconcile
//!
//! Cart-state reconciliation core for the quick order form.
//!
//! Architectural decisions:
//! - The cart snapshot captured at render time must equal the live snapshot
//!   at submission time before any cart mutation is planned
//! - An untrusted (tampered, foreign-session or missing) snapshot blocks the
//!   submission exactly like a concurrent cart change
//! - An absent product id and a product id with quantity 0 compare equal
//! - Quantities are normalized against a price-derived step on every call
//!
//! Deterministic, pure logic. No IO. No cart or catalog calls.

mod apply;
mod engine;
mod gate;
mod quantity;
mod types;

pub use apply::{find_line, plan_line_mutation, LineMutation};
pub use engine::{is_clean_reconcile, reconcile};
pub use gate::{check_submission_gate, SubmissionGate};
pub use quantity::{
    micros_to_price, normalize_quantity, parse_raw_quantity, price_to_micros, PricingError,
    StepPolicy, MICROS_PER_UNIT,
};
pub use types::*;
