//! qbt-storefront
//!
//! Quick order form orchestration over injected collaborators:
//!
//! - [`Reconciler::render_form`]: live cart → snapshot token + form rows
//! - [`Reconciler::submit`]: token check → compare → per-product apply
//! - [`parse_submission`]: the urlencoded form boundary
//!
//! The catalog, live cart and curated list are external and reached only
//! through the traits in [`collaborators`]. Their failures surface as
//! [`StorefrontError::Unavailable`]; an untrusted token or a concurrent
//! cart change surfaces as [`ReconcileOutcome::Rejected`].

pub mod collaborators;
mod curated;
mod error;
mod reconciler;
mod render;
mod submission;

pub use collaborators::{
    Catalog, Category, CollabResult, Collaborator, CollaboratorError, CuratedList, LiveCart,
    NewCartLine, Product, ProductKind,
};
pub use curated::{dedup_ids, merge_curated};
pub use error::StorefrontError;
pub use reconciler::{
    ApplyReport, QuantityRequest, ReconcileOutcome, Reconciler, SkipReason, SkippedProduct,
};
pub use render::{
    FormGroup, FormRow, HiddenFields, QuickOrderForm, CART_GROUP_LABEL, FALLBACK_GROUP_LABEL,
};
pub use submission::{
    parse_submission, QuickOrderSubmission, SubmissionError, FIELD_ACTION, FIELD_CART_STATE,
    FIELD_CART_STATE_HASH, FIELD_NONCE,
};
