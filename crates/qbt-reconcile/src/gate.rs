//! Submission gate.
//!
//! Every quick-order submission MUST pass through [`check_submission_gate`]
//! before any cart mutation is planned. The gate blocks on:
//!
//! 1. a render-time snapshot that could not be trusted (`None`), and
//! 2. any non-CLEAN reconcile of that snapshot against the live cart.
//!
//! Both are recoverable by re-rendering the form with a fresh snapshot; the
//! gate is a concurrency guard, not an error path.
//!
//! Pure deterministic: no IO, no clock, no randomness.

use crate::{reconcile, CartSnapshot, ReconcileReason, ReconcileReport};

/// Result of a submission gate check.
///
/// Apply may not proceed unless [`SubmissionGate::Permitted`] is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionGate {
    /// Render-time snapshot verified and matches the live cart.
    Permitted,
    /// Submission must not touch the cart.
    ///
    /// The embedded `report` carries the evidence for operational logging.
    /// It is never shown to the shopper.
    Blocked { report: ReconcileReport },
}

impl SubmissionGate {
    pub fn is_permitted(&self) -> bool {
        matches!(self, SubmissionGate::Permitted)
    }

    pub fn is_blocked(&self) -> bool {
        !self.is_permitted()
    }

    /// Primary block reason, `None` when permitted.
    pub fn reason(&self) -> Option<ReconcileReason> {
        match self {
            SubmissionGate::Permitted => None,
            SubmissionGate::Blocked { report } => report.reasons.first().copied(),
        }
    }
}

/// Gate check for a submission.
///
/// `rendered` is the decoded render-time snapshot, or `None` when the token
/// failed verification. Tampering and an absent token are deliberately not
/// distinguished here.
pub fn check_submission_gate(
    rendered: Option<&CartSnapshot>,
    live: &CartSnapshot,
) -> SubmissionGate {
    let Some(rendered) = rendered else {
        return SubmissionGate::Blocked {
            report: ReconcileReport::untrusted(),
        };
    };

    let report = reconcile(rendered, live);
    if report.is_clean() {
        SubmissionGate::Permitted
    } else {
        SubmissionGate::Blocked { report }
    }
}
