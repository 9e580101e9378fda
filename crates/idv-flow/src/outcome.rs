//! Final-result derivation.
//!
//! Pure functions over [`StatusSnapshot`]. A terminal status declared by
//! the server always takes precedence over anything computed locally.
//! The legacy `completed` status is never read as a decision, and
//! `confidence_score` is never consulted.

use idv_client::{RemoteStatus, StatusSnapshot};

use crate::step::Outcome;

/// Reason recorded when live-capture scores arrive without a decision.
pub const NO_FINAL_DECISION: &str = "no final decision from verification service";

/// Cross-validation verdict derived from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidationVerdict {
    pub passed: bool,
    pub score: Option<f64>,
    /// Why validation did not pass.
    pub reason: Option<String>,
}

/// Decide cross-validation from a snapshot, in priority order: remote
/// `verified` passes, remote `failed` does not, otherwise the score must
/// reach `threshold`. `None` while there is nothing to decide on.
pub fn cross_validation_verdict(
    snapshot: &StatusSnapshot,
    threshold: f64,
) -> Option<CrossValidationVerdict> {
    let score = snapshot.cross_validation_score();
    match snapshot.status {
        RemoteStatus::Verified => Some(CrossValidationVerdict {
            passed: true,
            score,
            reason: None,
        }),
        RemoteStatus::Failed => Some(CrossValidationVerdict {
            passed: false,
            score,
            reason: Some(
                snapshot
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "cross-validation failed".to_string()),
            ),
        }),
        _ => score.map(|score| {
            // NaN compares false and fails.
            let passed = score >= threshold;
            CrossValidationVerdict {
                passed,
                score: Some(score),
                reason: (!passed).then(|| {
                    format!("cross-validation score {score:.2} is below threshold {threshold:.2}")
                }),
            }
        }),
    }
}

/// Outcome declared by the server, with its reason.
pub fn server_decision(snapshot: &StatusSnapshot) -> Option<(Outcome, Option<String>)> {
    Outcome::from_remote(snapshot.status)
        .map(|outcome| (outcome, snapshot.terminal_reason().map(str::to_string)))
}

/// Final result once the live-capture poll has resolved.
///
/// Adopts the server's decision when there is one. Scores without a
/// decision go to manual review; the client never turns scores into a
/// verified or failed outcome on its own.
pub fn derive_final(snapshot: &StatusSnapshot) -> (Outcome, Option<String>) {
    server_decision(snapshot)
        .unwrap_or_else(|| (Outcome::ManualReview, Some(NO_FINAL_DECISION.to_string())))
}
