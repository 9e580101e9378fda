//! # Workflow Steps and Session Status
//!
//! ## Steps
//!
//! ```text
//! WELCOME
//!    │ start_verification
//!    ▼
//! FRONT_DOCUMENT_UPLOAD ──▶ FRONT_DOCUMENT_PROCESSING
//!                                   │ ocr_data observed
//!                   ┌───────────────┴──────────────┐ (back not required)
//!                   ▼                              │
//! BACK_DOCUMENT_UPLOAD ──▶ BACK_DOCUMENT_PROCESSING│
//!                                   │              │
//!                                   ▼              ▼
//!                           CROSS_VALIDATION ──▶ LIVE_CAPTURE ──▶ LIVE_CAPTURE_PROCESSING
//!                                   │                                     │
//!                                   └──────────▶ VERIFICATION_COMPLETE ◀──┘
//! ```
//!
//! `StepId` derives `Ord` in declaration order; the state manager refuses
//! any transition to a lower step except through an explicit restart.
//!
//! `StatusId` is orthogonal to the step: a session can be `processing` in
//! several steps and only reaches a terminal status on completion.

use serde::{Deserialize, Serialize};

use idv_client::RemoteStatus;

/// Position of the session in the fixed workflow ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum StepId {
    Welcome = 0,
    FrontDocumentUpload = 1,
    FrontDocumentProcessing = 2,
    BackDocumentUpload = 3,
    BackDocumentProcessing = 4,
    CrossValidation = 5,
    LiveCapture = 6,
    LiveCaptureProcessing = 7,
    VerificationComplete = 8,
}

impl StepId {
    /// Every step in order.
    pub const ALL: [StepId; 9] = [
        Self::Welcome,
        Self::FrontDocumentUpload,
        Self::FrontDocumentProcessing,
        Self::BackDocumentUpload,
        Self::BackDocumentProcessing,
        Self::CrossValidation,
        Self::LiveCapture,
        Self::LiveCaptureProcessing,
        Self::VerificationComplete,
    ];

    /// Zero-based position in the ordering.
    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::VerificationComplete)
    }

    /// Whether this step belongs to the back-of-ID branch.
    pub fn is_back_of_id(&self) -> bool {
        matches!(self, Self::BackDocumentUpload | Self::BackDocumentProcessing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "WELCOME",
            Self::FrontDocumentUpload => "FRONT_DOCUMENT_UPLOAD",
            Self::FrontDocumentProcessing => "FRONT_DOCUMENT_PROCESSING",
            Self::BackDocumentUpload => "BACK_DOCUMENT_UPLOAD",
            Self::BackDocumentProcessing => "BACK_DOCUMENT_PROCESSING",
            Self::CrossValidation => "CROSS_VALIDATION",
            Self::LiveCapture => "LIVE_CAPTURE",
            Self::LiveCaptureProcessing => "LIVE_CAPTURE_PROCESSING",
            Self::VerificationComplete => "VERIFICATION_COMPLETE",
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session status, orthogonal to the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusId {
    Pending,
    Processing,
    Verified,
    Failed,
    ManualReview,
}

impl StatusId {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Failed | Self::ManualReview)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Verified => "verified",
            Self::Failed => "failed",
            Self::ManualReview => "manual_review",
        }
    }
}

impl std::fmt::Display for StatusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Verified,
    Failed,
    ManualReview,
}

impl Outcome {
    /// The outcome a terminal remote status declares, if any.
    pub fn from_remote(status: RemoteStatus) -> Option<Self> {
        match status {
            RemoteStatus::Verified => Some(Self::Verified),
            RemoteStatus::Failed => Some(Self::Failed),
            RemoteStatus::ManualReview => Some(Self::ManualReview),
            _ => None,
        }
    }

    /// Session status matching this outcome.
    pub fn status(&self) -> StatusId {
        match self {
            Self::Verified => StatusId::Verified,
            Self::Failed => StatusId::Failed,
            Self::ManualReview => StatusId::ManualReview,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.status().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_ordered() {
        for pair in StepId::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} < {}", pair[0], pair[1]);
            assert_eq!(pair[0].index() + 1, pair[1].index());
        }
    }

    #[test]
    fn only_completion_is_terminal() {
        let terminal: Vec<_> = StepId::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&StepId::VerificationComplete]);
    }

    #[test]
    fn step_serializes_screaming_snake() {
        let json = serde_json::to_string(&StepId::BackDocumentProcessing).unwrap();
        assert_eq!(json, "\"BACK_DOCUMENT_PROCESSING\"");
        assert_eq!(StepId::LiveCapture.to_string(), "LIVE_CAPTURE");
    }

    #[test]
    fn outcome_from_remote_ignores_completed() {
        assert_eq!(Outcome::from_remote(RemoteStatus::Verified), Some(Outcome::Verified));
        assert_eq!(
            Outcome::from_remote(RemoteStatus::ManualReview),
            Some(Outcome::ManualReview)
        );
        assert_eq!(Outcome::from_remote(RemoteStatus::Completed), None);
        assert_eq!(Outcome::from_remote(RemoteStatus::Processing), None);
    }

    #[test]
    fn outcome_status_is_terminal() {
        for o in [Outcome::Verified, Outcome::Failed, Outcome::ManualReview] {
            assert!(o.status().is_terminal());
        }
        assert!(!StatusId::Processing.is_terminal());
    }
}
