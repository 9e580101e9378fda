//! Workflow and state errors.
//!
//! [`StateError`] is raised by the state manager when a mutation would
//! break a session invariant. [`WorkflowError`] is what controller
//! operations return. Every surfaced failure is also recorded on the
//! session as a [`SurfacedError`] tagged with an [`ErrorKind`], so a UI
//! can offer "retry" for transport and timeout failures and "failed"
//! for everything else.

use idv_client::ClientError;
use idv_core::{DocumentSide, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PollPhase;
use crate::step::StepId;

/// Rejected state mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("step cannot move backwards: {from} -> {to}")]
    StepRegression { from: StepId, to: StepId },

    #[error("session already has a verification id")]
    AlreadyStarted,

    #[error("session has not been started")]
    NotStarted,

    #[error("{side} document cannot be processed before it is uploaded")]
    NotUploaded { side: DocumentSide },

    #[error("cross-validation result is already recorded")]
    CrossValidationAlreadyRecorded,

    #[error("session already has a final result")]
    AlreadyFinalized,
}

/// Failure of a workflow controller operation.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Local input validation. Nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The operation is not legal in the current session state.
    #[error("{operation} not allowed: {reason}")]
    Precondition {
        operation: &'static str,
        reason: String,
    },

    /// The remote call failed.
    #[error(transparent)]
    Remote(#[from] ClientError),

    /// The poll phase ran out of time without a result.
    #[error("{phase} processing timed out")]
    Timeout { phase: PollPhase },

    /// Manual status retries are exhausted; only a restart is accepted.
    #[error("{phase} processing is stuck after {attempts} status retries; restart the session")]
    Stuck { phase: PollPhase, attempts: u32 },

    /// The poll was cancelled by teardown or a newer poll.
    #[error("{phase} polling was cancelled")]
    Cancelled { phase: PollPhase },

    #[error(transparent)]
    State(#[from] StateError),
}

impl WorkflowError {
    pub(crate) fn precondition(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Precondition {
            operation,
            reason: reason.into(),
        }
    }

    /// How this failure is surfaced on the session. `None` for cancellation,
    /// which is never shown to the user.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Validation(_) => Some(ErrorKind::Validation),
            Self::Precondition { .. } | Self::State(_) => Some(ErrorKind::Precondition),
            Self::Remote(ClientError::Validation { .. }) => Some(ErrorKind::Validation),
            Self::Remote(e) if e.is_transient() => Some(ErrorKind::Transport),
            Self::Remote(_) => Some(ErrorKind::Rejected),
            Self::Timeout { .. } | Self::Stuck { .. } => Some(ErrorKind::Timeout),
            Self::Cancelled { .. } => None,
        }
    }

    pub fn surfaced(&self) -> Option<SurfacedError> {
        self.kind().map(|kind| SurfacedError {
            kind,
            message: self.to_string(),
        })
    }
}

/// Category of a surfaced error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input; the user must change it.
    Validation,
    /// Operation attempted out of order.
    Precondition,
    /// Network or server fault; retrying may help.
    Transport,
    /// Processing window elapsed; the status check can be retried.
    Timeout,
    /// The server refused the request.
    Rejected,
}

impl ErrorKind {
    /// Whether a UI should offer a retry affordance.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport | Self::Timeout)
    }
}

/// Last error shown to the user. Cleared on the next successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfacedError {
    pub kind: ErrorKind,
    pub message: String,
}
