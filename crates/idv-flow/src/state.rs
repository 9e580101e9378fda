//! # Verification Session State
//!
//! `VerificationState` is the single source of truth for one session. It is
//! handed out as an owned snapshot; the only way to change the canonical
//! copy is through the typed mutations on
//! [`StateManager`](crate::manager::StateManager).
//!
//! ## Invariants
//!
//! - `current_step` never moves backwards except on restart.
//! - `cross_validation.passed` is written at most once.
//! - `final_result` is written at most once, and when present `status` is
//!   terminal and `current_step` is `VERIFICATION_COMPLETE`.
//! - A processed document slot is always an uploaded one.

use idv_core::{DocumentSide, DocumentType, SessionToken, Timestamp, VerificationId};
use serde::{Deserialize, Serialize};

use crate::config::PollPhase;
use crate::error::SurfacedError;
use crate::step::{Outcome, StatusId, StepId};

/// Progress of one document face.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSlot {
    pub uploaded: bool,
    pub processed: bool,
    pub document_type: Option<DocumentType>,
    /// OCR or barcode output reported by the server.
    pub extracted_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Documents {
    pub front: Option<DocumentSlot>,
    pub back: Option<DocumentSlot>,
}

impl Documents {
    pub fn slot(&self, side: DocumentSide) -> Option<&DocumentSlot> {
        match side {
            DocumentSide::Front => self.front.as_ref(),
            DocumentSide::Back => self.back.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, side: DocumentSide) -> &mut Option<DocumentSlot> {
        match side {
            DocumentSide::Front => &mut self.front,
            DocumentSide::Back => &mut self.back,
        }
    }

    /// Whether the given face has been processed by the server.
    pub fn is_processed(&self, side: DocumentSide) -> bool {
        self.slot(side).is_some_and(|s| s.processed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationState {
    pub completed: bool,
    pub passed: Option<bool>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveCaptureState {
    pub completed: bool,
    pub processed: bool,
    pub face_match_score: Option<f64>,
    pub liveness_score: Option<f64>,
}

/// Terminal decision for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResult {
    pub outcome: Outcome,
    pub reason: Option<String>,
    pub completed_at: Timestamp,
}

/// Why a poll phase stopped before its step resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StallCause {
    /// The phase ran out of time.
    Timeout,
    /// Status checks kept failing with transient errors.
    Transport,
}

/// A poll phase that stopped short and may be re-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stall {
    pub phase: PollPhase,
    pub cause: StallCause,
    /// Manual status retries already spent on this phase.
    pub status_retries: u32,
    /// No retries left; only a restart is accepted.
    pub exhausted: bool,
}

/// Snapshot of a verification session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationState {
    pub session_token: SessionToken,
    pub verification_id: Option<VerificationId>,
    pub current_step: StepId,
    pub status: StatusId,
    pub documents: Documents,
    pub cross_validation: CrossValidationState,
    pub live_capture: LiveCaptureState,
    pub final_result: Option<FinalResult>,
    pub error: Option<SurfacedError>,
    pub stalled: Option<Stall>,
}

impl VerificationState {
    /// Fresh state for a session that has not started.
    pub fn new(session_token: SessionToken) -> Self {
        Self {
            session_token,
            verification_id: None,
            current_step: StepId::Welcome,
            status: StatusId::Pending,
            documents: Documents::default(),
            cross_validation: CrossValidationState::default(),
            live_capture: LiveCaptureState::default(),
            final_result: None,
            error: None,
            stalled: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.verification_id.is_some()
    }

    pub fn is_finalized(&self) -> bool {
        self.final_result.is_some()
    }

    /// Whether a timed-out phase has used up its manual retries.
    pub fn is_stuck(&self) -> bool {
        self.stalled.is_some_and(|s| s.exhausted)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.final_result.as_ref().map(|r| r.outcome)
    }
}

/// Record of a step transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: StepId,
    pub to: StepId,
    pub timestamp: Timestamp,
    pub reason: String,
}
