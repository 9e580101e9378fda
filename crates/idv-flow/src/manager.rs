//! # State Manager
//!
//! Owns the canonical [`VerificationState`] of one session, applies typed
//! mutations that enforce the session invariants, keeps an ordered log of
//! step transitions and publishes every new snapshot on a `watch` channel.
//!
//! Subscribers always observe the latest snapshot; intermediate values
//! may be skipped if a subscriber falls behind.

use idv_core::{DocumentSide, DocumentType, Timestamp, VerificationId};
use tokio::sync::watch;

use crate::config::PollPhase;
use crate::error::{StateError, SurfacedError};
use crate::state::{
    DocumentSlot, FinalResult, Stall, StallCause, TransitionRecord, VerificationState,
};
use crate::step::{Outcome, StatusId, StepId};

/// Owner of one session's state.
#[derive(Debug)]
pub struct StateManager {
    state: VerificationState,
    transitions: Vec<TransitionRecord>,
    publisher: watch::Sender<VerificationState>,
}

impl StateManager {
    pub fn new(initial: VerificationState) -> Self {
        let (publisher, _) = watch::channel(initial.clone());
        Self {
            state: initial,
            transitions: Vec::new(),
            publisher,
        }
    }

    /// Current state.
    pub fn state(&self) -> &VerificationState {
        &self.state
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> VerificationState {
        self.state.clone()
    }

    /// Receive every published snapshot from now on.
    pub fn subscribe(&self) -> watch::Receiver<VerificationState> {
        self.publisher.subscribe()
    }

    /// Ordered log of step transitions, including restarts.
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Store the verification id and move to the first upload step.
    pub fn begin_session(&mut self, verification_id: VerificationId) -> Result<(), StateError> {
        if self.state.is_started() {
            return Err(StateError::AlreadyStarted);
        }
        self.state.verification_id = Some(verification_id);
        self.state.status = StatusId::Pending;
        self.state.error = None;
        self.do_transition(StepId::FrontDocumentUpload, "verification started");
        self.publish();
        Ok(())
    }

    /// Move forward to `to`. Moving to the current step is a no-op.
    pub fn advance_to(&mut self, to: StepId, reason: &str) -> Result<(), StateError> {
        self.require_open()?;
        let from = self.state.current_step;
        if to < from {
            return Err(StateError::StepRegression { from, to });
        }
        if to > from {
            self.do_transition(to, reason);
            self.state.error = None;
            self.publish();
        }
        Ok(())
    }

    /// Set the in-flight status. Terminal statuses are only set by
    /// [`finalize`](Self::finalize).
    pub fn set_status(&mut self, status: StatusId) -> Result<(), StateError> {
        self.require_open()?;
        if self.state.status != status {
            self.state.status = status;
            self.publish();
        }
        Ok(())
    }

    /// Mark a document face uploaded. A re-upload restarts processing for
    /// that face only.
    pub fn mark_uploaded(
        &mut self,
        side: DocumentSide,
        document_type: DocumentType,
    ) -> Result<(), StateError> {
        self.require_open()?;
        *self.state.documents.slot_mut(side) = Some(DocumentSlot {
            uploaded: true,
            processed: false,
            document_type: Some(document_type),
            extracted_data: None,
        });
        self.state.error = None;
        self.publish();
        Ok(())
    }

    /// Mark a document face processed and keep what the server extracted.
    pub fn mark_processed(
        &mut self,
        side: DocumentSide,
        extracted_data: Option<serde_json::Value>,
    ) -> Result<(), StateError> {
        self.require_open()?;
        match self.state.documents.slot_mut(side) {
            Some(slot) if slot.uploaded => {
                slot.processed = true;
                slot.extracted_data = extracted_data;
            }
            _ => return Err(StateError::NotUploaded { side }),
        }
        self.publish();
        Ok(())
    }

    /// Record the cross-validation verdict. Written once.
    pub fn record_cross_validation(
        &mut self,
        passed: bool,
        score: Option<f64>,
    ) -> Result<(), StateError> {
        self.require_open()?;
        if self.state.cross_validation.passed.is_some() {
            return Err(StateError::CrossValidationAlreadyRecorded);
        }
        self.state.cross_validation.completed = true;
        self.state.cross_validation.passed = Some(passed);
        self.state.cross_validation.score = score;
        self.publish();
        Ok(())
    }

    pub fn record_live_capture_uploaded(&mut self) -> Result<(), StateError> {
        self.require_open()?;
        let live = &mut self.state.live_capture;
        live.completed = true;
        live.processed = false;
        live.face_match_score = None;
        live.liveness_score = None;
        self.state.error = None;
        self.publish();
        Ok(())
    }

    pub fn record_live_capture_scores(
        &mut self,
        face_match_score: Option<f64>,
        liveness_score: Option<f64>,
    ) -> Result<(), StateError> {
        self.require_open()?;
        let live = &mut self.state.live_capture;
        live.processed = true;
        live.face_match_score = face_match_score;
        live.liveness_score = liveness_score;
        self.publish();
        Ok(())
    }

    /// Set the final result, the matching terminal status and the terminal
    /// step. Written once.
    pub fn finalize(&mut self, outcome: Outcome, reason: Option<String>) -> Result<(), StateError> {
        self.require_open()?;
        self.state.final_result = Some(FinalResult {
            outcome,
            reason,
            completed_at: Timestamp::now(),
        });
        self.state.status = outcome.status();
        self.state.stalled = None;
        self.state.error = None;
        if self.state.current_step != StepId::VerificationComplete {
            self.do_transition(StepId::VerificationComplete, &format!("final result: {outcome}"));
        }
        self.publish();
        Ok(())
    }

    pub fn surface_error(&mut self, error: SurfacedError) {
        self.state.error = Some(error);
        self.publish();
    }

    pub fn clear_error(&mut self) {
        if self.state.error.take().is_some() {
            self.publish();
        }
    }

    /// Record that `phase` stopped short after `status_retries` manual retries.
    pub fn mark_stalled(
        &mut self,
        phase: PollPhase,
        cause: StallCause,
        status_retries: u32,
        exhausted: bool,
    ) {
        self.state.stalled = Some(Stall {
            phase,
            cause,
            status_retries,
            exhausted,
        });
        if !self.state.status.is_terminal() {
            self.state.status = StatusId::Pending;
        }
        self.publish();
    }

    pub fn clear_stalled(&mut self) {
        if self.state.stalled.take().is_some() {
            self.publish();
        }
    }

    /// Reset to a fresh state for the same session token.
    pub fn restart(&mut self, reason: &str) {
        let fresh = VerificationState::new(self.state.session_token.clone());
        self.transitions.push(TransitionRecord {
            from: self.state.current_step,
            to: fresh.current_step,
            timestamp: Timestamp::now(),
            reason: reason.to_string(),
        });
        self.state = fresh;
        self.publish();
    }

    fn require_open(&self) -> Result<(), StateError> {
        if self.state.is_finalized() {
            return Err(StateError::AlreadyFinalized);
        }
        Ok(())
    }

    fn do_transition(&mut self, to: StepId, reason: &str) {
        tracing::debug!(from = %self.state.current_step, to = %to, reason, "step transition");
        self.transitions.push(TransitionRecord {
            from: self.state.current_step,
            to,
            timestamp: Timestamp::now(),
            reason: reason.to_string(),
        });
        self.state.current_step = to;
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idv_core::SessionToken;

    fn manager() -> StateManager {
        StateManager::new(VerificationState::new(SessionToken::new("user-123").unwrap()))
    }

    fn started() -> StateManager {
        let mut m = manager();
        m.begin_session(VerificationId::new("verif_1").unwrap()).unwrap();
        m
    }

    #[test]
    fn begin_session_sets_id_and_advances() {
        let m = started();
        assert_eq!(m.state().current_step, StepId::FrontDocumentUpload);
        assert_eq!(m.state().verification_id.as_ref().unwrap().as_str(), "verif_1");
        assert_eq!(m.transitions().len(), 1);
    }

    #[test]
    fn begin_session_twice_fails() {
        let mut m = started();
        assert_eq!(
            m.begin_session(VerificationId::new("verif_2").unwrap()),
            Err(StateError::AlreadyStarted)
        );
    }

    #[test]
    fn step_never_regresses() {
        let mut m = started();
        m.advance_to(StepId::CrossValidation, "docs done").unwrap();
        assert_eq!(
            m.advance_to(StepId::BackDocumentUpload, "oops"),
            Err(StateError::StepRegression {
                from: StepId::CrossValidation,
                to: StepId::BackDocumentUpload
            })
        );
        assert_eq!(m.state().current_step, StepId::CrossValidation);
    }

    #[test]
    fn advancing_to_current_step_is_silent() {
        let mut m = started();
        let before = m.transitions().len();
        m.advance_to(StepId::FrontDocumentUpload, "again").unwrap();
        assert_eq!(m.transitions().len(), before);
    }

    #[test]
    fn processed_requires_uploaded() {
        let mut m = started();
        assert_eq!(
            m.mark_processed(DocumentSide::Front, None),
            Err(StateError::NotUploaded {
                side: DocumentSide::Front
            })
        );
        m.mark_uploaded(DocumentSide::Front, DocumentType::Passport).unwrap();
        m.mark_processed(DocumentSide::Front, Some(serde_json::json!({"name": "John Doe"})))
            .unwrap();
        let slot = m.state().documents.front.clone().unwrap();
        assert!(slot.uploaded && slot.processed);
        assert_eq!(slot.extracted_data.unwrap()["name"], "John Doe");
    }

    #[test]
    fn reupload_resets_only_that_slot() {
        let mut m = started();
        for side in [DocumentSide::Front, DocumentSide::Back] {
            m.mark_uploaded(side, DocumentType::DriversLicense).unwrap();
            m.mark_processed(side, None).unwrap();
        }
        m.mark_uploaded(DocumentSide::Front, DocumentType::DriversLicense).unwrap();
        assert!(!m.state().documents.is_processed(DocumentSide::Front));
        assert!(m.state().documents.is_processed(DocumentSide::Back));
    }

    #[test]
    fn cross_validation_written_once() {
        let mut m = started();
        m.record_cross_validation(true, Some(0.9)).unwrap();
        assert_eq!(
            m.record_cross_validation(false, Some(0.1)),
            Err(StateError::CrossValidationAlreadyRecorded)
        );
        assert_eq!(m.state().cross_validation.passed, Some(true));
        assert_eq!(m.state().cross_validation.score, Some(0.9));
    }

    #[test]
    fn finalize_sets_terminal_step_and_status_once() {
        let mut m = started();
        m.finalize(Outcome::Failed, Some("Documents do not match".into())).unwrap();
        let s = m.state();
        assert_eq!(s.current_step, StepId::VerificationComplete);
        assert_eq!(s.status, StatusId::Failed);
        assert_eq!(
            s.final_result.as_ref().unwrap().reason.as_deref(),
            Some("Documents do not match")
        );
        assert_eq!(m.finalize(Outcome::Verified, None), Err(StateError::AlreadyFinalized));
        assert_eq!(
            m.advance_to(StepId::LiveCapture, "late"),
            Err(StateError::AlreadyFinalized)
        );
    }

    #[test]
    fn stall_resets_status_to_pending() {
        let mut m = started();
        m.set_status(StatusId::Processing).unwrap();
        m.mark_stalled(PollPhase::FrontDocument, StallCause::Timeout, 0, false);
        assert_eq!(m.state().status, StatusId::Pending);
        assert!(!m.state().is_stuck());
        m.mark_stalled(PollPhase::FrontDocument, StallCause::Timeout, 3, true);
        assert!(m.state().is_stuck());
        m.clear_stalled();
        assert!(m.state().stalled.is_none());
    }

    #[test]
    fn restart_keeps_token_and_logs() {
        let mut m = started();
        m.finalize(Outcome::ManualReview, None).unwrap();
        m.restart("user restart");
        let s = m.state();
        assert_eq!(s.current_step, StepId::Welcome);
        assert!(s.verification_id.is_none());
        assert!(s.final_result.is_none());
        assert_eq!(s.session_token.as_str(), "user-123");
        let last = m.transitions().last().unwrap();
        assert_eq!((last.from, last.to), (StepId::VerificationComplete, StepId::Welcome));
    }

    #[test]
    fn subscribers_see_latest_snapshot() {
        let mut m = manager();
        let rx = m.subscribe();
        m.begin_session(VerificationId::new("verif_1").unwrap()).unwrap();
        m.surface_error(SurfacedError {
            kind: crate::error::ErrorKind::Transport,
            message: "network down".into(),
        });
        let seen = rx.borrow().clone();
        assert_eq!(seen.current_step, StepId::FrontDocumentUpload);
        assert_eq!(seen.error.unwrap().message, "network down");
    }
}
