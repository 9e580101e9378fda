//! # Workflow Controller
//!
//! The verification state machine. Each user action is one async method:
//! it checks preconditions against configuration and session state, calls
//! the remote client, records the result through the [`StateManager`] and,
//! for upload steps, drives the matching poll phase until the step resolves.
//!
//! ## Poll phases
//!
//! | Phase | Started by | Done when |
//! |-------|------------|-----------|
//! | `front_document` | front upload | `ocr_data` present |
//! | `back_document` | back upload | `barcode_data` or a cross-validation score present |
//! | `cross_validation` | both documents processed | cross-validation score present |
//! | `live_capture` | selfie upload | face-match and liveness scores present |
//!
//! A terminal server status observed in any phase ends the session with
//! that outcome. A phase that times out leaves the session stalled: the
//! status check can be retried a bounded number of times, after which only
//! [`WorkflowController::restart`] is accepted. A phase whose status checks
//! keep failing with transient errors is stalled the same way, but its
//! retries do not count against that bound.
//!
//! ## Errors
//!
//! Every failed operation returns a [`WorkflowError`] and also records it on
//! the session as a tagged [`SurfacedError`](crate::error::SurfacedError).
//! Cancellation is the exception and is never surfaced.

use std::sync::Arc;

use idv_client::{
    DocumentUpload, LiveCaptureUpload, LiveToken, RemoteVerificationClient, SessionContext,
    StatusSnapshot,
};
use idv_core::{
    DocumentFile, DocumentSide, DocumentType, LiveCaptureFrame, SessionToken, ValidationError,
    VerificationId,
};
use tokio::sync::watch;

use crate::config::{PollPhase, WorkflowConfig};
use crate::error::WorkflowError;
use crate::manager::StateManager;
use crate::outcome::{cross_validation_verdict, derive_final, server_decision};
use crate::polling::{DonePredicate, PollCanceller, PollOutcome, PollingCoordinator};
use crate::state::{StallCause, TransitionRecord, VerificationState};
use crate::step::{Outcome, StatusId, StepId};

/// Drives one verification session.
pub struct WorkflowController {
    client: Arc<dyn RemoteVerificationClient>,
    config: WorkflowConfig,
    state: StateManager,
    poller: PollingCoordinator,
    live_token: Option<LiveToken>,
    /// Manual status retries spent on the current stall.
    status_retries: u32,
    torn_down: bool,
}

impl std::fmt::Debug for WorkflowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowController")
            .field("state", self.state.state())
            .field("polling", &self.poller.active_phase())
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl WorkflowController {
    pub fn new(
        client: Arc<dyn RemoteVerificationClient>,
        config: WorkflowConfig,
        session_token: SessionToken,
    ) -> Self {
        let poller = PollingCoordinator::new(Arc::clone(&client));
        Self {
            client,
            config,
            state: StateManager::new(VerificationState::new(session_token)),
            poller,
            live_token: None,
            status_retries: 0,
            torn_down: false,
        }
    }

    pub fn state(&self) -> &VerificationState {
        self.state.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<VerificationState> {
        self.state.subscribe()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        self.state.transitions()
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Handle that cancels the active poll from another task.
    pub fn cancel_handle(&self) -> PollCanceller {
        self.poller.canceller()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    /// Challenge issued by the last [`prepare_live_capture`](Self::prepare_live_capture).
    pub fn live_token(&self) -> Option<&LiveToken> {
        self.live_token.as_ref()
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Open the remote session. Allowed once, on a fresh state.
    pub async fn start_verification(&mut self) -> Result<VerificationId, WorkflowError> {
        let result = self.start_inner().await;
        self.surface(result)
    }

    pub async fn upload_front_document(
        &mut self,
        file: DocumentFile,
        document_type: DocumentType,
    ) -> Result<(), WorkflowError> {
        self.upload_document(DocumentSide::Front, DocumentUpload::new(document_type, file))
            .await
    }

    pub async fn upload_back_document(
        &mut self,
        file: DocumentFile,
        document_type: DocumentType,
    ) -> Result<(), WorkflowError> {
        self.upload_document(DocumentSide::Back, DocumentUpload::new(document_type, file))
            .await
    }

    /// Upload one document face (optionally with metadata) and wait for the
    /// server to process it.
    pub async fn upload_document(
        &mut self,
        side: DocumentSide,
        upload: DocumentUpload,
    ) -> Result<(), WorkflowError> {
        let result = self.upload_inner(side, upload).await;
        self.surface(result)
    }

    /// Request a live-capture challenge. Allowed whenever a selfie could be
    /// captured.
    pub async fn prepare_live_capture(
        &mut self,
        challenge_type: Option<&str>,
    ) -> Result<LiveToken, WorkflowError> {
        let result = self.prepare_live_inner(challenge_type).await;
        self.surface(result)
    }

    /// Upload a base64 selfie frame (bare or `data:` URL) and wait for the
    /// final decision.
    pub async fn capture_live_selfie(&mut self, image_base64: &str) -> Result<(), WorkflowError> {
        let result = self.capture_base64_inner(image_base64).await;
        self.surface(result)
    }

    /// Upload an already-decoded selfie frame and wait for the final decision.
    pub async fn capture_live_frame(
        &mut self,
        upload: LiveCaptureUpload,
    ) -> Result<(), WorkflowError> {
        let result = self.capture_frame_inner(upload).await;
        self.surface(result)
    }

    /// Re-run the status check of a phase that timed out or lost its
    /// connection to the server. No new upload is made.
    pub async fn retry_status_check(&mut self) -> Result<(), WorkflowError> {
        let result = self.retry_inner().await;
        self.surface(result)
    }

    /// Stop any active poll. State stays readable; further operations are
    /// refused until [`restart`](Self::restart).
    pub fn teardown(&mut self) {
        self.poller.stop();
        self.torn_down = true;
        if self.state.state().status == StatusId::Processing {
            let _ = self.state.set_status(StatusId::Pending);
        }
        tracing::info!(verification_id = ?self.state.state().verification_id, "session torn down");
    }

    /// Discard all progress and return to a fresh state for the same
    /// session token.
    pub fn restart(&mut self) {
        self.poller.stop();
        self.state.restart("restart requested");
        self.live_token = None;
        self.status_retries = 0;
        self.torn_down = false;
        tracing::info!(session_token = %self.state.state().session_token, "session restarted");
    }

    // ── Operation bodies ─────────────────────────────────────────────

    async fn start_inner(&mut self) -> Result<VerificationId, WorkflowError> {
        const OP: &str = "start_verification";
        self.require_usable(OP)?;
        if self.state.state().is_started() {
            return Err(WorkflowError::precondition(OP, "session already started"));
        }

        let context = SessionContext::new(self.state.state().session_token.clone());
        let verification_id = self.client.start(&context).await?;
        self.state.begin_session(verification_id.clone())?;
        tracing::info!(%verification_id, "verification started");
        Ok(verification_id)
    }

    async fn upload_inner(
        &mut self,
        side: DocumentSide,
        upload: DocumentUpload,
    ) -> Result<(), WorkflowError> {
        let op = match side {
            DocumentSide::Front => "upload_front_document",
            DocumentSide::Back => "upload_back_document",
        };
        self.require_usable(op)?;

        // Configuration checks come before any state or network check.
        if side == DocumentSide::Back && !self.config.require_back_of_id {
            return Err(ValidationError::BackOfIdNotRequired.into());
        }
        self.config.check_document_type(upload.document_type)?;
        if upload.file.len() > self.config.max_file_bytes {
            return Err(ValidationError::FileTooLarge {
                size: upload.file.len(),
                max: self.config.max_file_bytes,
            }
            .into());
        }

        let verification_id = self.verification_id(op)?;
        self.check_upload_step(op, side)?;

        self.poller.stop();
        match side {
            DocumentSide::Front => {
                self.client
                    .upload_front_document(&verification_id, &upload)
                    .await?
            }
            DocumentSide::Back => {
                self.client
                    .upload_back_document(&verification_id, &upload)
                    .await?
            }
        };
        tracing::info!(%verification_id, %side, document_type = %upload.document_type, "document uploaded");

        self.reset_stall();
        self.state.mark_uploaded(side, upload.document_type)?;
        let (processing, phase) = match side {
            DocumentSide::Front => (StepId::FrontDocumentProcessing, PollPhase::FrontDocument),
            DocumentSide::Back => (StepId::BackDocumentProcessing, PollPhase::BackDocument),
        };
        self.advance_if_behind(processing, "document uploaded")?;
        self.state.set_status(StatusId::Processing)?;
        self.drive(phase).await
    }

    async fn prepare_live_inner(
        &mut self,
        challenge_type: Option<&str>,
    ) -> Result<LiveToken, WorkflowError> {
        const OP: &str = "prepare_live_capture";
        self.check_live_gate(OP)?;
        let verification_id = self.verification_id(OP)?;
        let token = self
            .client
            .generate_live_token(&verification_id, challenge_type)
            .await?;
        tracing::debug!(%verification_id, challenge = ?token.challenge, "live token issued");
        self.live_token = Some(token.clone());
        Ok(token)
    }

    async fn capture_base64_inner(&mut self, image_base64: &str) -> Result<(), WorkflowError> {
        const OP: &str = "capture_live_selfie";
        self.check_live_gate(OP)?;
        let frame = LiveCaptureFrame::from_base64(image_base64, self.config.max_file_bytes)?;
        self.capture_inner(OP, LiveCaptureUpload::new(frame)).await
    }

    async fn capture_frame_inner(&mut self, upload: LiveCaptureUpload) -> Result<(), WorkflowError> {
        const OP: &str = "capture_live_selfie";
        self.check_live_gate(OP)?;
        let size = upload.frame.bytes().len();
        if size > self.config.max_file_bytes {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.config.max_file_bytes,
            }
            .into());
        }
        self.capture_inner(OP, upload).await
    }

    async fn capture_inner(
        &mut self,
        op: &'static str,
        mut upload: LiveCaptureUpload,
    ) -> Result<(), WorkflowError> {
        let verification_id = self.verification_id(op)?;
        if upload.challenge_response.is_none() {
            upload.challenge_response = self.live_token.as_ref().map(|t| t.token.clone());
        }

        self.poller.stop();
        self.client
            .upload_live_capture(&verification_id, &upload)
            .await?;
        tracing::info!(%verification_id, "live capture uploaded");

        self.reset_stall();
        self.state.record_live_capture_uploaded()?;
        self.advance_if_behind(StepId::LiveCaptureProcessing, "live capture uploaded")?;
        self.state.set_status(StatusId::Processing)?;
        self.drive(PollPhase::LiveCapture).await
    }

    async fn retry_inner(&mut self) -> Result<(), WorkflowError> {
        const OP: &str = "retry_status_check";
        if self.torn_down {
            return Err(WorkflowError::precondition(OP, "session has been torn down"));
        }
        if self.state.state().is_finalized() {
            return Err(WorkflowError::precondition(OP, "session is complete"));
        }
        let Some(stall) = self.state.state().stalled else {
            return Err(WorkflowError::precondition(
                OP,
                "no stalled status check to retry",
            ));
        };
        // Only timeouts count against the retry budget.
        if stall.cause == StallCause::Timeout {
            if stall.exhausted || self.status_retries >= self.config.max_status_retries {
                return Err(WorkflowError::Stuck {
                    phase: stall.phase,
                    attempts: self.status_retries,
                });
            }
            self.status_retries += 1;
        }

        tracing::info!(
            verification_id = ?self.state.state().verification_id,
            phase = %stall.phase,
            cause = ?stall.cause,
            attempt = self.status_retries,
            max = self.config.max_status_retries,
            "retrying status check"
        );
        self.state.clear_stalled();
        self.state.set_status(StatusId::Processing)?;
        self.drive(stall.phase).await
    }

    // ── Poll phases ──────────────────────────────────────────────────

    /// Poll `phase` and keep going through any phase it leads to.
    async fn drive(&mut self, mut phase: PollPhase) -> Result<(), WorkflowError> {
        loop {
            let Some(snapshot) = self.await_phase(phase).await? else {
                return Ok(());
            };
            match self.apply_phase(phase, snapshot)? {
                Some(next) => phase = next,
                None => return Ok(()),
            }
        }
    }

    /// Run one poll phase. `None` when the server ended the session.
    async fn await_phase(
        &mut self,
        phase: PollPhase,
    ) -> Result<Option<StatusSnapshot>, WorkflowError> {
        let verification_id = self.verification_id("poll")?;
        let policy = self.config.poll_policy(phase);
        let handle = self
            .poller
            .start(verification_id, phase, policy, done_predicate(phase));

        match handle.outcome().await {
            PollOutcome::Satisfied(snapshot) => {
                self.reset_stall();
                Ok(Some(snapshot))
            }
            PollOutcome::Terminal(snapshot) => {
                self.reset_stall();
                self.finish_from_server(phase, &snapshot)?;
                Ok(None)
            }
            PollOutcome::TimedOut { polls } => {
                let exhausted = self.status_retries >= self.config.max_status_retries;
                tracing::warn!(%phase, polls, status_retries = self.status_retries, exhausted, "status check timed out");
                self.state
                    .mark_stalled(phase, StallCause::Timeout, self.status_retries, exhausted);
                if exhausted {
                    Err(WorkflowError::Stuck {
                        phase,
                        attempts: self.status_retries,
                    })
                } else {
                    Err(WorkflowError::Timeout { phase })
                }
            }
            PollOutcome::Cancelled => {
                self.state.set_status(StatusId::Pending)?;
                Err(WorkflowError::Cancelled { phase })
            }
            PollOutcome::Failed(e) if e.is_transient() => {
                tracing::warn!(%phase, error = %e, "status checks kept failing");
                self.state
                    .mark_stalled(phase, StallCause::Transport, self.status_retries, false);
                Err(e.into())
            }
            PollOutcome::Failed(e) => {
                self.state.set_status(StatusId::Pending)?;
                Err(e.into())
            }
        }
    }

    /// Record what a satisfied phase produced. Returns the next phase to
    /// poll, if any.
    fn apply_phase(
        &mut self,
        phase: PollPhase,
        snapshot: StatusSnapshot,
    ) -> Result<Option<PollPhase>, WorkflowError> {
        match phase {
            PollPhase::FrontDocument => {
                self.state
                    .mark_processed(DocumentSide::Front, snapshot.ocr_data)?;
                self.after_documents_processed()
            }
            PollPhase::BackDocument => {
                self.state
                    .mark_processed(DocumentSide::Back, snapshot.barcode_data)?;
                self.after_documents_processed()
            }
            PollPhase::CrossValidation => self.resolve_cross_validation(&snapshot),
            PollPhase::LiveCapture => {
                self.state
                    .record_live_capture_scores(snapshot.face_match_score, snapshot.liveness_score)?;
                let (outcome, reason) = derive_final(&snapshot);
                self.finalize(outcome, reason)?;
                Ok(None)
            }
        }
    }

    fn after_documents_processed(&mut self) -> Result<Option<PollPhase>, WorkflowError> {
        let documents = &self.state.state().documents;
        if self.config.require_back_of_id && !documents.is_processed(DocumentSide::Back) {
            self.advance_if_behind(StepId::BackDocumentUpload, "front document processed")?;
            self.state.set_status(StatusId::Pending)?;
            return Ok(None);
        }
        if self.config.cross_validation_enabled() {
            self.advance_if_behind(StepId::CrossValidation, "documents processed")?;
            self.state.set_status(StatusId::Processing)?;
            return Ok(Some(PollPhase::CrossValidation));
        }
        self.advance_if_behind(StepId::LiveCapture, "documents processed")?;
        self.state.set_status(StatusId::Pending)?;
        Ok(None)
    }

    fn resolve_cross_validation(
        &mut self,
        snapshot: &StatusSnapshot,
    ) -> Result<Option<PollPhase>, WorkflowError> {
        let threshold = self.config.cross_validation_threshold;
        let Some(verdict) = cross_validation_verdict(snapshot, threshold) else {
            return Ok(Some(PollPhase::CrossValidation));
        };

        self.state
            .record_cross_validation(verdict.passed, verdict.score)?;
        if !verdict.passed {
            tracing::info!(score = ?verdict.score, threshold, "cross-validation failed");
            self.finalize(Outcome::Failed, verdict.reason)?;
            return Ok(None);
        }

        tracing::info!(score = ?verdict.score, "cross-validation passed");
        self.state
            .advance_to(StepId::LiveCapture, "cross-validation passed")?;
        self.state.set_status(StatusId::Pending)?;
        Ok(None)
    }

    /// Adopt a terminal status declared by the server.
    fn finish_from_server(
        &mut self,
        phase: PollPhase,
        snapshot: &StatusSnapshot,
    ) -> Result<(), WorkflowError> {
        let Some((outcome, reason)) = server_decision(snapshot) else {
            return Ok(());
        };

        if phase == PollPhase::CrossValidation
            && self.state.state().cross_validation.passed.is_none()
        {
            if let Some(verdict) =
                cross_validation_verdict(snapshot, self.config.cross_validation_threshold)
            {
                self.state
                    .record_cross_validation(verdict.passed, verdict.score)?;
            }
        }
        if phase == PollPhase::LiveCapture {
            self.state
                .record_live_capture_scores(snapshot.face_match_score, snapshot.liveness_score)?;
        }

        tracing::info!(%phase, %outcome, "server declared final outcome");
        self.finalize(outcome, reason)
    }

    fn finalize(&mut self, outcome: Outcome, reason: Option<String>) -> Result<(), WorkflowError> {
        self.state.finalize(outcome, reason)?;
        self.poller.stop();
        tracing::info!(
            verification_id = ?self.state.state().verification_id,
            %outcome,
            "verification complete"
        );
        Ok(())
    }

    // ── Preconditions ────────────────────────────────────────────────

    fn require_usable(&self, op: &'static str) -> Result<(), WorkflowError> {
        let state = self.state.state();
        if self.torn_down {
            return Err(WorkflowError::precondition(op, "session has been torn down"));
        }
        if state.is_finalized() {
            return Err(WorkflowError::precondition(op, "session is complete"));
        }
        if let Some(stall) = state.stalled.filter(|s| s.exhausted) {
            return Err(WorkflowError::Stuck {
                phase: stall.phase,
                attempts: stall.status_retries,
            });
        }
        Ok(())
    }

    fn verification_id(&self, op: &'static str) -> Result<VerificationId, WorkflowError> {
        self.state
            .state()
            .verification_id
            .clone()
            .ok_or_else(|| WorkflowError::precondition(op, "verification has not started"))
    }

    /// Uploads are accepted from the slot's upload step until
    /// cross-validation resolves. Re-uploads never move the step back.
    fn check_upload_step(&self, op: &'static str, side: DocumentSide) -> Result<(), WorkflowError> {
        let state = self.state.state();
        let step = state.current_step;
        if state.cross_validation.passed.is_some() {
            return Err(WorkflowError::precondition(op, "cross-validation already resolved"));
        }
        let first = match side {
            DocumentSide::Front => StepId::FrontDocumentUpload,
            DocumentSide::Back => {
                if !state.documents.is_processed(DocumentSide::Front) {
                    return Err(WorkflowError::precondition(
                        op,
                        "front document has not been processed",
                    ));
                }
                StepId::BackDocumentUpload
            }
        };
        if step < first || step > StepId::CrossValidation {
            return Err(WorkflowError::precondition(
                op,
                format!("not accepted at step {step}"),
            ));
        }
        Ok(())
    }

    fn check_live_gate(&self, op: &'static str) -> Result<(), WorkflowError> {
        self.require_usable(op)?;
        let state = self.state.state();
        if !state.is_started() {
            return Err(WorkflowError::precondition(op, "verification has not started"));
        }
        if self.config.cross_validation_enabled() {
            if state.cross_validation.passed != Some(true) {
                return Err(WorkflowError::precondition(op, "cross-validation has not passed"));
            }
        } else {
            let documents = &state.documents;
            let back_ready =
                !self.config.require_back_of_id || documents.is_processed(DocumentSide::Back);
            if !documents.is_processed(DocumentSide::Front) || !back_ready {
                return Err(WorkflowError::precondition(
                    op,
                    "documents have not been processed",
                ));
            }
        }
        if !matches!(
            state.current_step,
            StepId::LiveCapture | StepId::LiveCaptureProcessing
        ) {
            return Err(WorkflowError::precondition(
                op,
                format!("not accepted at step {}", state.current_step),
            ));
        }
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn advance_if_behind(&mut self, step: StepId, reason: &str) -> Result<(), WorkflowError> {
        if self.state.state().current_step < step {
            self.state.advance_to(step, reason)?;
        }
        Ok(())
    }

    fn reset_stall(&mut self) {
        self.status_retries = 0;
        self.state.clear_stalled();
    }

    fn surface<T>(&mut self, result: Result<T, WorkflowError>) -> Result<T, WorkflowError> {
        if let Err(e) = &result {
            if let Some(surfaced) = e.surfaced() {
                tracing::warn!(kind = ?surfaced.kind, "{e}");
                self.state.surface_error(surfaced);
            }
        }
        result
    }
}

fn done_predicate(phase: PollPhase) -> DonePredicate {
    match phase {
        PollPhase::FrontDocument => Box::new(|s: &StatusSnapshot| s.has_ocr_data()),
        PollPhase::BackDocument => Box::new(|s: &StatusSnapshot| {
            s.barcode_data.as_ref().is_some_and(|d| !d.is_null())
                || s.cross_validation_score().is_some()
        }),
        PollPhase::CrossValidation => {
            Box::new(|s: &StatusSnapshot| s.cross_validation_score().is_some())
        }
        PollPhase::LiveCapture => Box::new(|s: &StatusSnapshot| s.has_live_scores()),
    }
}
