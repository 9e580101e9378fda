//! # Verify Subcommand
//!
//! Runs one complete verification session: start, front document, back
//! document (when the workflow requires it), optional live-capture
//! challenge, selfie. Processing timeouts are retried through
//! `retry_status_check` until the workflow reports the phase stuck.
//!
//! The final `VerificationState` is printed as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use idv_client::{LiveCaptureUpload, RemoteVerificationClient};
use idv_core::{DocumentFile, DocumentType, LiveCaptureFrame, SessionToken};
use idv_flow::{Outcome, VerificationState, WorkflowConfig, WorkflowController, WorkflowError};

use crate::settings::{load_workflow_config, ConnectionArgs};

/// Arguments for `idv verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Image (JPEG/PNG) or PDF of the document front.
    #[arg(long)]
    pub front: PathBuf,

    /// Image or PDF of the document back. Required unless the workflow
    /// config sets `require_back_of_id: false`.
    #[arg(long)]
    pub back: Option<PathBuf>,

    /// Selfie image, or a `.b64`/`.txt` file holding base64 or a data URL.
    #[arg(long)]
    pub selfie: PathBuf,

    /// Document type: passport, drivers_license, national_id, other.
    #[arg(long, default_value = "drivers_license")]
    pub document_type: DocumentType,

    /// User identifier sent as the session token. Generated when omitted.
    #[arg(long)]
    pub user_id: Option<String>,

    /// Request a live-capture challenge of this type before the selfie.
    #[arg(long)]
    pub challenge: Option<String>,

    /// YAML workflow configuration.
    #[arg(long)]
    pub workflow: Option<PathBuf>,
}

/// Files for one session, already validated.
#[derive(Debug)]
pub struct SessionInputs {
    pub document_type: DocumentType,
    pub front: DocumentFile,
    pub back: Option<DocumentFile>,
    pub selfie: LiveCaptureFrame,
    pub challenge: Option<String>,
}

impl SessionInputs {
    /// Read and validate every input file before anything is sent.
    pub fn load(args: &VerifyArgs, config: &WorkflowConfig) -> Result<Self> {
        let max = config.max_file_bytes;
        config.check_document_type(args.document_type)?;

        let back = match (&args.back, config.require_back_of_id) {
            (Some(path), true) => Some(read_document(path, max)?),
            (None, true) => bail!("--back is required by the workflow configuration"),
            (Some(path), false) => {
                tracing::warn!(path = %path.display(), "back-of-ID not required; ignoring --back");
                None
            }
            (None, false) => None,
        };

        Ok(Self {
            document_type: args.document_type,
            front: read_document(&args.front, max)?,
            back,
            selfie: read_selfie(&args.selfie, max)?,
            challenge: args.challenge.clone(),
        })
    }
}

/// Read a document file, inferring its type from the content.
pub fn read_document(path: &Path, max_bytes: usize) -> Result<DocumentFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    DocumentFile::from_bytes(name, bytes, max_bytes)
        .with_context(|| format!("invalid document {}", path.display()))
}

/// Read a selfie: raw image bytes, or base64 text for `.b64`/`.txt` files.
pub fn read_selfie(path: &Path, max_bytes: usize) -> Result<LiveCaptureFrame> {
    let is_text = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("b64") || ext.eq_ignore_ascii_case("txt"));
    let frame = if is_text {
        let encoded = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        LiveCaptureFrame::from_base64(encoded.trim(), max_bytes)
    } else {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        LiveCaptureFrame::from_bytes(None, bytes, max_bytes)
    };
    frame.with_context(|| format!("invalid selfie {}", path.display()))
}

/// Entry point for `idv verify`.
pub async fn run_verify(args: &VerifyArgs, connection: &ConnectionArgs) -> Result<u8> {
    let config = load_workflow_config(args.workflow.as_deref())?;
    let inputs = SessionInputs::load(args, &config)?;
    let session_token = match &args.user_id {
        Some(raw) => SessionToken::new(raw.as_str())?,
        None => SessionToken::generate(),
    };
    let client = connection.client()?;

    let state = run_session(client, config, session_token, inputs).await?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(exit_code(&state))
}

/// Drive a session to completion, or to the first error a retry cannot
/// fix.
pub async fn run_session(
    client: Arc<dyn RemoteVerificationClient>,
    config: WorkflowConfig,
    session_token: SessionToken,
    inputs: SessionInputs,
) -> Result<VerificationState> {
    let mut wf = WorkflowController::new(client, config, session_token);

    let verification_id = wf
        .start_verification()
        .await
        .context("starting verification")?;
    tracing::info!(%verification_id, "session started");

    let result = wf
        .upload_front_document(inputs.front, inputs.document_type)
        .await;
    settle(&mut wf, result).await.context("front document")?;
    if wf.state().is_finalized() {
        return Ok(wf.state().clone());
    }

    if let Some(back) = inputs.back {
        let result = wf.upload_back_document(back, inputs.document_type).await;
        settle(&mut wf, result).await.context("back document")?;
        if wf.state().is_finalized() {
            return Ok(wf.state().clone());
        }
    }

    if let Some(challenge) = inputs.challenge.as_deref() {
        let token = wf
            .prepare_live_capture(Some(challenge))
            .await
            .context("requesting live-capture challenge")?;
        if let Some(instructions) = &token.instructions {
            tracing::info!(challenge, "{instructions}");
        }
    }

    let result = wf
        .capture_live_frame(LiveCaptureUpload::new(inputs.selfie))
        .await;
    settle(&mut wf, result).await.context("live capture")?;

    Ok(wf.state().clone())
}

/// Retry status checks while the workflow reports a processing timeout.
async fn settle(
    wf: &mut WorkflowController,
    mut result: Result<(), WorkflowError>,
) -> Result<(), WorkflowError> {
    while let Err(WorkflowError::Timeout { phase }) = result {
        tracing::warn!(%phase, "processing timed out; checking status again");
        result = wf.retry_status_check().await;
    }
    result
}

/// Process exit code for a finished session.
pub fn exit_code(state: &VerificationState) -> u8 {
    match state.outcome() {
        Some(Outcome::Verified) => 0,
        Some(Outcome::Failed) => 2,
        Some(Outcome::ManualReview) => 3,
        None => 1,
    }
}
