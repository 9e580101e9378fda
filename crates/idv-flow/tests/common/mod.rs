//! Scripted remote client shared by the workflow integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use idv_client::{
    ClientError, DocumentUpload, LiveCaptureUpload, LiveToken, RemoteStatus,
    RemoteVerificationClient, SessionContext, StatusSnapshot, UploadReceipt,
};
use idv_core::{DocumentFile, SessionToken, VerificationId, DEFAULT_MAX_FILE_BYTES};
use idv_flow::{PollPolicies, PollPolicy, WorkflowConfig, WorkflowController};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// JPEG magic bytes, base64.
pub const SELFIE_B64: &str = "/9j/4AAQSkZJRgABAQ==";

pub const VERIFICATION_ID: &str = "verif_abc123";

#[derive(Debug, Default)]
pub struct CallCounts {
    pub start: AtomicUsize,
    pub upload_front: AtomicUsize,
    pub upload_back: AtomicUsize,
    pub live_capture: AtomicUsize,
    pub live_token: AtomicUsize,
    pub status: AtomicUsize,
}

impl CallCounts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Calls that would have touched the network.
    pub fn total(&self) -> usize {
        [
            &self.start,
            &self.upload_front,
            &self.upload_back,
            &self.live_capture,
            &self.live_token,
            &self.status,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

/// Fake remote service.
///
/// `get_status` pops scripted responses in order and repeats the last one
/// once the script runs down. `Err(code)` entries fail with the error the
/// real client maps that HTTP status to. Other operations succeed unless a
/// one-shot failure was registered with [`ScriptedClient::fail_next`].
#[derive(Debug, Default)]
pub struct ScriptedClient {
    statuses: Mutex<VecDeque<Result<StatusSnapshot, u16>>>,
    failures: Mutex<HashMap<&'static str, u16>>,
    pub calls: CallCounts,
    pub challenge_responses: Mutex<Vec<Option<String>>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the status script.
    pub fn script<I>(&self, entries: I)
    where
        I: IntoIterator<Item = Result<StatusSnapshot, u16>>,
    {
        *self.statuses.lock() = entries.into_iter().collect();
    }

    /// Replace the status script with successful snapshots.
    pub fn script_ok<I>(&self, snapshots: I)
    where
        I: IntoIterator<Item = StatusSnapshot>,
    {
        self.script(snapshots.into_iter().map(Ok));
    }

    /// Make the next call of `operation` fail with `status`.
    pub fn fail_next(&self, operation: &'static str, status: u16) {
        self.failures.lock().insert(operation, status);
    }

    fn take_failure(&self, operation: &'static str) -> Result<(), ClientError> {
        match self.failures.lock().remove(operation) {
            Some(status) => Err(error_for(operation, status)),
            None => Ok(()),
        }
    }

    fn receipt(status: RemoteStatus) -> UploadReceipt {
        UploadReceipt {
            verification_id: Some(VERIFICATION_ID.into()),
            status,
            message: None,
        }
    }
}

/// The error the real client produces for an HTTP status.
pub fn error_for(endpoint: &str, status: u16) -> ClientError {
    let endpoint = endpoint.to_string();
    match status {
        400 => ClientError::Validation {
            endpoint,
            message: "Invalid document format".into(),
            field: Some("document".into()),
            details: None,
        },
        401 => ClientError::Authentication {
            message: "Invalid API key".into(),
        },
        404 => ClientError::NotFound {
            resource: "Verification".into(),
        },
        429 => ClientError::RateLimited {
            message: "Too many requests".into(),
            retry_after: Some(1),
        },
        500..=599 => ClientError::Server {
            endpoint,
            status,
            message: "internal error".into(),
        },
        _ => ClientError::Api {
            endpoint,
            status,
            body: String::new(),
        },
    }
}

#[async_trait]
impl RemoteVerificationClient for ScriptedClient {
    async fn start(&self, _context: &SessionContext) -> Result<VerificationId, ClientError> {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        self.take_failure("start")?;
        Ok(VerificationId::new(VERIFICATION_ID).unwrap())
    }

    async fn upload_front_document(
        &self,
        _verification_id: &VerificationId,
        _upload: &DocumentUpload,
    ) -> Result<UploadReceipt, ClientError> {
        self.calls.upload_front.fetch_add(1, Ordering::SeqCst);
        self.take_failure("upload_front")?;
        Ok(Self::receipt(RemoteStatus::Processing))
    }

    async fn upload_back_document(
        &self,
        _verification_id: &VerificationId,
        _upload: &DocumentUpload,
    ) -> Result<UploadReceipt, ClientError> {
        self.calls.upload_back.fetch_add(1, Ordering::SeqCst);
        self.take_failure("upload_back")?;
        Ok(Self::receipt(RemoteStatus::Processing))
    }

    async fn upload_live_capture(
        &self,
        _verification_id: &VerificationId,
        upload: &LiveCaptureUpload,
    ) -> Result<UploadReceipt, ClientError> {
        self.calls.live_capture.fetch_add(1, Ordering::SeqCst);
        self.take_failure("live_capture")?;
        self.challenge_responses
            .lock()
            .push(upload.challenge_response.clone());
        Ok(Self::receipt(RemoteStatus::Processing))
    }

    async fn generate_live_token(
        &self,
        _verification_id: &VerificationId,
        challenge_type: Option<&str>,
    ) -> Result<LiveToken, ClientError> {
        self.calls.live_token.fetch_add(1, Ordering::SeqCst);
        self.take_failure("live_token")?;
        Ok(LiveToken {
            token: "live_tok_1".into(),
            challenge: challenge_type.map(str::to_string),
            instructions: Some("Look at the camera".into()),
            expires_at: None,
        })
    }

    async fn get_status(
        &self,
        _verification_id: &VerificationId,
    ) -> Result<StatusSnapshot, ClientError> {
        self.calls.status.fetch_add(1, Ordering::SeqCst);
        let entry = {
            let mut script = self.statuses.lock();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };
        match entry {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(status)) => Err(error_for("status", status)),
            None => Ok(StatusSnapshot::with_status(RemoteStatus::Processing)),
        }
    }
}

// ── Snapshots ────────────────────────────────────────────────────────

pub fn snapshot(value: Value) -> StatusSnapshot {
    serde_json::from_value(value).unwrap()
}

pub fn processing() -> StatusSnapshot {
    snapshot(json!({"status": "processing"}))
}

pub fn front_processed() -> StatusSnapshot {
    snapshot(json!({
        "status": "processing",
        "ocr_data": {"name": "John Doe", "dob": "1990-01-01"}
    }))
}

pub fn back_processed() -> StatusSnapshot {
    snapshot(json!({
        "status": "processing",
        "ocr_data": {"name": "John Doe", "dob": "1990-01-01"},
        "barcode_data": {"name": "JOHN DOE", "dob": "19900101"},
        "back_document_uploaded": true
    }))
}

pub fn cross_validated(score: f64) -> StatusSnapshot {
    snapshot(json!({
        "status": "processing",
        "cross_validation_results": {"match_score": score}
    }))
}

// ── Fixtures ─────────────────────────────────────────────────────────

/// One-second polls with a ten-second window and one transport retry.
pub fn fast_config() -> WorkflowConfig {
    let policy = PollPolicy {
        interval_ms: 1_000,
        timeout_ms: 10_000,
        max_transport_retries: 1,
        retry_delay_ms: 100,
    };
    WorkflowConfig {
        polling: PollPolicies {
            front_document: policy,
            back_document: policy,
            cross_validation: policy,
            live_capture: policy,
        },
        ..WorkflowConfig::default()
    }
}

pub fn controller(client: &Arc<ScriptedClient>, config: WorkflowConfig) -> WorkflowController {
    WorkflowController::new(
        client.clone(),
        config,
        SessionToken::new("user-123").unwrap(),
    )
}

pub fn jpeg(name: &str) -> DocumentFile {
    DocumentFile::new(
        name,
        "image/jpeg",
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10],
        DEFAULT_MAX_FILE_BYTES,
    )
    .unwrap()
}
