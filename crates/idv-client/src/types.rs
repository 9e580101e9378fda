//! Request and response types for the verification API.
//!
//! Remote status strings are a closed enum ([`RemoteStatus`]) with a
//! catch-all for values this client does not know. Every optional field on
//! a [`StatusSnapshot`] defaults to absent so partial payloads parse.

use idv_core::{DocumentFile, DocumentType, LiveCaptureFrame, SessionToken, Timestamp};
use serde::{Deserialize, Deserializer, Serialize};

/// Verification status as reported by the remote service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    #[default]
    Pending,
    Processing,
    Verified,
    Failed,
    ManualReview,
    /// Legacy value. Ambiguous, never treated as a decision.
    Completed,
    /// Any status string this client does not recognise.
    #[serde(other)]
    Unknown,
}

impl RemoteStatus {
    /// Whether the server has declared a final decision.
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
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn status_or_default<'de, D>(deserializer: D) -> Result<RemoteStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RemoteStatus>::deserialize(deserializer)?.unwrap_or_default())
}

/// Server timestamps may carry any RFC 3339 offset; they are held as UTC.
fn utc_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| Timestamp::parse_rfc3339(&raw).map_err(serde::de::Error::custom))
        .transpose()
}

/// Server-side cross-validation detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationResults {
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub validation_results: Option<serde_json::Value>,
    #[serde(default)]
    pub discrepancies: Option<Vec<String>>,
}

/// One `GET /api/verify/status/{id}` observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default, deserialize_with = "status_or_default")]
    pub status: RemoteStatus,
    #[serde(default)]
    pub ocr_data: Option<serde_json::Value>,
    #[serde(default)]
    pub barcode_data: Option<serde_json::Value>,
    #[serde(default)]
    pub cross_validation_score: Option<f64>,
    #[serde(default)]
    pub cross_validation_results: Option<CrossValidationResults>,
    #[serde(default)]
    pub face_match_score: Option<f64>,
    #[serde(default)]
    pub liveness_score: Option<f64>,
    /// Present on legacy `completed` payloads. Never used to decide an outcome.
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub manual_review_reason: Option<String>,
    #[serde(default)]
    pub back_document_uploaded: Option<bool>,
}

impl StatusSnapshot {
    /// Snapshot with only a status set.
    pub fn with_status(status: RemoteStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Cross-validation score, falling back to the nested result's `match_score`.
    pub fn cross_validation_score(&self) -> Option<f64> {
        self.cross_validation_score.or_else(|| {
            self.cross_validation_results
                .as_ref()
                .and_then(|r| r.match_score)
        })
    }

    /// Whether OCR has produced non-empty extracted data.
    pub fn has_ocr_data(&self) -> bool {
        match &self.ocr_data {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
        }
    }

    /// Whether both face-match and liveness scores are present.
    pub fn has_live_scores(&self) -> bool {
        self.face_match_score.is_some() && self.liveness_score.is_some()
    }

    /// Server-supplied reason for the current terminal status, if any.
    pub fn terminal_reason(&self) -> Option<&str> {
        match self.status {
            RemoteStatus::Failed => self.failure_reason.as_deref(),
            RemoteStatus::ManualReview => self.manual_review_reason.as_deref(),
            _ => None,
        }
    }
}

/// Status responses come either bare or wrapped in `{"verification": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StatusEnvelope {
    Wrapped { verification: StatusSnapshot },
    Bare(StatusSnapshot),
}

impl StatusEnvelope {
    pub(crate) fn into_snapshot(self) -> StatusSnapshot {
        match self {
            Self::Wrapped { verification } => verification,
            Self::Bare(snapshot) => snapshot,
        }
    }
}

/// What the client needs to open a session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Sent as `user_id`.
    pub session_token: SessionToken,
}

impl SessionContext {
    pub fn new(session_token: SessionToken) -> Self {
        Self { session_token }
    }
}

/// `POST /api/verify/start` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StartResponse {
    pub verification_id: String,
    #[serde(default, deserialize_with = "status_or_default")]
    pub status: RemoteStatus,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default, deserialize_with = "utc_timestamp")]
    pub created_at: Option<Timestamp>,
}

/// A document upload: validated file, its type and optional metadata.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub document_type: DocumentType,
    pub file: DocumentFile,
    /// Free-form JSON sent as a string form field.
    pub metadata: Option<serde_json::Value>,
}

impl DocumentUpload {
    pub fn new(document_type: DocumentType, file: DocumentFile) -> Self {
        Self {
            document_type,
            file,
            metadata: None,
        }
    }
}

/// A live-capture upload.
#[derive(Debug, Clone)]
pub struct LiveCaptureUpload {
    pub frame: LiveCaptureFrame,
    pub challenge_response: Option<String>,
}

impl LiveCaptureUpload {
    pub fn new(frame: LiveCaptureFrame) -> Self {
        Self {
            frame,
            challenge_response: None,
        }
    }
}

/// Acknowledgement returned by upload endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub verification_id: Option<String>,
    #[serde(default, deserialize_with = "status_or_default")]
    pub status: RemoteStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Challenge issued ahead of a live capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveToken {
    pub token: String,
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default, deserialize_with = "utc_timestamp")]
    pub expires_at: Option<Timestamp>,
}

/// `GET /api/verify/results/{id}` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationResults {
    #[serde(default)]
    pub verification_id: Option<String>,
    #[serde(default, deserialize_with = "status_or_default")]
    pub status: RemoteStatus,
    #[serde(default)]
    pub document_uploaded: Option<bool>,
    #[serde(default)]
    pub back_of_id_uploaded: Option<bool>,
    #[serde(default)]
    pub live_capture_completed: Option<bool>,
    #[serde(default)]
    pub cross_validation_results: Option<CrossValidationResults>,
    #[serde(default)]
    pub face_match_score: Option<f64>,
    #[serde(default)]
    pub liveness_score: Option<f64>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub manual_review_reason: Option<String>,
}

/// `GET /api/health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    pub(crate) fn assumed_ok() -> Self {
        Self {
            status: "ok".into(),
            timestamp: None,
        }
    }
}
