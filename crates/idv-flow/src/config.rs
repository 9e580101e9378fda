//! Workflow configuration.
//!
//! Plain serde data so a host can load it from JSON or YAML. Every field
//! has a default; an empty document yields [`WorkflowConfig::default`].

use std::time::Duration;

use idv_core::{DocumentType, ValidationError, DEFAULT_MAX_FILE_BYTES};
use serde::{Deserialize, Serialize};

/// The processing phases that poll the remote status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    FrontDocument,
    BackDocument,
    CrossValidation,
    LiveCapture,
}

impl PollPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrontDocument => "front_document",
            Self::BackDocument => "back_document",
            Self::CrossValidation => "cross_validation",
            Self::LiveCapture => "live_capture",
        }
    }
}

impl std::fmt::Display for PollPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interval, timeout and transport-retry budget of one poll phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    pub interval_ms: u64,
    pub timeout_ms: u64,
    /// Consecutive transport failures tolerated per status check.
    pub max_transport_retries: u32,
    pub retry_delay_ms: u64,
}

impl PollPolicy {
    pub const fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval_ms,
            timeout_ms,
            max_transport_retries: 3,
            retry_delay_ms: 2_000,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(3_000, 180_000)
    }
}

/// Per-phase polling policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicies {
    pub front_document: PollPolicy,
    pub back_document: PollPolicy,
    pub cross_validation: PollPolicy,
    pub live_capture: PollPolicy,
}

impl Default for PollPolicies {
    fn default() -> Self {
        Self {
            front_document: PollPolicy::new(3_000, 180_000),
            back_document: PollPolicy::new(3_000, 180_000),
            cross_validation: PollPolicy::new(5_000, 180_000),
            live_capture: PollPolicy::new(3_000, 120_000),
        }
    }
}

impl PollPolicies {
    pub fn for_phase(&self, phase: PollPhase) -> PollPolicy {
        match phase {
            PollPhase::FrontDocument => self.front_document,
            PollPhase::BackDocument => self.back_document,
            PollPhase::CrossValidation => self.cross_validation,
            PollPhase::LiveCapture => self.live_capture,
        }
    }
}

/// Session configuration consulted by the workflow controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub require_back_of_id: bool,
    pub require_cross_validation: bool,
    pub accepted_document_types: Vec<DocumentType>,
    pub max_file_bytes: usize,
    /// Minimum cross-validation score that passes when the server has not
    /// declared a status.
    pub cross_validation_threshold: f64,
    /// Manual status-check retries allowed after a poll timeout.
    pub max_status_retries: u32,
    pub polling: PollPolicies,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            require_back_of_id: true,
            require_cross_validation: true,
            accepted_document_types: DocumentType::ALL.to_vec(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            cross_validation_threshold: 0.7,
            max_status_retries: 3,
            polling: PollPolicies::default(),
        }
    }
}

impl WorkflowConfig {
    /// Reject a document type this session does not accept.
    pub fn check_document_type(&self, document_type: DocumentType) -> Result<(), ValidationError> {
        if self.accepted_document_types.contains(&document_type) {
            Ok(())
        } else {
            Err(ValidationError::DocumentTypeNotAccepted(
                document_type.as_str().to_string(),
            ))
        }
    }

    /// Whether live capture is gated on a passed cross-validation.
    ///
    /// Cross-validation compares front and back, so without a back-of-ID
    /// there is nothing to cross-validate.
    pub fn cross_validation_enabled(&self) -> bool {
        self.require_back_of_id && self.require_cross_validation
    }

    pub fn poll_policy(&self, phase: PollPhase) -> PollPolicy {
        self.polling.for_phase(phase)
    }
}
