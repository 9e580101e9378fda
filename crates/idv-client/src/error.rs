//! Verification API client error types.
//!
//! Non-2xx responses are mapped onto a closed taxonomy by status code so
//! callers can tell a user-correctable rejection (400) from a credential
//! problem (401), a missing session (404), throttling (429) and server
//! faults (5xx). Only transport failures, 429 and 5xx are transient.

use serde::Deserialize;

/// Errors from verification API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The API rejected the request as invalid (HTTP 400). Surface verbatim.
    #[error("{message}")]
    Validation {
        endpoint: String,
        message: String,
        field: Option<String>,
        details: Option<serde_json::Value>,
    },
    /// The API key was rejected (HTTP 401).
    #[error("authentication failed: {message}")]
    Authentication { message: String },
    /// The addressed resource does not exist (HTTP 404).
    #[error("{resource} not found")]
    NotFound { resource: String },
    /// Request was throttled (HTTP 429).
    #[error("rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },
    /// The API failed internally (HTTP 5xx).
    #[error("verification API {endpoint} returned {status}: {message}")]
    Server {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// Any other non-2xx status.
    #[error("verification API {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Response parsed but violated the API contract.
    #[error("invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ClientError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => !source.is_builder(),
            Self::RateLimited { .. } | Self::Server { .. } => true,
            _ => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { .. } => Some(400),
            Self::Authentication { .. } => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::Server { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Map a non-2xx response body onto the taxonomy.
    pub(crate) fn from_status(endpoint: &str, status: u16, body: String) -> Self {
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed
            .message
            .clone()
            .or_else(|| parsed.error.clone())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    "API request failed".to_string()
                } else {
                    body.clone()
                }
            });

        match status {
            400 => Self::Validation {
                endpoint: endpoint.to_string(),
                message,
                field: parsed.field,
                details: parsed.details,
            },
            401 => Self::Authentication { message },
            404 => Self::NotFound {
                resource: parsed.resource.unwrap_or_else(|| "Resource".to_string()),
            },
            429 => Self::RateLimited {
                message,
                retry_after: parsed.retry_after,
            },
            500..=599 => Self::Server {
                endpoint: endpoint.to_string(),
                status,
                message,
            },
            _ => Self::Api {
                endpoint: endpoint.to_string(),
                status,
                body,
            },
        }
    }
}

/// Error body shape returned by the API. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Value>,
    #[serde(default)]
    resource: Option<String>,
    #[serde(default)]
    retry_after: Option<u64>,
}
