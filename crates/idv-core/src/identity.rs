//! # Session Identifiers
//!
//! A verification session is addressed by two opaque values:
//!
//! - `SessionToken` — supplied by the host when the engine is created and
//!   immutable for the lifetime of the session. Sent to the remote service
//!   as `user_id` when the session starts.
//! - `VerificationId` — assigned by the remote service on start. Every call
//!   after start is keyed on it.
//!
//! Both are validated at construction: non-empty, no whitespace, no path
//! separators (they are interpolated into URL paths).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Opaque session identifier supplied by the host application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

/// Identifier the remote service assigns to a started verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationId(String);

fn check(kind: &'static str, raw: &str) -> Result<(), CoreError> {
    if raw.is_empty() {
        return Err(CoreError::InvalidIdentifier {
            kind,
            reason: "must not be empty".into(),
        });
    }
    if let Some(c) = raw
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '\\'))
    {
        return Err(CoreError::InvalidIdentifier {
            kind,
            reason: format!("contains forbidden character {c:?}"),
        });
    }
    Ok(())
}

impl SessionToken {
    /// Validate and wrap a session token.
    pub fn new(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        check("session token", &raw)?;
        Ok(Self(raw))
    }

    /// Generate a random session token (used when the host has none).
    pub fn generate() -> Self {
        Self(format!("sess_{}", Uuid::new_v4().simple()))
    }

    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl VerificationId {
    /// Validate and wrap a verification identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        check("verification id", &raw)?;
        Ok(Self(raw))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for VerificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
