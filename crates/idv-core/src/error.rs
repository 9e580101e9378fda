//! # Error Types
//!
//! `CoreError` covers malformed primitive values (identifiers, timestamps).
//! `ValidationError` covers user input rejected locally, before any network
//! call. Validation errors are reported immediately and never retried.

use thiserror::Error;

/// Errors constructing core primitive values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was empty or contained forbidden characters.
    #[error("invalid {kind}: {reason}")]
    InvalidIdentifier {
        /// Which identifier kind was rejected.
        kind: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A timestamp string could not be parsed or was not UTC.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Local input validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// File content type is not on the allow-list.
    #[error("unsupported file type {content_type:?}; expected JPEG, PNG or PDF")]
    UnsupportedContentType {
        /// The content type as supplied.
        content_type: String,
    },

    /// PDF was supplied where only images are accepted.
    #[error("{content_type} is not accepted for {purpose}")]
    ContentTypeNotAllowedFor {
        /// The content type as supplied.
        content_type: String,
        /// What the file was meant for.
        purpose: &'static str,
    },

    /// File exceeds the configured size ceiling.
    #[error("file is {size} bytes; maximum is {max} bytes")]
    FileTooLarge {
        /// Actual size.
        size: usize,
        /// Allowed maximum.
        max: usize,
    },

    /// File has no content.
    #[error("file is empty")]
    EmptyFile,

    /// The live-capture frame was not valid base64.
    #[error("live capture frame is not valid base64: {0}")]
    InvalidFrameEncoding(String),

    /// Document type is not enabled for this session.
    #[error("document type {0} is not accepted by this session")]
    DocumentTypeNotAccepted(String),

    /// A back-of-ID upload was attempted but the session does not require one.
    #[error("this session does not require a back-of-ID document")]
    BackOfIdNotRequired,
}
