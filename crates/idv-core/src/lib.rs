//! # idv-core — Foundational Types for the Verification Engine
//!
//! Leaf crate of the workspace. Defines the identifiers, timestamps and
//! input types that every other crate shares, plus the local validation
//! rules applied to user-supplied files before anything touches the network.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `SessionToken` and `VerificationId` are
//!    distinct types. A verification id cannot be passed where a session
//!    token is expected.
//!
//! 2. **UTC-only timestamps.** `Timestamp` is UTC, seconds precision, and
//!    renders with a `Z` suffix.
//!
//! 3. **Validate before transmit.** `DocumentFile` and `LiveCaptureFrame`
//!    carry the checks from the file-input rules (content-type allow-list,
//!    size ceiling, decodable base64). A value that fails them never reaches
//!    the remote client.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `idv-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod document;
pub mod error;
pub mod identity;
pub mod temporal;

pub use document::{
    ContentType, DocumentFile, DocumentSide, DocumentType, LiveCaptureFrame, DEFAULT_MAX_FILE_BYTES,
};
pub use error::{CoreError, ValidationError};
pub use identity::{SessionToken, VerificationId};
pub use temporal::Timestamp;
