//! # Document and Capture Inputs
//!
//! Typed inputs for the three upload operations. Construction runs the
//! client-side checks: allow-listed content type (JPEG, PNG, PDF for
//! documents; JPEG or PNG for live capture), non-empty, and at most the
//! configured size ceiling (10 MiB unless the session overrides it).
//!
//! Live-capture frames arrive from the camera layer as base64, optionally
//! wrapped in a `data:image/jpeg;base64,` URL. [`LiveCaptureFrame::from_base64`]
//! decodes them to the binary payload that is actually transmitted.

use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default upper bound for any uploaded file.
pub const DEFAULT_MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Kind of identity document being verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Passport,
    DriversLicense,
    NationalId,
    Other,
}

impl DocumentType {
    /// All document types, in display order.
    pub const ALL: [DocumentType; 4] = [
        Self::Passport,
        Self::DriversLicense,
        Self::NationalId,
        Self::Other,
    ];

    /// Wire name sent in the `document_type` form field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passport => "passport",
            Self::DriversLicense => "drivers_license",
            Self::NationalId => "national_id",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::DocumentTypeNotAccepted(s.to_string()))
    }
}

/// Which face of the identity document a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSide {
    Front,
    Back,
}

impl std::fmt::Display for DocumentSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Front => f.write_str("front"),
            Self::Back => f.write_str("back"),
        }
    }
}

/// Allow-listed upload content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Jpeg,
    Png,
    Pdf,
}

impl ContentType {
    /// Parse a MIME string. `image/jpg` is accepted as an alias.
    pub fn from_mime(mime: &str) -> Result<Self, ValidationError> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            "application/pdf" => Ok(Self::Pdf),
            _ => Err(ValidationError::UnsupportedContentType {
                content_type: mime.to_string(),
            }),
        }
    }

    /// Detect the content type from leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(b"%PDF-") {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    /// Canonical MIME string.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Pdf => "application/pdf",
        }
    }

    /// Whether this is a raster image type.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

fn check_size(len: usize, max: usize) -> Result<(), ValidationError> {
    if len == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if len > max {
        return Err(ValidationError::FileTooLarge { size: len, max });
    }
    Ok(())
}

/// A validated document image or PDF ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentFile {
    file_name: String,
    content_type: ContentType,
    bytes: Vec<u8>,
}

impl DocumentFile {
    /// Validate a file whose MIME type was declared by the caller.
    pub fn new(
        file_name: impl Into<String>,
        mime: &str,
        bytes: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Self, ValidationError> {
        let content_type = ContentType::from_mime(mime)?;
        check_size(bytes.len(), max_bytes)?;
        Ok(Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        })
    }

    /// Validate a file whose type is inferred from its magic bytes.
    pub fn from_bytes(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Self, ValidationError> {
        check_size(bytes.len(), max_bytes)?;
        let content_type =
            ContentType::sniff(&bytes).ok_or_else(|| ValidationError::UnsupportedContentType {
                content_type: "unknown".into(),
            })?;
        Ok(Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        })
    }

    /// File name sent with the multipart part.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Validated content type.
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Raw file content.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a validated file.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for DocumentFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A decoded live-capture selfie frame.
#[derive(Clone, PartialEq, Eq)]
pub struct LiveCaptureFrame {
    content_type: ContentType,
    bytes: Vec<u8>,
}

impl LiveCaptureFrame {
    /// Decode a base64 frame, bare or as a `data:` URL.
    pub fn from_base64(encoded: &str, max_bytes: usize) -> Result<Self, ValidationError> {
        let (declared, payload) = match encoded.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or_else(|| {
                    ValidationError::InvalidFrameEncoding("data URL has no payload".into())
                })?;
                let mime = header.strip_suffix(";base64").ok_or_else(|| {
                    ValidationError::InvalidFrameEncoding("data URL is not base64".into())
                })?;
                (Some(ContentType::from_mime(mime)?), payload)
            }
            None => (None, encoded),
        };

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| ValidationError::InvalidFrameEncoding(e.to_string()))?;
        Self::from_bytes(declared, bytes, max_bytes)
    }

    /// Wrap already-binary frame data.
    pub fn from_bytes(
        declared: Option<ContentType>,
        bytes: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Self, ValidationError> {
        check_size(bytes.len(), max_bytes)?;
        let content_type = declared
            .or_else(|| ContentType::sniff(&bytes))
            .unwrap_or(ContentType::Jpeg);
        if !content_type.is_image() {
            return Err(ValidationError::ContentTypeNotAllowedFor {
                content_type: content_type.mime().into(),
                purpose: "live capture",
            });
        }
        Ok(Self {
            content_type,
            bytes,
        })
    }

    /// Image type of the frame.
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Binary frame payload.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for LiveCaptureFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveCaptureFrame")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
