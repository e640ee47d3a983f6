//! Input-side data model: uploaded documents and extracted text.
//!
//! An [`UploadedDocument`] is created once at the boundary and consumed by the
//! extractor. [`SourceFormat::detect`] decides which extraction strategies run
//! for it: the declared media type wins, and the filename suffix is consulted
//! only when the media type is absent or too generic to be useful (browsers
//! routinely label `.docx` uploads as `application/octet-stream` or
//! `application/zip`).

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_TEXT: &str = "text/plain";

/// Media types that say nothing about the content and trigger suffix detection.
const GENERIC_MEDIA_TYPES: &[&str] = &[
    "application/octet-stream",
    "binary/octet-stream",
    "application/zip",
    "application/x-zip-compressed",
];

/// A file submitted by a client. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    bytes: Bytes,
    media_type: Option<String>,
    filename: String,
}

impl UploadedDocument {
    pub fn new(
        bytes: impl Into<Bytes>,
        media_type: Option<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.filter(|m| !m.trim().is_empty()),
            filename: filename.into(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Docx,
    Pptx,
    Plaintext,
}

impl SourceFormat {
    /// Resolve the format of a document from its media type, falling back to
    /// the filename suffix for absent or generic media types.
    ///
    /// Returns `None` when neither identifies a supported format.
    pub fn detect(media_type: Option<&str>, filename: &str) -> Option<Self> {
        let essence = media_type.map(media_type_essence).unwrap_or_default();

        if !essence.is_empty() && !GENERIC_MEDIA_TYPES.contains(&essence.as_str()) {
            return Self::from_media_type(&essence);
        }
        Self::from_filename(filename)
    }

    /// Map a media type (without parameters) to a format.
    pub fn from_media_type(essence: &str) -> Option<Self> {
        match essence {
            MIME_PDF | "application/x-pdf" => Some(SourceFormat::Pdf),
            MIME_DOCX => Some(SourceFormat::Docx),
            MIME_PPTX => Some(SourceFormat::Pptx),
            e if e.starts_with("text/") => Some(SourceFormat::Plaintext),
            _ => None,
        }
    }

    /// Map a filename suffix to a format, case-insensitively.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "docx" => Some(SourceFormat::Docx),
            "pptx" => Some(SourceFormat::Pptx),
            "txt" | "md" | "markdown" | "csv" => Some(SourceFormat::Plaintext),
            _ => None,
        }
    }

    /// File suffix used for temp files handed to extraction engines.
    pub fn suffix(&self) -> &'static str {
        match self {
            SourceFormat::Pdf => ".pdf",
            SourceFormat::Docx => ".docx",
            SourceFormat::Pptx => ".pptx",
            SourceFormat::Plaintext => ".txt",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::Docx => "docx",
            SourceFormat::Pptx => "pptx",
            SourceFormat::Plaintext => "plaintext",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cased media type with any `; param=value` suffix removed.
fn media_type_essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Plain text recovered from a document.
///
/// Only constructed by the extractor, which guarantees `text` is non-empty
/// after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub format: SourceFormat,
    /// Name of the strategy that produced the text.
    pub strategy: &'static str,
}
