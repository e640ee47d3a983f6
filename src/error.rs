//! Error types for the flashgen library.
//!
//! Two error types reflect two levels of failure:
//!
//! * [`StrategyError`] (local): one extraction engine could not read the
//!   document. The extractor records it and moves on to the next engine for
//!   the same format. It never reaches the caller on its own.
//!
//! * [`PipelineError`] (terminal): every fallback for a stage is
//!   exhausted (or the request itself is invalid). Returned as
//!   `Err(PipelineError)` from [`crate::Pipeline::generate`] and rendered as a
//!   structured JSON error at the HTTP boundary.
//!
//! Every [`PipelineError`] variant maps to exactly one [`ErrorKind`], which is
//! what clients and logs key on.

use crate::document::SourceFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum number of characters of upstream text kept in an error message.
pub const PREVIEW_CHARS: usize = 200;

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request was missing a field or carried an invalid value.
    InvalidRequest,
    /// No extractor recognises the declared media type.
    UnsupportedFormat,
    /// The format is known but no usable text came out of it.
    ExtractionFailed,
    /// No API key configured for the model gateway.
    MissingCredential,
    /// Transport failure or timeout reaching the model provider.
    UpstreamUnavailable,
    /// The model provider answered with a non-success or unusable response.
    UpstreamRejected,
    /// The model output could not be coerced into the expected schema.
    MalformedResponse,
    /// Unexpected internal failure (task panic, invalid configuration).
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::ExtractionFailed => "extraction_failed",
            ErrorKind::MissingCredential => "missing_credential",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamRejected => "upstream_rejected",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All terminal errors returned by the flashgen pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Request errors ────────────────────────────────────────────────────
    /// A required field was missing or invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The declared media type is not handled by any extractor.
    #[error("Unsupported file type '{media_type}'. Upload a PDF, DOCX, PPTX or plain-text file.")]
    UnsupportedFormat { media_type: String },

    /// Every extraction engine ran, but the document holds no text.
    #[error("No text could be extracted from the {format} document.{hint}")]
    EmptyDocument {
        format: SourceFormat,
        hint: &'static str,
    },

    /// Every extraction engine for the format failed.
    #[error("Failed to extract text from the {format} document: {detail}")]
    ExtractionFailed { format: SourceFormat, detail: String },

    // ── Gateway errors ────────────────────────────────────────────────────
    /// No API key is configured, so no request was sent.
    #[error("No API key configured for provider '{provider}'.\nSet {env_var} and restart the server.")]
    MissingCredential {
        provider: String,
        env_var: &'static str,
    },

    /// The provider could not be reached (DNS, refused connection, timeout).
    #[error("Model provider unreachable: {detail}")]
    UpstreamUnavailable { detail: String },

    /// The provider answered, but not with a usable completion.
    #[error("Model provider rejected the request (HTTP {status}): {body}")]
    UpstreamRejected { status: u16, body: String },

    // ── Normalisation errors ──────────────────────────────────────────────
    /// The completion could not be turned into the expected JSON shape.
    #[error("AI response could not be parsed: {reason}. Response began with: {preview:?}")]
    MalformedResponse { reason: String, preview: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            PipelineError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            PipelineError::EmptyDocument { .. } | PipelineError::ExtractionFailed { .. } => {
                ErrorKind::ExtractionFailed
            }
            PipelineError::MissingCredential { .. } => ErrorKind::MissingCredential,
            PipelineError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            PipelineError::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            PipelineError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status used when this error crosses the boundary.
    ///
    /// Problems the uploader can fix by changing the request are 400;
    /// everything else is 500.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::InvalidRequest(_)
            | PipelineError::UnsupportedFormat { .. }
            | PipelineError::EmptyDocument { .. } => 400,
            _ => 500,
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// Transport hiccups are transient, and model output is
    /// non-deterministic, so a malformed reply can come back well-formed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::UpstreamUnavailable { .. } | PipelineError::MalformedResponse { .. }
        )
    }

    /// Build a [`PipelineError::MalformedResponse`] with a bounded preview.
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        PipelineError::MalformedResponse {
            reason: reason.into(),
            preview: preview(raw, PREVIEW_CHARS),
        }
    }
}

/// A single extraction engine failed on a document.
#[derive(Debug, Clone, Error)]
#[error("{strategy}: {detail}")]
pub struct StrategyError {
    pub strategy: &'static str,
    pub detail: String,
}

impl StrategyError {
    pub fn new(strategy: &'static str, detail: impl fmt::Display) -> Self {
        Self {
            strategy,
            detail: detail.to_string(),
        }
    }
}

/// Truncate `text` to at most `max_chars` characters on a char boundary,
/// appending an ellipsis when something was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\u{2026}", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
