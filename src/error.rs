//! Error types for the edgequake-export library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExportError`]: **Fatal**: the artifact cannot be produced at all
//!   (malformed slide data, unsafe filename, unwritable output folder).
//!   Returned as `Err(ExportError)` from every [`crate::Exporter`] entry point.
//!   Inside a batch one fatal error aborts the whole batch.
//!
//! * [`BlockError`]: **Non-fatal**: one block of one document failed (an
//!   image could not be found, fetched or decoded). The renderer substitutes
//!   a placeholder text block and carries on; the error is only reported
//!   through [`crate::progress::ExportProgressCallback::on_block_degraded`].
//!
//! Template load failures and backend write failures are neither: they are
//! recovered inside the exporter (blank document, single-paragraph fallback)
//! and only logged.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-export library.
///
/// Block-level failures use [`BlockError`] and never surface here.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A slide entry is not a mapping.
    #[error("Slide {index} is invalid: {reason}\nEach slide must be an object like {{\"title\": \"...\", \"content\": [...]}}.")]
    InvalidSlide { index: usize, reason: String },

    /// The serialized slide list could not be parsed, or is not a list.
    #[error("Invalid slides data: {reason}\nExpected a JSON list of slide objects.")]
    InvalidSlidesData { reason: String },

    /// Content has the wrong shape for the requested format.
    #[error("Invalid content for {format}: {reason}")]
    InvalidContent { format: String, reason: String },

    /// The caller-supplied filename is unsafe or empty.
    #[error("Invalid filename '{name}': {reason}\nFilenames must be relative and must not contain '..'.")]
    InvalidFilename { name: String, reason: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The writer failed on the full content and on the fallback content.
    #[error("Failed to render {format} document: {detail}")]
    RenderFailed { format: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the export folder or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A template file exists but could not be read.
    #[error("Failed to read template '{path}': {source}\nCheck FILE_EXPORT_TEMPLATE_DIR permissions.")]
    TemplateReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive assembly failed.
    #[error("Archive assembly failed: {0}")]
    Archive(#[from] export_archive::ArchiveError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single content block.
///
/// The block is replaced by a placeholder and the document is still written.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BlockError {
    /// The image provider returned no result for the query.
    #[error("No image found for '{query}'")]
    ImageNotFound { query: String },

    /// HTTP download or local file read failed.
    #[error("Failed to fetch image '{reference}': {detail}")]
    FetchFailed { reference: String, detail: String },

    /// The provider or the download did not answer in time.
    #[error("Image request for '{reference}' timed out after {secs}s")]
    Timeout { reference: String, secs: u64 },

    /// Bytes were received but are not a decodable image.
    #[error("Image '{reference}' could not be decoded: {detail}")]
    DecodeFailed { reference: String, detail: String },

    /// No image provider is configured (or its credentials are missing).
    #[error("No image provider is available")]
    NoProvider,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_slide_display() {
        let e = ExportError::InvalidSlide {
            index: 2,
            reason: "expected an object, got a string".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Slide 2"), "got: {msg}");
        assert!(msg.contains("\"title\""), "got: {msg}");
    }

    #[test]
    fn invalid_filename_display() {
        let e = ExportError::InvalidFilename {
            name: "../x.pdf".into(),
            reason: "'..' is not allowed".into(),
        };
        assert!(e.to_string().contains("../x.pdf"));
    }

    #[test]
    fn archive_error_converts() {
        let inner = export_archive::ArchiveError::UnsupportedFormat("rar".into());
        let e: ExportError = inner.into();
        assert!(e.to_string().contains("rar"));
    }

    #[test]
    fn block_error_timeout_display() {
        let e = BlockError::Timeout {
            reference: "sunset".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
        assert!(e.to_string().contains("sunset"));
    }

    #[test]
    fn block_error_serialises() {
        let e = BlockError::ImageNotFound {
            query: "mountains".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: BlockError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
