//! Error types for the edgequake-docscan library.
//!
//! Three layers reflect three blast radii:
//!
//! * [`DocScanError`] (**fatal**): nothing more can be processed in this
//!   request (recognition engine unavailable, PDF renderer cannot be bound,
//!   empty batch). Returned as `Err(DocScanError)` from the `scan*` functions.
//!
//! * [`FileError`] (**per file**): one upload could not be turned into text
//!   (wrong type, too large, corrupt, zero pages). The batch coordinator
//!   converts it into a failed [`crate::output::ProcessingOutcome`] and moves
//!   on to the next file.
//!
//! * [`PageError`] (**per page**): one page failed to render or recognise.
//!   Recorded as a diagnostic on the outcome; the page contributes an empty
//!   string to the document text.
//!
//! Inside the pipeline, stages return [`StageError`], which carries either a
//! fatal or a per-file error up to the batch coordinator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort the whole request.
#[derive(Debug, Error)]
pub enum DocScanError {
    /// The recognition engine could not be created, or reported that it is
    /// no longer usable.
    #[error("OCR engine '{engine}' is unavailable: {detail}")]
    EngineInitialization { engine: String, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "PDF renderer unavailable: {0}\n\
Set PDFIUM_LIB_PATH (or --pdfium-lib) to the path of libpdfium, or install it system-wide."
    )]
    RendererUnavailable(String),

    /// A batch was submitted with no files in it.
    #[error("No files were submitted")]
    EmptyBatch,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A failure confined to a single uploaded file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FileError {
    /// Declared type / extension is not one of pdf, jpeg, png, bmp, tiff.
    #[error("Unsupported file format '{declared}'. Supported formats: pdf, jpeg, png, bmp, tiff")]
    UnsupportedFormat { declared: String },

    /// Payload exceeds the configured size limit.
    #[error("File size {size} bytes exceeds the limit of {limit} bytes ({} MiB)", .limit / (1024 * 1024))]
    FileTooLarge { size: usize, limit: usize },

    /// Bytes could not be decoded. `detail` is kept for logs and never shown
    /// to the client.
    #[error("Could not process file: the content is corrupt or in an unreadable layout")]
    Decode { detail: String },

    /// The PDF parsed but contains no pages.
    #[error("The PDF document contains no pages")]
    EmptyDocument,

    /// No page of the document could be recognised. `diagnostics` holds one
    /// entry per page and is reported next to the outcome.
    #[error("Text recognition failed on all {pages} page(s)")]
    Recognition {
        pages: usize,
        diagnostics: Vec<PageError>,
    },
}

impl FileError {
    /// Stable machine-readable code, carried in serialised outcomes.
    pub fn code(&self) -> &'static str {
        match self {
            FileError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            FileError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            FileError::Decode { .. } => "DECODE_ERROR",
            FileError::EmptyDocument => "EMPTY_DOCUMENT",
            FileError::Recognition { .. } => "RECOGNITION_ERROR",
        }
    }

    pub(crate) fn decode(detail: impl Into<String>) -> Self {
        FileError::Decode {
            detail: detail.into(),
        }
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rendering failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The recognizer returned an error for this page.
    #[error("Page {page}: recognition failed: {detail}")]
    RecognitionFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-based page the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. } | PageError::RecognitionFailed { page, .. } => {
                *page
            }
        }
    }
}

/// Error returned by a [`crate::pipeline::recognize::Recognizer`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecognizeError {
    /// The engine itself is not usable. Never page-scoped.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// This page could not be recognised.
    #[error("{0}")]
    Failed(String),
}

/// Failure of one pipeline stage for one file: either the file is at fault
/// and the batch moves on, or the request cannot continue.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Fatal(#[from] DocScanError),

    #[error(transparent)]
    File(#[from] FileError),
}

/// Errors from the analysis forwarding step.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Analysis content must not be empty")]
    EmptyContent,

    #[error("Content length {length} exceeds the limit of {limit} characters")]
    ContentTooLong { length: usize, limit: usize },

    #[error("Unknown analysis type '{0}'. Available: general, summary, extract, sentiment")]
    UnknownProfile(String),

    #[error("Analysis provider error: {0}")]
    Provider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_too_large_display_mentions_limit() {
        let e = FileError::FileTooLarge {
            size: 16 * 1024 * 1024 + 1,
            limit: 16 * 1024 * 1024,
        };
        let msg = e.to_string();
        assert!(msg.contains("16777217"), "got: {msg}");
        assert!(msg.contains("16 MiB"), "got: {msg}");
    }

    #[test]
    fn decode_display_hides_detail() {
        let e = FileError::decode("xref table at offset 1234 is broken");
        let msg = e.to_string();
        assert!(msg.contains("Could not process file"));
        assert!(!msg.contains("xref"), "detail leaked: {msg}");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(FileError::EmptyDocument.code(), "EMPTY_DOCUMENT");
        assert_eq!(
            FileError::UnsupportedFormat {
                declared: "text/plain".into()
            }
            .code(),
            "UNSUPPORTED_FORMAT"
        );
    }

    #[test]
    fn page_error_serialises_with_kind_tag() {
        let e = PageError::RecognitionFailed {
            page: 2,
            detail: "timeout".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "recognition_failed");
        assert_eq!(json["page"], 2);
        assert_eq!(e.page(), 2);
    }

    #[test]
    fn engine_initialization_display() {
        let e = DocScanError::EngineInitialization {
            engine: "vlm".into(),
            detail: "no API key".into(),
        };
        assert!(e.to_string().contains("vlm"));
        assert!(e.to_string().contains("no API key"));
    }
}
