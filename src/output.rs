//! Result records produced by the scanner and their wire shapes.
//!
//! Everything here derives `Serialize`/`Deserialize` so outcomes can be
//! returned to a browser client or written as JSON by the CLI unchanged.

use crate::error::{FileError, PageError};
use serde::{Deserialize, Serialize};

/// Base64 thumbnail of a document's first page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewArtifact {
    /// Standard-alphabet base64 of the encoded thumbnail.
    pub data: String,
    /// Media type of the encoded bytes, e.g. `image/jpeg`.
    pub media_type: String,
    pub width: u32,
    pub height: u32,
}

/// Text and preview extracted from one successfully processed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Unique server-side name: `{uuid}_{sanitised original name}`.
    pub filename: String,
    pub original_filename: String,
    /// Page-ordered document text.
    pub text: String,
    /// Base64 thumbnail of page 1.
    pub preview: String,
    pub preview_media_type: String,
    /// Detected type: `pdf`, `jpeg`, `png`, `bmp` or `tiff`.
    pub file_type: String,
    /// Length of `text` in characters.
    pub text_length: usize,
    /// `true` when `text` contains anything besides whitespace.
    pub has_text: bool,
    pub page_count: usize,
    /// Mean line confidence, when the engine reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_confidence: Option<f32>,
}

/// Outcome for one upload. Exactly one per submitted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    /// 0-based position of the file in the submission.
    pub index: usize,
    pub success: bool,
    pub message: String,
    pub original_filename: String,
    /// Detected type, when detection got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ExtractedDocument>,
    /// Machine-readable failure code, see [`FileError::code`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Page-level problems. On a `RECOGNITION_ERROR` outcome they are the
    /// reason the file failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<PageError>,
}

impl ProcessingOutcome {
    pub(crate) fn succeeded(
        index: usize,
        document: ExtractedDocument,
        diagnostics: Vec<PageError>,
    ) -> Self {
        Self {
            index,
            success: true,
            message: "Document recognition complete".to_string(),
            original_filename: document.original_filename.clone(),
            file_type: Some(document.file_type.clone()),
            data: Some(document),
            error_code: None,
            diagnostics,
        }
    }

    pub(crate) fn failed(
        index: usize,
        original_filename: impl Into<String>,
        file_type: Option<String>,
        error: &FileError,
        diagnostics: Vec<PageError>,
    ) -> Self {
        Self {
            index,
            success: false,
            message: error.to_string(),
            original_filename: original_filename.into(),
            file_type,
            data: None,
            error_code: Some(error.code().to_string()),
            diagnostics,
        }
    }

    /// Document text, if the file succeeded.
    pub fn text(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.text.as_str())
    }
}

/// Summary counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Reduce a slice of outcomes to counts.
    pub fn from_outcomes(outcomes: &[ProcessingOutcome]) -> Self {
        let success = outcomes.iter().filter(|o| o.success).count();
        Self {
            total: outcomes.len(),
            success,
            failed: outcomes.len() - success,
        }
    }
}

/// Outcomes of a batch, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<ProcessingOutcome>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn from_outcomes(results: Vec<ProcessingOutcome>) -> Self {
        let summary = BatchSummary::from_outcomes(&results);
        Self { results, summary }
    }
}

/// Response envelope: `{success, message, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEnvelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ScanEnvelope<ExtractedDocument> {
    /// Envelope for the single-file flow.
    pub fn single(outcome: ProcessingOutcome) -> Self {
        Self {
            success: outcome.success,
            message: outcome.message,
            data: outcome.data,
            error_code: outcome.error_code,
        }
    }
}

impl ScanEnvelope<BatchReport> {
    /// Envelope for the batch flow. The batch itself succeeded even when
    /// individual files failed.
    pub fn batch(report: BatchReport) -> Self {
        Self {
            success: true,
            message: format!(
                "Batch processing complete: {}/{} succeeded",
                report.summary.success, report.summary.total
            ),
            data: Some(report),
            error_code: None,
        }
    }
}

/// PDF document metadata, available without rendering any page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}
