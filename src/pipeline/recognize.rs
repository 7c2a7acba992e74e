//! OCR driver: run the recognition engine over a document's pages.
//!
//! The engine is a capability, [`Recognizer`], injected as
//! `Arc<dyn Recognizer>` so the pipeline can run against a vision model in
//! production and a deterministic double in tests.
//!
//! ## Failure policy
//!
//! | What failed | Effect |
//! |-------------|--------|
//! | one page (render or [`RecognizeError::Failed`]) | page contributes `""`, a [`PageError`] is recorded |
//! | every page of the document | the file fails with [`FileError::Recognition`] |
//! | [`RecognizeError::Unavailable`] on any page | the request fails with [`DocScanError::EngineInitialization`] |

use super::{Page, PageItem};
use super::detect::SUPPORTED_FORMATS;
use crate::error::{DocScanError, FileError, PageError, RecognizeError, StageError};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One recognised line with optional engine metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLine {
    pub text: String,
    /// Engine confidence in `0.0..=1.0`, when reported.
    pub confidence: Option<f32>,
    /// `[x, y, width, height]` in page pixels, when reported.
    pub bbox: Option<[u32; 4]>,
}

/// Output of one recognition call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    /// Page text. Empty when nothing was recognised.
    pub text: String,
    pub lines: Vec<RecognizedLine>,
}

impl Recognition {
    /// Text-only result, for engines that report no line metadata.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lines: Vec::new(),
        }
    }
}

/// Health information about a recognition engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInfo {
    pub service: String,
    pub engine: String,
    pub status: String,
    pub supported_formats: Vec<String>,
}

/// A text-recognition engine.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Short engine name used in logs and error messages.
    fn name(&self) -> &str;

    /// Recognise the text on one page.
    async fn recognize(&self, page: &Page) -> Result<Recognition, RecognizeError>;

    fn info(&self) -> EngineInfo {
        EngineInfo {
            service: "docscan".to_string(),
            engine: self.name().to_string(),
            status: "healthy".to_string(),
            supported_formats: SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Recognised text of a whole document.
#[derive(Debug, Clone)]
pub struct DocumentRecognition {
    /// Page texts in ascending page order, joined by the separator.
    pub text: String,
    pub page_count: usize,
    /// Pages that failed and contributed `""`.
    pub diagnostics: Vec<PageError>,
    /// Mean confidence over all lines that carried one.
    pub mean_confidence: Option<f32>,
}

/// Drive `recognizer` over `pages` and assemble the document text.
///
/// `pages` must yield page slots in ascending order. Each page is dropped as
/// soon as its recognition call returns. `on_page` is told about every page
/// as it completes, with `Ok(chars)` or the page error.
pub async fn recognize_document<S>(
    recognizer: &dyn Recognizer,
    page_count: usize,
    pages: S,
    separator: &str,
    mut on_page: impl FnMut(usize, Result<usize, &PageError>),
) -> Result<DocumentRecognition, StageError>
where
    S: Stream<Item = PageItem> + Unpin,
{
    let mut pages = pages;
    let mut texts: Vec<String> = vec![String::new(); page_count];
    let mut diagnostics = Vec::new();
    let mut confidences: Vec<f32> = Vec::new();
    let mut seen = 0usize;

    while let Some(item) = pages.next().await {
        seen += 1;
        let page = match item {
            Ok(page) => page,
            Err(e) => {
                on_page(e.page(), Err(&e));
                diagnostics.push(e);
                continue;
            }
        };
        let page_num = page.index();

        let result = recognizer.recognize(&page).await;
        drop(page);

        match result {
            Ok(recognition) => {
                debug!(
                    "Page {}: {} chars, {} lines",
                    page_num,
                    recognition.text.chars().count(),
                    recognition.lines.len()
                );
                confidences.extend(recognition.lines.iter().filter_map(|l| l.confidence));
                on_page(page_num, Ok(recognition.text.chars().count()));
                if let Some(slot) = texts.get_mut(page_num.saturating_sub(1)) {
                    *slot = recognition.text;
                }
            }
            Err(RecognizeError::Unavailable(detail)) => {
                return Err(DocScanError::EngineInitialization {
                    engine: recognizer.name().to_string(),
                    detail,
                }
                .into());
            }
            Err(RecognizeError::Failed(detail)) => {
                warn!("Page {}: recognition failed: {}", page_num, detail);
                let e = PageError::RecognitionFailed {
                    page: page_num,
                    detail,
                };
                on_page(page_num, Err(&e));
                diagnostics.push(e);
            }
        }
    }

    // A worker that stopped early leaves trailing slots unfilled.
    for page in seen + 1..=page_count {
        let e = PageError::RenderFailed {
            page,
            detail: "page was not produced".to_string(),
        };
        on_page(page, Err(&e));
        diagnostics.push(e);
    }

    if page_count > 0 && diagnostics.len() >= page_count {
        if let Some(first) = diagnostics.first() {
            warn!("All {} page(s) failed, first: {}", page_count, first);
        }
        return Err(FileError::Recognition {
            pages: page_count,
            diagnostics,
        }
        .into());
    }

    let mean_confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
    };

    Ok(DocumentRecognition {
        text: texts.join(separator),
        page_count,
        diagnostics,
        mean_confidence,
    })
}
