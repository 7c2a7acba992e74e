//! Batch coordinator: run uploads through the pipeline and report outcomes.
//!
//! Every upload gets exactly one [`ProcessingOutcome`], in submission order.
//! A bad file (wrong type, too large, corrupt, unreadable) becomes a failed
//! outcome and the batch moves on; only a fatal error (recognition engine
//! gone, PDF renderer missing) aborts the request.
//!
//! For progressive results use [`Scanner::scan_stream`] instead of
//! [`Scanner::scan_batch`].

use crate::config::ScanConfig;
use crate::error::{DocScanError, FileError, PageError, StageError};
use crate::lifecycle::{BufferLedger, Spool};
use crate::output::{BatchReport, ExtractedDocument, PreviewArtifact, ProcessingOutcome};
use crate::pipeline::detect::{
    detect_format, unique_filename, validate_upload, SourceFormat, UploadRequest,
};
use crate::pipeline::image::normalize_image;
use crate::pipeline::preview::preview_off_thread;
use crate::pipeline::recognize::{recognize_document, DocumentRecognition, EngineInfo, Recognizer};
use crate::pipeline::render::open_pdf;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs uploads through detection, rasterisation, recognition and preview.
///
/// The recognizer is created once and shared by every scan; a `Scanner` is
/// cheap to clone.
///
/// # Example
/// ```rust,no_run
/// use edgequake_docscan::{RecognizerConfig, ScanConfig, Scanner, UploadRequest, VlmRecognizer};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = VlmRecognizer::new(RecognizerConfig::default())?;
/// let scanner = Scanner::new(Arc::new(engine), ScanConfig::default());
///
/// let upload = UploadRequest::from_path("receipt.jpg").await?;
/// let outcome = scanner.scan_file(upload).await?;
/// println!("{}", outcome.text().unwrap_or_default());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Scanner {
    recognizer: Arc<dyn Recognizer>,
    config: ScanConfig,
    ledger: BufferLedger,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("recognizer", &self.recognizer.name())
            .field("config", &self.config)
            .field("ledger", &self.ledger)
            .finish()
    }
}

impl Scanner {
    pub fn new(recognizer: Arc<dyn Recognizer>, config: ScanConfig) -> Self {
        Self {
            recognizer,
            config,
            ledger: BufferLedger::new(),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Live-buffer counters for everything this scanner allocated.
    pub fn ledger(&self) -> &BufferLedger {
        &self.ledger
    }

    /// Health report of the recognition engine.
    pub fn engine_info(&self) -> EngineInfo {
        self.recognizer.info()
    }

    /// Process a single upload.
    ///
    /// Returns `Ok` with a failed outcome for anything wrong with the file
    /// itself; `Err` only for fatal errors.
    pub async fn scan_file(&self, request: UploadRequest) -> Result<ProcessingOutcome, DocScanError> {
        self.process(0, request).await
    }

    /// Process a batch, returning one outcome per upload in submission order.
    ///
    /// # Errors
    /// - [`DocScanError::EmptyBatch`]: `requests` is empty
    /// - [`DocScanError::EngineInitialization`] /
    ///   [`DocScanError::RendererUnavailable`]: the request cannot continue;
    ///   outcomes already produced are discarded
    pub async fn scan_batch(&self, requests: Vec<UploadRequest>) -> Result<BatchReport, DocScanError> {
        if requests.is_empty() {
            return Err(DocScanError::EmptyBatch);
        }
        let start = Instant::now();
        let total = requests.len();
        info!(
            "Starting batch: {} files, concurrency {}",
            total, self.config.concurrency
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total);
        }

        let outcomes: Vec<ProcessingOutcome> = stream::iter(requests.into_iter().enumerate())
            .map(|(index, request)| self.process(index, request))
            .buffered(self.config.concurrency)
            .try_collect()
            .await?;

        let report = BatchReport::from_outcomes(outcomes);
        info!(
            "Batch complete: {}/{} succeeded in {}ms",
            report.summary.success,
            report.summary.total,
            start.elapsed().as_millis()
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(total, report.summary.success);
        }
        Ok(report)
    }

    /// Run one upload through the pipeline, converting per-file errors into
    /// a failed outcome.
    pub(crate) async fn process(
        &self,
        index: usize,
        request: UploadRequest,
    ) -> Result<ProcessingOutcome, DocScanError> {
        let start = Instant::now();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_file_start(index, &request.filename);
        }

        let checked = validate_upload(&request, self.config.max_file_size)
            .and_then(|_| detect_format(request.declared_type.as_deref(), &request.filename));
        let UploadRequest { filename, bytes, .. } = request;
        let format = match checked {
            Ok(format) => format,
            Err(e) => {
                drop(bytes);
                return Ok(self.file_failed(index, &filename, None, e));
            }
        };

        let size = bytes.len();
        info!(
            "File {} '{}': {} ({} bytes)",
            index,
            filename,
            format.file_type(),
            size
        );
        let spool = self.ledger.track(bytes);

        match self.extract(index, format, spool).await {
            Ok((recognition, preview)) => {
                let DocumentRecognition {
                    text,
                    page_count,
                    diagnostics,
                    mean_confidence,
                } = recognition;
                let document = ExtractedDocument {
                    filename: unique_filename(&filename),
                    original_filename: filename.clone(),
                    text_length: text.chars().count(),
                    has_text: !text.trim().is_empty(),
                    text,
                    preview: preview.data,
                    preview_media_type: preview.media_type,
                    file_type: format.file_type().to_string(),
                    page_count,
                    mean_confidence,
                };
                info!(
                    "File {} '{}': {} pages, {} chars, {} page errors in {}ms",
                    index,
                    filename,
                    document.page_count,
                    document.text_length,
                    diagnostics.len(),
                    start.elapsed().as_millis()
                );
                let outcome = ProcessingOutcome::succeeded(index, document, diagnostics);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_file_complete(index, true);
                }
                Ok(outcome)
            }
            Err(StageError::File(e)) => Ok(self.file_failed(
                index,
                &filename,
                Some(format.file_type().to_string()),
                e,
            )),
            Err(StageError::Fatal(e)) => {
                error!("File {} '{}': aborting request: {}", index, filename, e);
                Err(e)
            }
        }
    }

    /// Rasterise, recognise and preview one upload.
    async fn extract(
        &self,
        index: usize,
        format: SourceFormat,
        spool: Spool,
    ) -> Result<(DocumentRecognition, PreviewArtifact), StageError> {
        let separator = self.config.page_separator.as_string();
        let recognizer = self.recognizer.as_ref();

        match format {
            SourceFormat::Image(kind) => {
                let page = normalize_image(spool, kind, self.config.max_image_edge).await?;
                let (page, preview) =
                    preview_off_thread(self.ledger.track(page), self.config.thumbnail_size).await?;
                let pages = stream::iter(std::iter::once(Ok(page)));
                let recognition =
                    recognize_document(recognizer, 1, pages, &separator, self.page_events(index))
                        .await?;
                Ok((recognition, preview))
            }
            SourceFormat::Pdf => {
                let mut pdf = open_pdf(spool, &self.config, &self.ledger).await?;
                let page_count = pdf.page_count();
                let recognition = recognize_document(
                    recognizer,
                    page_count,
                    pdf.pages(),
                    &separator,
                    self.page_events(index),
                )
                .await;
                // The render worker thumbnails page 1 as it goes, so no page
                // is held back for the preview.
                let preview = pdf.finish().await;
                let recognition = recognition?;
                Ok((recognition, preview?))
            }
        }
    }

    fn page_events(&self, index: usize) -> impl FnMut(usize, Result<usize, &PageError>) + '_ {
        move |page, result| {
            if let Some(ref cb) = self.config.progress_callback {
                match result {
                    Ok(chars) => cb.on_page_complete(index, page, chars),
                    Err(e) => cb.on_page_error(index, page, &e.to_string()),
                }
            }
        }
    }

    fn file_failed(
        &self,
        index: usize,
        filename: &str,
        file_type: Option<String>,
        error: FileError,
    ) -> ProcessingOutcome {
        match &error {
            FileError::Decode { detail } => {
                warn!("File {} '{}': {} ({})", index, filename, error, detail)
            }
            _ => warn!("File {} '{}': {}", index, filename, error),
        }
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_file_complete(index, false);
        }
        let diagnostics = match &error {
            FileError::Recognition { diagnostics, .. } => diagnostics.clone(),
            _ => Vec::new(),
        };
        ProcessingOutcome::failed(index, filename, file_type, &error, diagnostics)
    }
}
