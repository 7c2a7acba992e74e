//! Streaming batch API: emit outcomes as files complete.
//!
//! ## Why stream?
//!
//! A batch of scanned PDFs takes minutes. A stream lets callers show each
//! file's result as soon as it is ready instead of waiting for the whole
//! batch, and dropping the stream half-way cancels the remaining files and
//! releases their buffers.
//!
//! Outcomes are yielded in submission order even with `concurrency > 1`.
//! A fatal error is yielded once as `Err` and ends the stream. The progress
//! callback sees `on_batch_complete` only when every upload was yielded.

use crate::error::DocScanError;
use crate::output::ProcessingOutcome;
use crate::pipeline::detect::UploadRequest;
use crate::scan::Scanner;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-file outcomes.
pub type OutcomeStream<'a> =
    Pin<Box<dyn Stream<Item = Result<ProcessingOutcome, DocScanError>> + Send + 'a>>;

impl Scanner {
    /// Process a batch, streaming one outcome per upload in submission order.
    ///
    /// # Errors
    /// [`DocScanError::EmptyBatch`] when `requests` is empty. Fatal errors
    /// during processing arrive as the stream's last item.
    ///
    /// # Example
    /// ```rust,no_run
    /// use edgequake_docscan::{RecognizerConfig, ScanConfig, Scanner, UploadRequest, VlmRecognizer};
    /// use futures::StreamExt;
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let engine = VlmRecognizer::new(RecognizerConfig::default())?;
    /// let scanner = Scanner::new(Arc::new(engine), ScanConfig::default());
    /// let uploads = vec![
    ///     UploadRequest::from_path("a.pdf").await?,
    ///     UploadRequest::from_path("b.png").await?,
    /// ];
    /// let mut outcomes = scanner.scan_stream(uploads)?;
    /// while let Some(outcome) = outcomes.next().await {
    ///     let outcome = outcome?;
    ///     println!("{}: {}", outcome.original_filename, outcome.message);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn scan_stream(
        &self,
        requests: Vec<UploadRequest>,
    ) -> Result<OutcomeStream<'_>, DocScanError> {
        if requests.is_empty() {
            return Err(DocScanError::EmptyBatch);
        }
        let total = requests.len();
        info!("Starting streaming batch: {} files", total);
        if let Some(ref cb) = self.config().progress_callback {
            cb.on_batch_start(total);
        }

        let outcomes = Box::pin(
            stream::iter(requests.into_iter().enumerate())
                .map(move |(index, request)| self.process(index, request))
                .buffered(self.config().concurrency),
        );

        // Stop before polling further uploads once a fatal error was yielded.
        // `on_batch_complete` fires when the last upload's outcome has been
        // yielded, never after a fatal error.
        let s = stream::unfold(Some((outcomes, 0usize)), move |state| async move {
            let (mut outcomes, succeeded) = state?;
            match outcomes.next().await {
                Some(Ok(outcome)) => {
                    let succeeded = succeeded + usize::from(outcome.success);
                    Some((Ok(outcome), Some((outcomes, succeeded))))
                }
                Some(Err(e)) => Some((Err(e), None)),
                None => {
                    info!("Streaming batch complete: {}/{} succeeded", succeeded, total);
                    if let Some(ref cb) = self.config().progress_callback {
                        cb.on_batch_complete(total, succeeded);
                    }
                    None
                }
            }
        });

        Ok(Box::pin(s))
    }
}
