//! Progress-callback trait for per-file and per-page scan events.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to receive events
//! as the batch coordinator works through uploads.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docscan::{ScanConfig, ScanProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter {
//!     pages: AtomicUsize,
//! }
//!
//! impl ScanProgressCallback for PageCounter {
//!     fn on_page_complete(&self, _file_index: usize, _page: usize, _chars: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(PageCounter { pages: AtomicUsize::new(0) });
//! let config = ScanConfig::builder()
//!     .progress_callback(counter as Arc<dyn ScanProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch coordinator as it processes uploads.
///
/// All methods have default no-op implementations. With `concurrency > 1`,
/// file and page events for different files may interleave and arrive from
/// different tasks.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once before the first file.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file enters the pipeline.
    ///
    /// * `file_index`: 0-based position in the submission
    fn on_file_start(&self, file_index: usize, filename: &str) {
        let _ = (file_index, filename);
    }

    /// Called after a page was recognised.
    ///
    /// * `page`: 1-based page index
    /// * `chars`: characters of text recognised on the page
    fn on_page_complete(&self, file_index: usize, page: usize, chars: usize) {
        let _ = (file_index, page, chars);
    }

    /// Called when a page failed to render or recognise.
    fn on_page_error(&self, file_index: usize, page: usize, error: &str) {
        let _ = (file_index, page, error);
    }

    /// Called when a file has a final outcome.
    fn on_file_complete(&self, file_index: usize, success: bool) {
        let _ = (file_index, success);
    }

    /// Called once after every file has an outcome.
    fn on_batch_complete(&self, total_files: usize, succeeded: usize) {
        let _ = (total_files, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScanConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;
