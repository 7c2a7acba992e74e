//! Pipeline stages for turning one upload into text and a preview.
//!
//! Each submodule implements exactly one step, so each is testable on its own
//! and a stage (e.g. the recognition engine) can be swapped without touching
//! the others.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ image ──┐
//! detect ──▶ │            ├──▶ recognize ──▶ (preview of page 1)
//!            └──▶ render ─┘
//! (type,size)  (raster)      (OCR driver)
//! ```
//!
//! 1. [`detect`]: validate size, resolve the declared type / extension to
//!    a [`detect::SourceFormat`]
//! 2. [`image`]: decode a raster upload into a single [`Page`]
//! 3. [`render`]: rasterise PDF pages one at a time via pdfium, on a
//!    blocking thread behind a bounded channel
//! 4. [`recognize`]: call the [`recognize::Recognizer`] per page and join the
//!    page texts in order
//! 5. [`preview`]: JPEG thumbnail of the first page
//!
//! The default recognizer lives in [`llm`] and uses [`encode`] and
//! [`postprocess`] around a vision-model call.

pub mod detect;
pub mod encode;
pub mod image;
pub mod llm;
pub mod postprocess;
pub mod preview;
pub mod recognize;
pub mod render;

use crate::error::{FileError, PageError};
use crate::lifecycle::Tracked;
use ::image::DynamicImage;
use tokio::task::JoinHandle;
use tracing::error;

/// One decoded raster surface: a PDF page or a standalone image.
///
/// Not `Clone`: every raster in flight is a [`Tracked`] page, and a copy
/// would escape the ledger.
#[derive(Debug)]
pub struct Page {
    index: usize,
    image: DynamicImage,
}

impl Page {
    /// `index` is 1-based.
    pub fn new(index: usize, image: DynamicImage) -> Self {
        Self { index, image }
    }

    /// 1-based position of the page in its document.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// One slot of a document's page sequence: a tracked raster, or the reason
/// that page could not be produced.
pub type PageItem = Result<Tracked<Page>, PageError>;

/// Await a per-file blocking task. A panic inside it (a decoder or pdfium
/// fault on hostile input) fails only that file.
pub(crate) async fn join_file_task<T>(task: JoinHandle<T>, stage: &str) -> Result<T, FileError> {
    task.await.map_err(|e| {
        error!("{} task failed: {}", stage, e);
        FileError::decode(format!("{} task failed: {}", stage, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicking_worker_fails_the_file() {
        let task = tokio::task::spawn_blocking(|| -> u32 { panic!("malformed strip offsets") });
        let err = join_file_task(task, "Image decode").await.unwrap_err();
        assert_eq!(err.code(), "DECODE_ERROR");
        assert_eq!(err.to_string(), FileError::decode("").to_string());
    }

    /// Compiles only while `Page` is not `Clone`: with a `Clone` impl the
    /// second blanket impl also applies and the call below is ambiguous.
    #[test]
    fn page_rasters_cannot_be_copied_out_of_the_ledger() {
        trait AmbiguousIfClone<A> {
            fn check() {}
        }
        impl<T: ?Sized> AmbiguousIfClone<()> for T {}
        struct IsClone;
        impl<T: ?Sized + Clone> AmbiguousIfClone<IsClone> for T {}

        <Page as AmbiguousIfClone<_>>::check();
    }

    #[tokio::test]
    async fn finished_worker_passes_value_through() {
        let task = tokio::task::spawn_blocking(|| 7u32);
        assert_eq!(join_file_task(task, "Image decode").await.unwrap(), 7);
    }
}
