//! PDF rasterisation: render each page to a [`Page`] via pdfium.
//!
//! ## Why a worker thread and a channel?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state and is not safe to call from async contexts. The whole
//! document lives on one `spawn_blocking` thread: it binds the library, loads
//! the document from the spooled bytes, and renders pages one at a time into a
//! bounded channel. The recognizer consumes pages from the other end, so a
//! 300-page scan never has more than a couple of rasters in memory.
//!
//! Dropping the receiving side makes the next send fail; the worker then
//! stops rendering, unloads the document and releases the spool.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 200 DPI would produce a
//! 6,600 × 9,400 px image. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded.

use super::preview::generate_preview;
use super::{join_file_task, Page, PageItem};
use crate::config::ScanConfig;
use crate::error::{DocScanError, FileError, PageError, StageError};
use crate::lifecycle::{BufferLedger, Spool};
use crate::output::{DocumentMetadata, PreviewArtifact};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Client-facing reason for a page pdfium could not rasterise. The pdfium
/// error itself is only logged.
const RENDER_FAILED: &str = "page could not be rendered";

/// A PDF opened on a render worker, with its pages arriving in order.
#[derive(Debug)]
pub struct RenderedPdf {
    page_count: usize,
    pages: ReceiverStream<PageItem>,
    preview: oneshot::Receiver<Result<PreviewArtifact, FileError>>,
    worker: JoinHandle<()>,
}

impl RenderedPdf {
    /// Number of pages in the document. Always ≥ 1.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Page slots in ascending order, one per page.
    pub fn pages(&mut self) -> &mut ReceiverStream<PageItem> {
        &mut self.pages
    }

    /// Stop rendering, wait for the worker to release the document and the
    /// spool, and return the page 1 thumbnail it made.
    pub async fn finish(self) -> Result<PreviewArtifact, FileError> {
        drop(self.pages);
        join_file_task(self.worker, "PDF render").await?;
        self.preview
            .await
            .unwrap_or_else(|_| Err(FileError::decode("document produced no pages")))
    }
}

#[derive(Debug, Clone)]
struct RenderSettings {
    dpi: u32,
    max_pixels: u32,
    thumbnail_size: u32,
    lib_path: Option<PathBuf>,
}

/// Open a PDF held in `spool` and start rendering its pages.
///
/// # Errors
/// - [`FileError::Decode`]: no `%PDF` header, corrupt, or password-protected
/// - [`FileError::EmptyDocument`]: the document has no pages
/// - [`DocScanError::RendererUnavailable`]: pdfium could not be bound
pub async fn open_pdf(
    spool: Spool,
    config: &ScanConfig,
    ledger: &BufferLedger,
) -> Result<RenderedPdf, StageError> {
    if !spool.starts_with(b"%PDF") {
        return Err(FileError::decode("missing %PDF header").into());
    }

    let settings = RenderSettings {
        dpi: config.dpi,
        max_pixels: config.max_rendered_pixels,
        thumbnail_size: config.thumbnail_size,
        lib_path: config.pdfium_lib_path.clone(),
    };
    let ledger = ledger.clone();
    let (opened_tx, opened_rx) = oneshot::channel();
    let (page_tx, page_rx) = mpsc::channel(1);
    let (preview_tx, preview_rx) = oneshot::channel();

    let worker = tokio::task::spawn_blocking(move || {
        render_worker(spool, settings, ledger, opened_tx, page_tx, preview_tx)
    });

    match opened_rx.await {
        Ok(Ok(page_count)) => {
            info!("PDF loaded: {} pages", page_count);
            Ok(RenderedPdf {
                page_count,
                pages: ReceiverStream::new(page_rx),
                preview: preview_rx,
                worker,
            })
        }
        Ok(Err(e)) => {
            let _ = worker.await;
            Err(e)
        }
        Err(_) => {
            // The worker dropped the sender without answering: it panicked.
            join_file_task(worker, "PDF open").await?;
            Err(FileError::decode("render worker exited before opening the document").into())
        }
    }
}

/// Blocking side of [`open_pdf`]. Owns the spool for its whole life.
fn render_worker(
    spool: Spool,
    settings: RenderSettings,
    ledger: BufferLedger,
    opened: oneshot::Sender<Result<usize, StageError>>,
    pages_tx: mpsc::Sender<PageItem>,
    preview_tx: oneshot::Sender<Result<PreviewArtifact, FileError>>,
) {
    let pdfium = match bind_pdfium(settings.lib_path.as_deref()) {
        Ok(p) => p,
        Err(e) => {
            let _ = opened.send(Err(e.into()));
            return;
        }
    };

    let document = match pdfium.load_pdf_from_byte_slice(&spool, None) {
        Ok(d) => d,
        Err(e) => {
            let _ = opened.send(Err(FileError::decode(format!("{:?}", e)).into()));
            return;
        }
    };

    let pages = document.pages();
    let page_count = pages.len() as usize;
    if page_count == 0 {
        let _ = opened.send(Err(FileError::EmptyDocument.into()));
        return;
    }
    if opened.send(Ok(page_count)).is_err() {
        return;
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(settings.dpi as f32 / 72.0)
        .set_maximum_width(settings.max_pixels as i32)
        .set_maximum_height(settings.max_pixels as i32);

    let mut preview_tx = Some(preview_tx);
    for idx in 0..page_count {
        let rendered = render_page(&pages, idx, &render_config);
        // Page 1's thumbnail is made here, off the async executor, before
        // the raster is handed on.
        if let Some(tx) = preview_tx.take() {
            let _ = tx.send(generate_preview(rendered.as_ref().ok(), settings.thumbnail_size));
        }
        let item = rendered
            .map(|page| ledger.track(page))
            .map_err(|detail| render_failure(idx + 1, &detail));

        if pages_tx.blocking_send(item).is_err() {
            debug!("Page receiver dropped after {} of {} pages", idx, page_count);
            break;
        }
    }
}

/// Log the pdfium error for `page` and return the client-facing diagnostic.
fn render_failure(page: usize, detail: &str) -> PageError {
    warn!("Page {}: rendering failed: {}", page, detail);
    PageError::RenderFailed {
        page,
        detail: RENDER_FAILED.to_string(),
    }
}

fn render_page(
    pages: &PdfPages<'_>,
    idx: usize,
    render_config: &PdfRenderConfig,
) -> Result<Page, String> {
    let page = pages.get(idx as u16).map_err(|e| format!("{:?}", e))?;
    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| format!("{:?}", e))?;
    let image = DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8());
    debug!(
        "Rendered page {} → {}x{} px",
        idx + 1,
        image.width(),
        image.height()
    );
    Ok(Page::new(idx + 1, image))
}

/// Bind to pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the system
/// library search path. A directory is resolved to the platform library name
/// inside it.
fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, DocScanError> {
    let explicit = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => {
            let path = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            Pdfium::bind_to_library(&path).map_err(|e| {
                DocScanError::RendererUnavailable(format!("{}: {}", path.display(), e))
            })?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| DocScanError::RendererUnavailable(e.to_string()))?,
    };

    Ok(Pdfium::new(bindings))
}

/// Read page count and document metadata without rendering any page.
pub async fn inspect_pdf(
    bytes: Vec<u8>,
    lib_path: Option<PathBuf>,
) -> Result<DocumentMetadata, StageError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(FileError::decode("missing %PDF header").into());
    }
    let task = tokio::task::spawn_blocking(move || inspect_blocking(&bytes, lib_path.as_deref()));
    join_file_task(task, "PDF metadata").await?
}

fn inspect_blocking(bytes: &[u8], lib_path: Option<&Path>) -> Result<DocumentMetadata, StageError> {
    let pdfium = bind_pdfium(lib_path)?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| FileError::decode(format!("{:?}", e)))?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
