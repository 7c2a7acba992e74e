//! Raster upload decoding: bytes → one RGB [`Page`].
//!
//! Decoding a 16 MiB TIFF or a 40-megapixel phone photo is CPU-heavy, so it
//! runs in `spawn_blocking`. The spool is moved into the blocking task and is
//! released there as soon as decoding finishes, before recognition starts.

use super::detect::ImageKind;
use super::{join_file_task, Page};
use crate::error::FileError;
use crate::lifecycle::Spool;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Decode a raster upload and downscale it so neither edge exceeds `max_edge`.
///
/// The declared kind selects the decoder; bytes that do not parse as that
/// kind yield [`FileError::Decode`], as does a decoder panic.
pub async fn normalize_image(spool: Spool, kind: ImageKind, max_edge: u32) -> Result<Page, FileError> {
    let task = tokio::task::spawn_blocking(move || {
        let page = normalize_blocking(&spool, kind, max_edge);
        drop(spool);
        page
    });
    join_file_task(task, "Image decode").await?
}

fn normalize_blocking(bytes: &[u8], kind: ImageKind, max_edge: u32) -> Result<Page, FileError> {
    let decoded = image::load_from_memory_with_format(bytes, kind.image_format())
        .map_err(|e| FileError::decode(format!("{:?} decode failed: {}", kind, e)))?;

    let (w, h) = (decoded.width(), decoded.height());
    if w == 0 || h == 0 {
        return Err(FileError::decode("image has a zero dimension"));
    }

    let rgb = DynamicImage::ImageRgb8(fit_within(decoded, max_edge).to_rgb8());
    debug!(
        "Decoded {:?} {}x{} → {}x{} px",
        kind,
        w,
        h,
        rgb.width(),
        rgb.height()
    );
    Ok(Page::new(1, rgb))
}

/// Downscale (never upscale) preserving aspect ratio.
pub(crate) fn fit_within(img: DynamicImage, max_edge: u32) -> DynamicImage {
    if img.width() <= max_edge && img.height() <= max_edge {
        img
    } else {
        img.resize(max_edge, max_edge, FilterType::Lanczos3)
    }
}
