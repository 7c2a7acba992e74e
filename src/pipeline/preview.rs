//! Preview thumbnail of a document's first page.

use super::{join_file_task, Page};
use crate::error::FileError;
use crate::lifecycle::Tracked;
use crate::output::PreviewArtifact;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

/// JPEG quality of preview thumbnails.
pub const PREVIEW_JPEG_QUALITY: u8 = 85;

/// Encode `page` as a base64 JPEG thumbnail fitting in a `max_edge` square.
///
/// Pure and deterministic: the same page always yields the same artifact.
/// A missing page (a PDF whose first page failed to render) is a
/// [`FileError::Decode`].
pub fn generate_preview(page: Option<&Page>, max_edge: u32) -> Result<PreviewArtifact, FileError> {
    let page = page.ok_or_else(|| FileError::decode("no first page to preview"))?;
    let image = page.image();
    // Thumbnails never upscale.
    let thumb = if image.width() <= max_edge && image.height() <= max_edge {
        image.to_rgb8()
    } else {
        image.resize(max_edge, max_edge, FilterType::Lanczos3).to_rgb8()
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, PREVIEW_JPEG_QUALITY)
        .encode_image(&thumb)
        .map_err(|e| FileError::decode(format!("thumbnail encoding failed: {}", e)))?;

    debug!(
        "Preview {}x{} → {} bytes JPEG",
        thumb.width(),
        thumb.height(),
        jpeg.len()
    );

    Ok(PreviewArtifact {
        data: STANDARD.encode(&jpeg),
        media_type: "image/jpeg".to_string(),
        width: thumb.width(),
        height: thumb.height(),
    })
}

/// [`generate_preview`] on a blocking thread. The page is handed back for
/// recognition.
pub async fn preview_off_thread(
    page: Tracked<Page>,
    max_edge: u32,
) -> Result<(Tracked<Page>, PreviewArtifact), FileError> {
    let task = tokio::task::spawn_blocking(move || {
        let preview = generate_preview(Some(&page), max_edge);
        (page, preview)
    });
    let (page, preview) = join_file_task(task, "Preview").await?;
    Ok((page, preview?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn page(w: u32, h: u32) -> Page {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        Page::new(1, DynamicImage::ImageRgb8(img))
    }

    #[test]
    fn thumbnail_fits_and_keeps_aspect() {
        let preview = generate_preview(Some(&page(1200, 600)), 300).unwrap();
        assert_eq!((preview.width, preview.height), (300, 150));
        assert_eq!(preview.media_type, "image/jpeg");

        let bytes = STANDARD.decode(&preview.data).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8], "JPEG SOI marker");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 300);
    }

    #[test]
    fn small_page_is_not_upscaled() {
        let preview = generate_preview(Some(&page(120, 80)), 300).unwrap();
        assert_eq!((preview.width, preview.height), (120, 80));
    }

    #[test]
    fn deterministic() {
        let p = page(500, 700);
        assert_eq!(
            generate_preview(Some(&p), 300).unwrap(),
            generate_preview(Some(&p), 300).unwrap()
        );
    }

    #[tokio::test]
    async fn off_thread_preview_keeps_the_page_tracked() {
        let ledger = crate::lifecycle::BufferLedger::new();
        let (page, preview) = preview_off_thread(ledger.track(page(900, 300)), 300)
            .await
            .unwrap();
        assert_eq!((preview.width, preview.height), (300, 100));
        assert_eq!(page.width(), 900);
        assert_eq!(ledger.live(), 1);
        drop(page);
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn missing_page_is_decode_error() {
        let err = generate_preview(None, 300).unwrap_err();
        assert_eq!(err.code(), "DECODE_ERROR");
    }
}
