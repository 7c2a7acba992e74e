//! Image encoding: `Page` → base64 PNG wrapped in `ImageData`.
//!
//! VLM APIs (OpenAI, Anthropic, Gemini) accept images as base64 data-URIs
//! embedded in the JSON request body. PNG is chosen over JPEG because it is
//! lossless: JPEG ringing around glyph edges costs more OCR accuracy than the
//! extra request bytes are worth. The preview thumbnail, which only a human
//! looks at, uses JPEG instead (see [`super::preview`]).

use super::Page;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::io::Cursor;
use tracing::debug;

/// Encode a page raster as a base64 PNG ready for the VLM API.
///
/// `detail: "high"` makes GPT-4-class models tile the image at full
/// resolution; with `"low"` small print on a scanned A4 page is unreadable.
pub fn encode_page(page: &Page) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    page.image()
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Page {}: encoded → {} bytes base64", page.index(), b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
