//! Upload validation and format detection.
//!
//! The declared media type wins over the file extension: browsers set it from
//! the OS type registry, which is more reliable than whatever the user named
//! the file. Generic or missing types (`application/octet-stream`, common for
//! drag-and-drop and `curl -F`) fall back to the extension.
//!
//! Nothing here touches the payload bytes except to count them, so a rejected
//! upload costs no decoding work.

use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Raster formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
    Bmp,
    Tiff,
}

impl ImageKind {
    /// Decoder format for this kind.
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            ImageKind::Jpeg => image::ImageFormat::Jpeg,
            ImageKind::Png => image::ImageFormat::Png,
            ImageKind::Bmp => image::ImageFormat::Bmp,
            ImageKind::Tiff => image::ImageFormat::Tiff,
        }
    }
}

/// Resolved source format of an upload. Decided once, matched on downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFormat {
    Pdf,
    Image(ImageKind),
}

impl SourceFormat {
    /// Short type name reported to clients: `pdf`, `jpeg`, `png`, `bmp`, `tiff`.
    pub fn file_type(self) -> &'static str {
        match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::Image(ImageKind::Jpeg) => "jpeg",
            SourceFormat::Image(ImageKind::Png) => "png",
            SourceFormat::Image(ImageKind::Bmp) => "bmp",
            SourceFormat::Image(ImageKind::Tiff) => "tiff",
        }
    }
}

/// Formats the detector accepts, for health reports.
pub const SUPPORTED_FORMATS: &[&str] = &["pdf", "jpeg", "png", "bmp", "tiff"];

/// A file as submitted by a client.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Name given by the client. May contain path components.
    pub filename: String,
    /// Declared media type, e.g. `image/png`. May be absent.
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadRequest {
    pub fn new(
        filename: impl Into<String>,
        declared_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            declared_type,
            bytes,
        }
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Read a local file into an upload with no declared type, so detection
    /// goes by extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(filename, None, bytes))
    }
}

/// Reject uploads larger than `max_size` bytes. Exactly `max_size` is allowed.
pub fn validate_upload(request: &UploadRequest, max_size: usize) -> Result<(), FileError> {
    let size = request.size();
    if size > max_size {
        return Err(FileError::FileTooLarge {
            size,
            limit: max_size,
        });
    }
    Ok(())
}

/// Resolve the source format from the declared type, falling back to the
/// filename extension when the type is missing or generic.
pub fn detect_format(declared_type: Option<&str>, filename: &str) -> Result<SourceFormat, FileError> {
    let declared = declared_type
        .map(|t| t.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty());

    match declared.as_deref() {
        None | Some("application/octet-stream") | Some("binary/octet-stream") => {
            let format = from_extension(filename).ok_or_else(|| FileError::UnsupportedFormat {
                declared: declared.clone().unwrap_or_else(|| filename.to_string()),
            })?;
            debug!("Detected {} by extension of '{}'", format.file_type(), filename);
            Ok(format)
        }
        Some(t) => from_media_type(t).ok_or_else(|| FileError::UnsupportedFormat {
            declared: t.to_string(),
        }),
    }
}

fn from_media_type(media_type: &str) -> Option<SourceFormat> {
    let subtype = media_type
        .strip_prefix("application/")
        .or_else(|| media_type.strip_prefix("image/"))
        .unwrap_or(media_type);
    // "application/png" is not a thing; only PDF lives under application/.
    if media_type.starts_with("application/") && !matches!(subtype, "pdf" | "x-pdf") {
        return None;
    }
    if media_type.starts_with("image/") && matches!(subtype, "pdf" | "x-pdf") {
        return None;
    }
    match subtype {
        "pdf" | "x-pdf" => Some(SourceFormat::Pdf),
        "jpeg" | "jpg" | "pjpeg" => Some(SourceFormat::Image(ImageKind::Jpeg)),
        "png" => Some(SourceFormat::Image(ImageKind::Png)),
        "bmp" | "x-bmp" | "x-ms-bmp" => Some(SourceFormat::Image(ImageKind::Bmp)),
        "tiff" | "tif" => Some(SourceFormat::Image(ImageKind::Tiff)),
        _ => None,
    }
}

fn from_extension(filename: &str) -> Option<SourceFormat> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(SourceFormat::Pdf),
        "jpg" | "jpeg" => Some(SourceFormat::Image(ImageKind::Jpeg)),
        "png" => Some(SourceFormat::Image(ImageKind::Png)),
        "bmp" => Some(SourceFormat::Image(ImageKind::Bmp)),
        "tif" | "tiff" => Some(SourceFormat::Image(ImageKind::Tiff)),
        _ => None,
    }
}

/// Reduce a client filename to a safe base name.
///
/// Directory components (either separator) are dropped, whitespace becomes
/// `_`, and anything outside `[A-Za-z0-9._-]` is removed. Leading dots are
/// stripped so the result is never hidden or a relative path.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Server-side unique name: `{uuid-hex}_{sanitised name}`.
pub fn unique_filename(original: &str) -> String {
    format!("{}_{}", Uuid::new_v4().simple(), sanitize_filename(original))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_wins_over_extension() {
        assert_eq!(
            detect_format(Some("image/png"), "scan.pdf").unwrap(),
            SourceFormat::Image(ImageKind::Png)
        );
        assert_eq!(
            detect_format(Some("application/pdf"), "scan.png").unwrap(),
            SourceFormat::Pdf
        );
    }

    #[test]
    fn declared_type_is_case_insensitive_and_ignores_params() {
        assert_eq!(
            detect_format(Some("Image/JPEG; charset=binary"), "x").unwrap(),
            SourceFormat::Image(ImageKind::Jpeg)
        );
        assert_eq!(
            detect_format(Some("image/x-ms-bmp"), "x").unwrap(),
            SourceFormat::Image(ImageKind::Bmp)
        );
        assert_eq!(
            detect_format(Some("tiff"), "x").unwrap(),
            SourceFormat::Image(ImageKind::Tiff)
        );
    }

    #[test]
    fn generic_type_falls_back_to_extension() {
        assert_eq!(
            detect_format(Some("application/octet-stream"), "Invoice.PDF").unwrap(),
            SourceFormat::Pdf
        );
        assert_eq!(
            detect_format(None, "photo.jpg").unwrap(),
            SourceFormat::Image(ImageKind::Jpeg)
        );
        assert_eq!(
            detect_format(Some(""), "page.tif").unwrap(),
            SourceFormat::Image(ImageKind::Tiff)
        );
    }

    #[test]
    fn unsupported_types_rejected() {
        let err = detect_format(Some("text/plain"), "notes.png").unwrap_err();
        assert_eq!(
            err,
            FileError::UnsupportedFormat {
                declared: "text/plain".into()
            }
        );
        assert!(detect_format(None, "archive.zip").is_err());
        assert!(detect_format(None, "no_extension").is_err());
        assert!(detect_format(Some("image/gif"), "a.gif").is_err());
        assert!(detect_format(Some("application/png"), "a.png").is_err());
    }

    #[test]
    fn size_limit_is_inclusive() {
        let at_limit = UploadRequest::new("a.png", None, vec![0; 1024]);
        assert!(validate_upload(&at_limit, 1024).is_ok());

        let over = UploadRequest::new("a.png", None, vec![0; 1025]);
        assert_eq!(
            validate_upload(&over, 1024).unwrap_err(),
            FileError::FileTooLarge {
                size: 1025,
                limit: 1024
            }
        );
    }

    #[test]
    fn sanitize_strips_paths_and_symbols() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\my scan.pdf"), "my_scan.pdf");
        assert_eq!(sanitize_filename("rapport été?.png"), "rapport_t.png");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("///"), "upload");
    }

    #[test]
    fn unique_filename_has_hex_prefix() {
        let a = unique_filename("doc.pdf");
        let b = unique_filename("doc.pdf");
        assert_ne!(a, b);
        let (prefix, rest) = a.split_once('_').unwrap();
        assert_eq!(prefix.len(), 32);
        assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(rest, "doc.pdf");
    }

    #[test]
    fn file_type_names() {
        assert_eq!(SourceFormat::Pdf.file_type(), "pdf");
        assert_eq!(SourceFormat::Image(ImageKind::Jpeg).file_type(), "jpeg");
        assert_eq!(SUPPORTED_FORMATS.len(), 5);
    }
}
