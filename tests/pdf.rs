//! PDF integration tests.
//!
//! Documents are generated in-process, so no fixture files are needed, but
//! rendering needs a pdfium shared library. Tests that render are gated
//! behind the `DOCSCAN_PDFIUM_TESTS` environment variable.
//!
//! Run with:
//!   DOCSCAN_PDFIUM_TESTS=1 PDFIUM_LIB_PATH=/path/to/lib cargo test --test pdf -- --nocapture

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_docscan::{
    inspect_pdf, DocScanError, Page, PageSeparator, Recognition, RecognizeError, Recognizer,
    ScanConfig, Scanner, StageError, UploadRequest,
};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless DOCSCAN_PDFIUM_TESTS is set.
macro_rules! pdfium_skip_unless_enabled {
    () => {{
        if std::env::var("DOCSCAN_PDFIUM_TESTS").is_err() {
            println!("SKIP: set DOCSCAN_PDFIUM_TESTS=1 to run pdfium tests");
            return;
        }
    }};
}

/// Build a PDF with `pages` blank pages of `w`×`h` points and an optional
/// document title. Cross-reference offsets are computed, so pdfium loads it
/// without repair.
fn blank_pdf(pages: usize, w: u32, h: u32, title: Option<&str>) -> Vec<u8> {
    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages
    ));
    for _ in 0..pages {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {w} {h}] /Resources << >> >>"
        ));
    }
    let info_id = title.map(|t| {
        objects.push(format!("<< /Title ({t}) /Producer (docscan tests) >>"));
        objects.len()
    });

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    let info = info_id.map(|id| format!(" /Info {id} 0 R")).unwrap_or_default();
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R{} >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            info,
            xref_at
        )
        .as_bytes(),
    );
    out
}

fn pdf_upload(name: &str, bytes: Vec<u8>) -> UploadRequest {
    UploadRequest::new(name, Some("application/pdf".to_string()), bytes)
}

/// Names each page by its index.
struct PageNamer;

#[async_trait]
impl Recognizer for PageNamer {
    fn name(&self) -> &str {
        "page-namer"
    }

    async fn recognize(&self, page: &Page) -> Result<Recognition, RecognizeError> {
        Ok(Recognition::from_text(format!("page {}", page.index())))
    }
}

/// Fails the second page only.
struct SecondPageFails;

#[async_trait]
impl Recognizer for SecondPageFails {
    fn name(&self) -> &str {
        "second-page-fails"
    }

    async fn recognize(&self, page: &Page) -> Result<Recognition, RecognizeError> {
        if page.index() == 2 {
            Err(RecognizeError::Failed("smudged".into()))
        } else {
            Ok(Recognition::from_text(format!("page {}", page.index())))
        }
    }
}

fn scanner(recognizer: Arc<dyn Recognizer>, separator: PageSeparator) -> Scanner {
    let config = ScanConfig::builder()
        .dpi(144)
        .page_separator(separator)
        .build()
        .expect("valid config");
    Scanner::new(recognizer, config)
}

// ── Without pdfium ───────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_renderer_aborts_request() {
    let config = ScanConfig::builder()
        .pdfium_lib_path("/nonexistent/libpdfium.so")
        .build()
        .expect("valid config");
    let scanner = Scanner::new(Arc::new(PageNamer), config);

    let err = scanner
        .scan_file(pdf_upload("a.pdf", blank_pdf(1, 100, 100, None)))
        .await
        .unwrap_err();
    assert!(matches!(err, DocScanError::RendererUnavailable(_)), "got {err:?}");
    assert_eq!(scanner.ledger().live(), 0);
}

#[tokio::test]
async fn pdf_without_header_is_decode_error() {
    let scanner = scanner(Arc::new(PageNamer), PageSeparator::default());
    let outcome = scanner
        .scan_file(pdf_upload("fake.pdf", b"GIF89a not a pdf".to_vec()))
        .await
        .expect("not fatal");
    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("DECODE_ERROR"));
    assert_eq!(outcome.file_type.as_deref(), Some("pdf"));
}

// ── With pdfium ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn pages_are_joined_in_order() {
    pdfium_skip_unless_enabled!();
    let scanner = scanner(Arc::new(PageNamer), PageSeparator::BlankLine);

    let outcome = scanner
        .scan_file(pdf_upload("three.pdf", blank_pdf(3, 200, 100, None)))
        .await
        .expect("pdfium available");

    assert!(outcome.success, "{}", outcome.message);
    let doc = outcome.data.expect("document");
    assert_eq!(doc.page_count, 3);
    assert_eq!(doc.text, "page 1\n\npage 2\n\npage 3");
    assert_eq!(doc.file_type, "pdf");
    assert_eq!(scanner.ledger().live(), 0, "spool and rasters released");
}

#[tokio::test]
async fn preview_comes_from_first_page() {
    pdfium_skip_unless_enabled!();
    let scanner = scanner(Arc::new(PageNamer), PageSeparator::default());

    let outcome = scanner
        .scan_file(pdf_upload("wide.pdf", blank_pdf(2, 400, 200, None)))
        .await
        .expect("pdfium available");
    let doc = outcome.data.expect("document");

    let jpeg = STANDARD.decode(&doc.preview).expect("base64");
    let thumb = image::load_from_memory(&jpeg).expect("jpeg");
    // 400×200 pt at 144 DPI is 800×400 px, thumbnailed into 300×300.
    assert_eq!((thumb.width(), thumb.height()), (300, 150));
}

#[tokio::test]
async fn failed_page_contributes_empty_text() {
    pdfium_skip_unless_enabled!();
    let scanner = scanner(Arc::new(SecondPageFails), PageSeparator::default());

    let outcome = scanner
        .scan_file(pdf_upload("three.pdf", blank_pdf(3, 100, 100, None)))
        .await
        .expect("pdfium available");

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.text(), Some("page 1\n\npage 3"));
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].page(), 2);
}

#[tokio::test]
async fn zero_page_document_is_empty() {
    pdfium_skip_unless_enabled!();
    let scanner = scanner(Arc::new(PageNamer), PageSeparator::default());

    let outcome = scanner
        .scan_file(pdf_upload("empty.pdf", blank_pdf(0, 100, 100, None)))
        .await
        .expect("pdfium available");
    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("EMPTY_DOCUMENT"));
    assert_eq!(scanner.ledger().live(), 0);
}

#[tokio::test]
async fn truncated_pdf_is_decode_error() {
    pdfium_skip_unless_enabled!();
    let scanner = scanner(Arc::new(PageNamer), PageSeparator::default());

    let mut bytes = blank_pdf(2, 100, 100, None);
    bytes.truncate(30);
    let outcome = scanner
        .scan_file(pdf_upload("cut.pdf", bytes))
        .await
        .expect("pdfium available");
    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("DECODE_ERROR"));
}

#[tokio::test]
async fn inspect_reads_metadata_without_rendering() {
    pdfium_skip_unless_enabled!();
    let meta = inspect_pdf(blank_pdf(4, 100, 100, Some("Quarterly Report")), None)
        .await
        .expect("pdfium available");
    assert_eq!(meta.page_count, 4);
    assert_eq!(meta.title.as_deref(), Some("Quarterly Report"));
    assert_eq!(meta.producer.as_deref(), Some("docscan tests"));
}

#[tokio::test]
async fn inspect_reports_missing_renderer() {
    let err = inspect_pdf(
        blank_pdf(1, 100, 100, None),
        Some("/nonexistent/libpdfium.so".into()),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        StageError::Fatal(DocScanError::RendererUnavailable(_))
    ));
}
