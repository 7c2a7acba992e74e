//! # edgequake-docscan
//!
//! Extract text from uploaded PDFs and images with a pluggable recognition
//! engine, one outcome per file.
//!
//! ## Why this crate?
//!
//! Scanned documents arrive as a mix of PDFs and photos, some of them
//! corrupt, some enormous. A batch must not fail because one file is bad,
//! and a busy service must not keep page rasters alive longer than the page
//! takes to recognise. This crate detects each upload's format, rasterises
//! PDF pages one at a time, hands each page to a [`Recognizer`] and returns
//! a [`ProcessingOutcome`] per file in submission order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Detect     size limit, declared type / extension → PDF or image kind
//!  ├─ 2. Normalise  image → RGB8, bounded edge (spawn_blocking)
//!  │    or Render   PDF → one raster per page via pdfium (streamed, bounded)
//!  ├─ 3. Recognise  page → text through the shared engine (VLM by default)
//!  ├─ 4. Polish     strip fences, preambles, "no text" replies
//!  ├─ 5. Preview    first page → JPEG thumbnail
//!  └─ 6. Outcome    success + document, or failure + error code
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docscan::{RecognizerConfig, ScanConfig, Scanner, UploadRequest, VlmRecognizer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let engine = VlmRecognizer::new(RecognizerConfig::default())?;
//!     let scanner = Scanner::new(Arc::new(engine), ScanConfig::default());
//!
//!     let uploads = vec![
//!         UploadRequest::from_path("invoice.pdf").await?,
//!         UploadRequest::from_path("receipt.jpg").await?,
//!     ];
//!     let report = scanner.scan_batch(uploads).await?;
//!     for outcome in &report.results {
//!         println!("{}: {}", outcome.original_filename, outcome.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docscan = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod scan;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{
    forward_for_analysis, AnalysisProfile, AnalysisResult, Analyzer, LlmAnalyzer,
    MAX_ANALYSIS_CHARS,
};
pub use config::{
    PageSeparator, RecognizerConfig, RecognizerConfigBuilder, ScanConfig, ScanConfigBuilder,
    DEFAULT_MAX_FILE_SIZE,
};
pub use error::{AnalysisError, DocScanError, FileError, PageError, RecognizeError, StageError};
pub use lifecycle::BufferLedger;
pub use output::{
    BatchReport, BatchSummary, DocumentMetadata, ExtractedDocument, PreviewArtifact,
    ProcessingOutcome, ScanEnvelope,
};
pub use pipeline::detect::{detect_format, ImageKind, SourceFormat, UploadRequest, SUPPORTED_FORMATS};
pub use pipeline::llm::VlmRecognizer;
pub use pipeline::recognize::{EngineInfo, RecognizedLine, Recognition, Recognizer};
pub use pipeline::render::inspect_pdf;
pub use pipeline::Page;
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use scan::Scanner;
pub use stream::OutcomeStream;
