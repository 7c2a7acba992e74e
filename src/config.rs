//! Configuration types for document scanning.
//!
//! Pipeline behaviour is controlled through [`ScanConfig`]; the default
//! vision-model recognition engine is configured separately through
//! [`RecognizerConfig`] because it is created once at startup and shared by
//! every request, while a `ScanConfig` may differ per call.
//!
//! Both are built with builders whose setters clamp to sane ranges and whose
//! `build()` validates the result.

use crate::error::DocScanError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default per-file upload limit: 16 MiB.
pub const DEFAULT_MAX_FILE_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for the ingestion and batch pipeline.
///
/// # Example
/// ```rust
/// use edgequake_docscan::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .dpi(150)
///     .thumbnail_size(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// PDF rendering resolution. Range: 72–400. Default: 200.
    ///
    /// OCR accuracy on small print drops sharply below ~150 DPI, while memory
    /// grows with the square of DPI. 200 keeps an A4 page around 1650 × 2340 px.
    pub dpi: u32,

    /// Cap on either edge of a rendered PDF page, in pixels. Default: 2048.
    ///
    /// Independent of DPI so that oversized pages (posters, drawings) cannot
    /// blow up memory.
    pub max_rendered_pixels: u32,

    /// Raster images larger than this on either edge are downscaled before
    /// recognition. Default: 2048.
    pub max_image_edge: u32,

    /// Maximum accepted upload size in bytes. Default: 16 MiB.
    pub max_file_size: usize,

    /// Bounding box of the preview thumbnail, in pixels. Default: 300.
    pub thumbnail_size: u32,

    /// Files processed at once within a batch. Default: 1 (sequential).
    ///
    /// Results are always reported in submission order, whatever the value.
    pub concurrency: usize,

    /// Separator placed between page texts. Default: newline.
    pub page_separator: PageSeparator,

    /// Explicit path to the pdfium shared library. When `None`, the
    /// `PDFIUM_LIB_PATH` environment variable and then the system library
    /// search path are tried.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional per-file / per-page event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 2048,
            max_image_edge: 2048,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            thumbnail_size: 300,
            concurrency: 1,
            page_separator: PageSeparator::default(),
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("max_image_edge", &self.max_image_edge)
            .field("max_file_size", &self.max_file_size)
            .field("thumbnail_size", &self.thumbnail_size)
            .field("concurrency", &self.concurrency)
            .field("page_separator", &self.page_separator)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScanProgressCallback>"),
            )
            .finish()
    }
}

impl ScanConfig {
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_image_edge(mut self, px: u32) -> Self {
        self.config.max_image_edge = px.max(100);
        self
    }

    pub fn max_file_size(mut self, bytes: usize) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn thumbnail_size(mut self, px: u32) -> Self {
        self.config.thumbnail_size = px.max(16);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, DocScanError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(DocScanError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_file_size == 0 {
            return Err(DocScanError::InvalidConfig(
                "Maximum file size must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Configuration for the vision-model recognition engine.
#[derive(Clone)]
pub struct RecognizerConfig {
    /// Model identifier, e.g. "gpt-4.1-nano". If None, uses "gpt-4.1-nano".
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0, so transcription is deterministic.
    pub temperature: f32,

    /// Maximum tokens generated per page. Default: 4096.
    pub max_tokens: usize,

    /// Retries per page on a failed call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Language hint passed to the model, e.g. "zh" or "en". Default: None (auto).
    pub language: Option<String>,

    /// Custom system prompt. If None, uses the built-in transcription prompt.
    pub system_prompt: Option<String>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            language: None,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for RecognizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognizerConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("language", &self.language)
            .finish()
    }
}

impl RecognizerConfig {
    pub fn builder() -> RecognizerConfigBuilder {
        RecognizerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RecognizerConfig`].
#[derive(Debug)]
pub struct RecognizerConfigBuilder {
    config: RecognizerConfig,
}

impl RecognizerConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = Some(lang.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> Result<RecognizerConfig, DocScanError> {
        if self.config.max_tokens == 0 {
            return Err(DocScanError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if self.config.api_timeout_secs == 0 {
            return Err(DocScanError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How page texts are joined into the document text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// A single newline. (default)
    #[default]
    Newline,
    /// An empty line between pages: "\n\n".
    BlankLine,
    /// Custom string on its own line between pages: "\n{s}\n".
    Custom(String),
}

impl PageSeparator {
    pub fn as_string(&self) -> String {
        match self {
            PageSeparator::Newline => "\n".to_string(),
            PageSeparator::BlankLine => "\n\n".to_string(),
            PageSeparator::Custom(s) => format!("\n{}\n", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upload_limits() {
        let c = ScanConfig::default();
        assert_eq!(c.max_file_size, 16 * 1024 * 1024);
        assert_eq!(c.dpi, 200);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.page_separator, PageSeparator::Newline);
    }

    #[test]
    fn builder_clamps() {
        let c = ScanConfig::builder()
            .dpi(1000)
            .concurrency(0)
            .thumbnail_size(1)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 400);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.thumbnail_size, 16);
    }

    #[test]
    fn zero_file_size_rejected() {
        let err = ScanConfig::builder().max_file_size(0).build().unwrap_err();
        assert!(matches!(err, DocScanError::InvalidConfig(_)));
    }

    #[test]
    fn separator_strings() {
        assert_eq!(PageSeparator::Newline.as_string(), "\n");
        assert_eq!(PageSeparator::BlankLine.as_string(), "\n\n");
        assert_eq!(PageSeparator::Custom("---".into()).as_string(), "\n---\n");
    }

    #[test]
    fn recognizer_builder_validates() {
        assert!(RecognizerConfig::builder().max_tokens(0).build().is_err());
        let c = RecognizerConfig::builder()
            .model("gpt-4.1-mini")
            .temperature(5.0)
            .build()
            .unwrap();
        assert_eq!(c.model.as_deref(), Some("gpt-4.1-mini"));
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn debug_hides_callback() {
        let dbg = format!("{:?}", ScanConfig::default());
        assert!(dbg.contains("ScanConfig"));
        assert!(dbg.contains("progress_callback: None"));
    }
}
