//! Vision-model recognition engine.
//!
//! [`VlmRecognizer`] implements [`Recognizer`] by sending each page image to
//! a vision-language model through `edgequake-llm` and reading back a plain
//! transcription. It is intentionally thin: prompt wording lives in
//! [`crate::prompts`] and output cleanup in [`super::postprocess`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! load. Exponential backoff (`retry_backoff_ms * 2^attempt`) avoids a
//! thundering herd: with 500 ms base and 3 retries the wait sequence is
//! 500 ms → 1 s → 2 s. Authentication failures are not retried: they mean the
//! engine is unusable, not that the page is hard.

use super::encode::encode_page;
use super::postprocess::clean_transcription;
use super::recognize::{Recognition, Recognizer};
use super::Page;
use crate::config::RecognizerConfig;
use crate::error::{DocScanError, RecognizeError};
use crate::prompts::{language_hint, DEFAULT_OCR_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// A [`Recognizer`] backed by a vision-language model.
pub struct VlmRecognizer {
    provider: Arc<dyn LLMProvider>,
    config: RecognizerConfig,
    name: String,
}

impl std::fmt::Debug for VlmRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VlmRecognizer")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

impl VlmRecognizer {
    /// Create the engine, resolving the provider from `config` or the
    /// environment.
    ///
    /// # Errors
    /// [`DocScanError::EngineInitialization`] when no provider can be created
    /// (unknown provider name, missing API key, ...).
    pub fn new(config: RecognizerConfig) -> Result<Self, DocScanError> {
        let provider = resolve_provider(&config)?;
        let name = format!(
            "vlm:{}",
            config
                .model
                .as_deref()
                .or(config.provider_name.as_deref())
                .unwrap_or("auto")
        );
        info!("Recognition engine ready: {}", name);
        Ok(Self {
            provider,
            config,
            name,
        })
    }

    fn messages(&self, page: &Page) -> Result<Vec<ChatMessage>, RecognizeError> {
        let system_prompt = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_OCR_PROMPT);
        let mut messages = vec![ChatMessage::system(system_prompt)];
        if let Some(ref lang) = self.config.language {
            messages.push(ChatMessage::system(language_hint(lang)));
        }

        let image = encode_page(page)
            .map_err(|e| RecognizeError::Failed(format!("image encoding failed: {}", e)))?;
        messages.push(ChatMessage::user_with_images("", vec![image]));
        Ok(messages)
    }
}

#[async_trait]
impl Recognizer for VlmRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, page: &Page) -> Result<Recognition, RecognizeError> {
        let start = Instant::now();
        let page_num = page.index();
        let messages = self.messages(page)?;
        let options = build_options(&self.config);
        let call_timeout = Duration::from_secs(self.config.api_timeout_secs);

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = self.config.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Page {}: retry {}/{} after {}ms",
                    page_num, attempt, self.config.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(call_timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Page {}: {} input tokens, {} output tokens, {:?}",
                        page_num,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(Recognition::from_text(clean_transcription(&response.content)));
                }
                Ok(Err(e)) => {
                    let err_msg = e.to_string();
                    if is_engine_failure(&err_msg) {
                        return Err(RecognizeError::Unavailable(err_msg));
                    }
                    warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
                Err(_) => {
                    warn!(
                        "Page {}: attempt {} timed out after {}s",
                        page_num,
                        attempt + 1,
                        self.config.api_timeout_secs
                    );
                    last_err = Some(format!(
                        "timed out after {}s",
                        self.config.api_timeout_secs
                    ));
                }
            }
        }

        Err(RecognizeError::Failed(
            last_err.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }
}

/// Auth and model-lookup failures. Status codes must stand alone so digits
/// inside token counts, delays or request ids never match.
static RE_ENGINE_FAILURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b40[13]\b|\bunauthori[sz]ed\b|\bforbidden\b|invalid[ _]api[ _]key|model_not_found")
        .unwrap()
});

/// Errors that mean the engine itself is unusable rather than this page.
fn is_engine_failure(message: &str) -> bool {
    RE_ENGINE_FAILURE.is_match(message)
}

/// Build `CompletionOptions` from the recognizer config.
fn build_options(config: &RecognizerConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve an LLM provider from config, then from the environment.
pub(crate) fn resolve_provider(
    config: &RecognizerConfig,
) -> Result<Arc<dyn LLMProvider>, DocScanError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    // Honour EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL when both set
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _) =
        ProviderFactory::from_env().map_err(|e| DocScanError::EngineInitialization {
            engine: "vlm:auto".to_string(),
            detail: format!("No LLM provider auto-detected: {}", e),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DocScanError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocScanError::EngineInitialization {
            engine: format!("vlm:{}", provider_name),
            detail: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = RecognizerConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn auth_errors_are_engine_failures() {
        assert!(is_engine_failure("HTTP 401 Unauthorized"));
        assert!(is_engine_failure("Invalid API key provided"));
        assert!(!is_engine_failure("HTTP 429 rate limited"));
        assert!(!is_engine_failure("connection reset by peer"));
        assert!(is_engine_failure("HTTP 403 Forbidden"));
        assert!(is_engine_failure("error: model_not_found"));
    }

    #[test]
    fn status_digits_inside_numbers_are_page_errors() {
        assert!(!is_engine_failure(
            "HTTP 429: rate limited, please retry in 14013 ms"
        ));
        assert!(!is_engine_failure(
            "context_length_exceeded: requested 24031 tokens"
        ));
        assert!(!is_engine_failure(
            "HTTP 500 internal error (request id req_4030af)"
        ));
    }

    #[test]
    fn unknown_provider_is_initialization_error() {
        let config = RecognizerConfig::builder()
            .provider_name("no-such-provider")
            .build()
            .unwrap();
        let err = VlmRecognizer::new(config).unwrap_err();
        assert!(matches!(err, DocScanError::EngineInitialization { .. }));
    }
}
