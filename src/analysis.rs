//! Forward extracted text to an AI analysis workflow.
//!
//! The workflow is a capability, [`Analyzer`]; [`LlmAnalyzer`] implements it
//! with an `edgequake-llm` chat provider. [`forward_for_analysis`] enforces
//! the request rules (non-empty, at most [`MAX_ANALYSIS_CHARS`] characters,
//! known profile) before anything leaves the process.

use crate::config::RecognizerConfig;
use crate::error::{AnalysisError, DocScanError};
use crate::pipeline::llm::resolve_provider;
use crate::prompts::{
    analysis_request, ANALYSIS_SYSTEM_PROMPT, EXTRACT_ANALYSIS, GENERAL_ANALYSIS,
    SENTIMENT_ANALYSIS, SUMMARY_ANALYSIS,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

/// Longest text accepted for analysis, in characters.
pub const MAX_ANALYSIS_CHARS: usize = 50_000;

/// What kind of analysis to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisProfile {
    /// Overall analysis: main content, key information, recommendations.
    General,
    /// Concise summary.
    Summary,
    /// Structured data and entities.
    Extract,
    /// Sentiment and tone.
    Sentiment,
}

impl AnalysisProfile {
    pub const ALL: [AnalysisProfile; 4] = [
        AnalysisProfile::General,
        AnalysisProfile::Summary,
        AnalysisProfile::Extract,
        AnalysisProfile::Sentiment,
    ];

    pub fn id(self) -> &'static str {
        match self {
            AnalysisProfile::General => "general",
            AnalysisProfile::Summary => "summary",
            AnalysisProfile::Extract => "extract",
            AnalysisProfile::Sentiment => "sentiment",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AnalysisProfile::General => "General analysis",
            AnalysisProfile::Summary => "Content summary",
            AnalysisProfile::Extract => "Information extraction",
            AnalysisProfile::Sentiment => "Sentiment analysis",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AnalysisProfile::General => "Comprehensive analysis and understanding of the text",
            AnalysisProfile::Summary => "Core content and key information of the text",
            AnalysisProfile::Extract => "Specific data and entities found in the text",
            AnalysisProfile::Sentiment => "Sentiment, tone and attitude of the text",
        }
    }

    /// Instruction placed before the content in the analysis request.
    pub fn instruction(self) -> &'static str {
        match self {
            AnalysisProfile::General => GENERAL_ANALYSIS,
            AnalysisProfile::Summary => SUMMARY_ANALYSIS,
            AnalysisProfile::Extract => EXTRACT_ANALYSIS,
            AnalysisProfile::Sentiment => SENTIMENT_ANALYSIS,
        }
    }
}

impl FromStr for AnalysisProfile {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.id() == wanted)
            .ok_or_else(|| AnalysisError::UnknownProfile(s.to_string()))
    }
}

/// Result of one analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub analysis_type: AnalysisProfile,
    /// Length of the analysed text, in characters.
    pub original_content_length: usize,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

/// An external analysis workflow.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str, profile: AnalysisProfile) -> Result<String, AnalysisError>;
}

/// Validate `text` and `profile_id`, then forward the text to `analyzer`.
///
/// # Errors
/// - [`AnalysisError::EmptyContent`]: text is empty or whitespace
/// - [`AnalysisError::ContentTooLong`]: more than `limit` characters
/// - [`AnalysisError::UnknownProfile`]: not one of general, summary,
///   extract, sentiment
/// - [`AnalysisError::Provider`]: the analyzer failed
pub async fn forward_for_analysis(
    analyzer: &dyn Analyzer,
    text: &str,
    profile_id: &str,
    limit: usize,
) -> Result<AnalysisResult, AnalysisError> {
    if text.trim().is_empty() {
        return Err(AnalysisError::EmptyContent);
    }
    let length = text.chars().count();
    if length > limit {
        return Err(AnalysisError::ContentTooLong { length, limit });
    }
    let profile: AnalysisProfile = profile_id.parse()?;

    let result = analyzer.analyze(text, profile).await?;
    info!(
        "Analysis '{}' complete: {} chars in, {} chars out",
        profile.id(),
        length,
        result.chars().count()
    );

    Ok(AnalysisResult {
        success: true,
        analysis_type: profile,
        original_content_length: length,
        result,
        timestamp: Utc::now(),
    })
}

/// An [`Analyzer`] backed by an LLM chat provider.
pub struct LlmAnalyzer {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl LlmAnalyzer {
    /// Build from the same provider settings as the recognition engine.
    pub fn new(config: &RecognizerConfig) -> Result<Self, DocScanError> {
        Ok(Self::with_provider(resolve_provider(config)?, config))
    }

    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: &RecognizerConfig) -> Self {
        Self {
            provider,
            temperature: 0.3,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    async fn analyze(&self, text: &str, profile: AnalysisProfile) -> Result<String, AnalysisError> {
        let messages = vec![
            ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
            ChatMessage::user(analysis_request(profile.instruction(), text)),
        ];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.chat(&messages, Some(&options)),
        )
        .await
        .map_err(|_| AnalysisError::Provider(format!("timed out after {}s", self.timeout_secs)))?
        .map_err(|e| AnalysisError::Provider(e.to_string()))?;

        debug!(
            "Analysis '{}': {} input tokens, {} output tokens",
            profile.id(),
            response.prompt_tokens,
            response.completion_tokens
        );
        Ok(response.content.trim().to_string())
    }
}
