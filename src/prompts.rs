//! Prompts for VLM transcription and text analysis.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing the default behaviour (e.g. how
//!    blank pages are reported) requires editing exactly one place.
//!
//! 2. **Testability**: unit tests can import and inspect prompts directly
//!    without spinning up a real VLM.
//!
//! Callers can override the transcription prompt via
//! [`crate::config::RecognizerConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

/// Answer the model is told to give for a page with no text. Mapped to `""`
/// by [`crate::pipeline::postprocess::clean_transcription`].
pub const NO_TEXT_SENTINEL: &str = "[[NO_TEXT]]";

/// Default system prompt for transcribing a scanned page image.
pub const DEFAULT_OCR_PROMPT: &str = r#"You are an OCR engine. Transcribe all text visible in the image exactly as written.

Follow these rules precisely:

1. FIDELITY
   - Reproduce every character, including numbers, punctuation and symbols
   - Keep the original language and script; never translate
   - Do not correct spelling or grammar

2. LAYOUT
   - Output one line of text per visual line, in natural reading order
   - Separate paragraphs and blocks with a single empty line
   - For tables, output each row on one line with cells separated by two spaces

3. UNCERTAINTY
   - If a word is partly illegible, transcribe the legible part
   - Do not guess text that is not visible

4. OUTPUT FORMAT
   - Output ONLY the transcribed text, as plain text
   - Do NOT use Markdown, code fences or any formatting markup
   - Do NOT add commentary, headings or explanations
   - If the image contains no text at all, output exactly: [[NO_TEXT]]"#;

/// Extra instruction sent when a language hint is configured.
pub fn language_hint(language: &str) -> String {
    format!(
        "The document is expected to be in language '{}'. Text in other languages must still be transcribed as-is.",
        language
    )
}

/// System prompt for the analysis step.
pub const ANALYSIS_SYSTEM_PROMPT: &str =
    "You are a document analyst. Answer in the same language as the document text. Be concise and factual; do not invent information that is not in the text.";

/// Instruction for the `general` analysis profile.
pub const GENERAL_ANALYSIS: &str = "Analyse the following content comprehensively: summarise the main content, extract the key information, and give recommendations.";

/// Instruction for the `summary` analysis profile.
pub const SUMMARY_ANALYSIS: &str = "Write a concise summary of the following content, keeping its core points and key information.";

/// Instruction for the `extract` analysis profile.
pub const EXTRACT_ANALYSIS: &str = "Extract the specific data and entities from the following content (names, organisations, dates, amounts, identifiers, addresses) as a list of `field: value` lines.";

/// Instruction for the `sentiment` analysis profile.
pub const SENTIMENT_ANALYSIS: &str = "Analyse the sentiment, tone and attitude of the following content, and state the overall sentiment as positive, neutral or negative.";

/// Build the user message for an analysis request.
pub fn analysis_request(instruction: &str, content: &str) -> String {
    format!("{}\n\n\"\"\"\n{}\n\"\"\"", instruction, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_prompt_mentions_sentinel() {
        assert!(DEFAULT_OCR_PROMPT.contains(NO_TEXT_SENTINEL));
    }

    #[test]
    fn analysis_request_wraps_content() {
        let msg = analysis_request(SUMMARY_ANALYSIS, "line one\nline two");
        assert!(msg.starts_with(SUMMARY_ANALYSIS));
        assert!(msg.ends_with("line one\nline two\n\"\"\""));
    }

    #[test]
    fn language_hint_names_language() {
        assert!(language_hint("zh").contains("'zh'"));
    }
}
