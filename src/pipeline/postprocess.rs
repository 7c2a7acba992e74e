//! Post-processing: deterministic cleanup of VLM transcriptions.
//!
//! ## Why is post-processing necessary?
//!
//! Even well-prompted VLMs occasionally wrap a plain transcription in
//! artefacts that are harmless to a human reader but wrong as OCR output:
//!
//! - ` ```text ... ``` ` fences despite the prompt saying "no fences"
//! - a chatty preamble such as "Here is the extracted text:"
//! - Windows-style `\r\n` line endings and trailing spaces
//! - zero-width characters copied from the model's tokenizer
//! - a sentence like "There is no text in this image." for a blank page
//!
//! These rules fix the quirks without touching the transcribed content.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule sees `\n` only;
//! fences are stripped before the preamble check so a fenced preamble-free
//! body is recognised; the blank-page sentinel is checked last, on the
//! fully cleaned text.

use crate::prompts::NO_TEXT_SENTINEL;
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to a raw VLM transcription.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip outer code fences
/// 3. Drop a leading "Here is the text" preamble line
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Trim trailing whitespace per line
/// 6. Collapse 3+ consecutive newlines to a single blank line
/// 7. Trim leading/trailing blank lines
/// 8. Map the no-text sentinel (and common "no text" sentences) to `""`
pub fn clean_transcription(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_code_fences(&s);
    let s = drop_preamble(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = s.trim_matches('\n').to_string();
    blank_page_to_empty(s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 3: Drop a chatty preamble ───────────────────────────────────────────

static RE_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(here\s+is|here's|below\s+is|sure[,!.]?\s*here\s+is)\b[^\n]{0,80}(text|transcription|content)[^\n]{0,40}:\s*\n",
    )
    .unwrap()
});

fn drop_preamble(input: &str) -> String {
    RE_PREAMBLE.replace(input, "").to_string()
}

// ── Rule 4: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 5: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 8: Blank pages ──────────────────────────────────────────────────────

static RE_NO_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(the\s+)?(image|page)\s+(contains|has)\s+no\s+(readable\s+|visible\s+)?text\.?$|^there\s+is\s+no\s+(readable\s+|visible\s+)?text[^\n]{0,40}\.?$",
    )
    .unwrap()
});

fn blank_page_to_empty(s: String) -> String {
    let t = s.trim();
    if t == NO_TEXT_SENTINEL || RE_NO_TEXT.is_match(t) {
        String::new()
    } else {
        s
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences_with_and_without_language() {
        assert_eq!(strip_code_fences("```text\nHello\nWorld\n```"), "Hello\nWorld");
        assert_eq!(strip_code_fences("```\nHello\n```"), "Hello");
        assert_eq!(strip_code_fences("Hello"), "Hello");
    }

    #[test]
    fn normalises_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn drops_preamble_only_at_start() {
        let input = "Here is the extracted text:\nINVOICE 42\nTotal: 10";
        assert_eq!(drop_preamble(input), "INVOICE 42\nTotal: 10");

        let body = "Dear customer,\nHere is the text you asked for:\nfoo";
        assert_eq!(drop_preamble(body), body);
    }

    #[test]
    fn removes_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn blank_page_answers_become_empty() {
        assert_eq!(clean_transcription(NO_TEXT_SENTINEL), "");
        assert_eq!(clean_transcription("The image contains no text."), "");
        assert_eq!(clean_transcription("There is no readable text on this page."), "");
        assert_eq!(clean_transcription("No smoking"), "No smoking");
    }

    #[test]
    fn full_pipeline() {
        let input = "```text\r\nHere is the transcription:\r\n第一行  \r\n\r\n\r\n\r\nLine\u{200B} two\r\n```";
        assert_eq!(clean_transcription(input), "第一行\n\nLine two");
    }

    #[test]
    fn content_is_otherwise_untouched() {
        let input = "  indented line\n| a | b |\n# not a heading";
        assert_eq!(clean_transcription(input), input);
    }
}
