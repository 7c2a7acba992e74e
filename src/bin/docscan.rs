//! CLI binary for edgequake-docscan.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ScanConfig` / `RecognizerConfig`, scans the given files and prints the
//! outcomes.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docscan::{
    forward_for_analysis, inspect_pdf, AnalysisError, AnalysisResult, LlmAnalyzer, PageSeparator,
    ProcessingOutcome, ProgressCallback, RecognizerConfig, ScanConfig, ScanEnvelope,
    ScanProgressCallback, Scanner, UploadRequest, VlmRecognizer, MAX_ANALYSIS_CHARS,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over files, one log line per page.
/// Works when files complete out of order (`--concurrency > 1`).
struct CliProgressCallback {
    bar: ProgressBar,
    page_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Scanning");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_errors: AtomicUsize::new(0),
        })
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_files} file(s)…"))
        ));
    }

    fn on_file_start(&self, _file_index: usize, filename: &str) {
        self.bar.set_message(filename.to_string());
    }

    fn on_page_complete(&self, file_index: usize, page: usize, chars: usize) {
        self.bar.println(format!(
            "  {} File {:>3}  page {:>3}  {}",
            green("✓"),
            file_index + 1,
            page,
            dim(&format!("{chars:>5} chars")),
        ));
    }

    fn on_page_error(&self, file_index: usize, page: usize, error: &str) {
        self.page_errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} File {:>3}  page {:>3}  {}",
            red("✗"),
            file_index + 1,
            page,
            red(&msg),
        ));
    }

    fn on_file_complete(&self, _file_index: usize, _success: bool) {
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, succeeded: usize) {
        let failed = total_files.saturating_sub(succeeded);
        self.bar.finish_and_clear();
        let page_errors = self.page_errors.load(Ordering::SeqCst);

        if failed == 0 {
            eprintln!(
                "{} {} file(s) scanned successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files scanned  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&succeeded.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
        if page_errors > 0 {
            eprintln!("   {} page error(s)", dim(&page_errors.to_string()));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise one image (stdout)
  docscan receipt.jpg

  # Batch of PDFs and images, JSON envelope
  docscan --json invoice.pdf photo.png scan.tiff > results.json

  # Four files at a time, blank line between PDF pages
  docscan --concurrency 4 --separator blank *.pdf

  # Use a specific model
  docscan --model gpt-4.1 --provider openai contract.pdf

  # Forward the extracted text for a summary
  docscan --analyze summary report.pdf

  # Inspect PDF metadata (no API key needed)
  docscan --inspect-only document.pdf

  # Check that the recognition engine can be created
  docscan --health

SUPPORTED FORMATS:
  pdf, jpeg/jpg, png, bmp, tiff/tif  (max 16 MiB per file by default)

ANALYSIS PROFILES:
  general, summary, extract, sentiment  (max 50,000 characters)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
"#;

/// Extract text from PDFs and images using a vision recognition engine.
#[derive(Parser, Debug)]
#[command(
    name = "docscan",
    version,
    about = "Extract text from PDFs and images using Vision LLMs",
    long_about = "Extract text from PDF documents and JPEG/PNG/BMP/TIFF images. Each file is \
detected, rasterised page by page, recognised by a vision model and reported as its own \
success or failure; one bad file never fails the batch.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to scan.
    #[arg(required_unless_present = "health")]
    files: Vec<PathBuf>,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "DOCSCAN_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// PDF rendering DPI (72–400).
    #[arg(long, env = "DOCSCAN_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Number of files processed at once.
    #[arg(short, long, env = "DOCSCAN_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Maximum upload size in bytes.
    #[arg(long, env = "DOCSCAN_MAX_FILE_SIZE", default_value_t = edgequake_docscan::DEFAULT_MAX_FILE_SIZE)]
    max_file_size: usize,

    /// Preview thumbnail bounding box in pixels.
    #[arg(long, env = "DOCSCAN_THUMBNAIL_SIZE", default_value_t = 300)]
    thumbnail_size: u32,

    /// Page separator: newline, blank, or custom string.
    #[arg(long, env = "DOCSCAN_SEPARATOR", default_value = "newline")]
    separator: String,

    /// Language hint for the recognition model, e.g. zh or en.
    #[arg(long, env = "DOCSCAN_LANGUAGE")]
    language: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "DOCSCAN_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per page.
    #[arg(long, env = "DOCSCAN_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCSCAN_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per page on LLM failure.
    #[arg(long, env = "DOCSCAN_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-page LLM call timeout in seconds.
    #[arg(long, env = "DOCSCAN_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Forward extracted text for analysis: general, summary, extract, sentiment.
    #[arg(long, env = "DOCSCAN_ANALYZE")]
    analyze: Option<String>,

    /// Output JSON envelopes instead of plain text.
    #[arg(long, env = "DOCSCAN_JSON")]
    json: bool,

    /// Print PDF metadata only, no recognition.
    #[arg(long)]
    inspect_only: bool,

    /// Print recognition engine status and exit.
    #[arg(long)]
    health: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCSCAN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose brings everything back.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.health;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        return inspect(&cli).await;
    }

    // ── Recognition engine ───────────────────────────────────────────────
    let recognizer_config = build_recognizer_config(&cli).await?;
    let engine = VlmRecognizer::new(recognizer_config.clone())
        .context("Failed to initialise recognition engine")?;

    if cli.health {
        let info = edgequake_docscan::Recognizer::info(&engine);
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("Failed to serialise engine info")?
        );
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ScanProgressCallback>)
    } else {
        None
    };
    let scanner = Scanner::new(Arc::new(engine), build_scan_config(&cli, progress_cb)?);

    // ── Read uploads ─────────────────────────────────────────────────────
    let mut uploads = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        uploads.push(
            UploadRequest::from_path(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
        );
    }

    // ── Scan ─────────────────────────────────────────────────────────────
    let start = Instant::now();
    let mut outcomes = Vec::with_capacity(uploads.len());
    let mut stream = scanner.scan_stream(uploads).context("Scan failed")?;
    while let Some(outcome) = stream.next().await {
        outcomes.push(outcome.context("Scan aborted")?);
    }
    drop(stream);

    // ── Analysis ─────────────────────────────────────────────────────────
    let analyses = match cli.analyze {
        Some(ref profile) => analyse(&recognizer_config, &outcomes, profile).await?,
        None => Vec::new(),
    };

    // ── Output ───────────────────────────────────────────────────────────
    let rendered = if cli.json {
        render_json(outcomes.clone(), &analyses)?
    } else {
        render_text(&outcomes, &analyses)
    };
    write_output(cli.output.as_ref(), &rendered)?;

    if !cli.quiet && !show_progress && !cli.json {
        let ok = outcomes.iter().filter(|o| o.success).count();
        eprintln!(
            "Scanned {}/{} files in {}ms",
            ok,
            outcomes.len(),
            start.elapsed().as_millis()
        );
    }

    Ok(())
}

/// Print metadata for every PDF argument.
async fn inspect(cli: &Cli) -> Result<()> {
    let mut all = Vec::new();
    for path in &cli.files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let meta = inspect_pdf(bytes, cli.pdfium_lib_path.clone())
            .await
            .with_context(|| format!("Failed to inspect {}", path.display()))?;

        if cli.json {
            all.push(meta);
            continue;
        }
        println!("File:         {}", path.display());
        if let Some(ref t) = meta.title {
            println!("Title:        {}", t);
        }
        if let Some(ref a) = meta.author {
            println!("Author:       {}", a);
        }
        if let Some(ref s) = meta.subject {
            println!("Subject:      {}", s);
        }
        println!("Pages:        {}", meta.page_count);
        println!("PDF Version:  {}", meta.pdf_version);
        if let Some(ref p) = meta.producer {
            println!("Producer:     {}", p);
        }
        if let Some(ref c) = meta.creator {
            println!("Creator:      {}", c);
        }
        println!();
    }
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&all).context("Failed to serialize metadata")?
        );
    }
    Ok(())
}

/// Analysis of one scanned file. A failed analysis is reported next to that
/// file's outcome and never ends the run.
#[derive(Debug, Serialize)]
struct FileAnalysis {
    index: usize,
    original_filename: String,
    #[serde(flatten)]
    result: AnalysisOutcome,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnalysisOutcome {
    Done(AnalysisResult),
    Failed { success: bool, error: String },
}

impl FileAnalysis {
    fn new(outcome: &ProcessingOutcome, result: Result<AnalysisResult, AnalysisError>) -> Self {
        let result = match result {
            Ok(analysis) => AnalysisOutcome::Done(analysis),
            Err(e) => {
                tracing::warn!("Analysis of {} failed: {}", outcome.original_filename, e);
                AnalysisOutcome::Failed {
                    success: false,
                    error: e.to_string(),
                }
            }
        };
        Self {
            index: outcome.index,
            original_filename: outcome.original_filename.clone(),
            result,
        }
    }
}

/// Forward every successful file with text to the analysis workflow.
async fn analyse(
    config: &RecognizerConfig,
    outcomes: &[ProcessingOutcome],
    profile: &str,
) -> Result<Vec<FileAnalysis>> {
    let analyzer = LlmAnalyzer::new(config).context("Failed to initialise analyzer")?;
    let mut results = Vec::new();
    for outcome in outcomes {
        let Some(text) = outcome.text().filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        let result = forward_for_analysis(&analyzer, text, profile, MAX_ANALYSIS_CHARS).await;
        results.push(FileAnalysis::new(outcome, result));
    }
    Ok(results)
}

#[derive(Serialize)]
struct JsonOutput<'a, T: Serialize> {
    #[serde(flatten)]
    envelope: ScanEnvelope<T>,
    #[serde(skip_serializing_if = "no_analysis")]
    analysis: &'a [FileAnalysis],
}

fn no_analysis(analysis: &&[FileAnalysis]) -> bool {
    analysis.is_empty()
}

fn render_json(mut outcomes: Vec<ProcessingOutcome>, analysis: &[FileAnalysis]) -> Result<String> {
    let json = if outcomes.len() == 1 {
        let outcome = outcomes.remove(0);
        serde_json::to_string_pretty(&JsonOutput {
            envelope: ScanEnvelope::single(outcome),
            analysis,
        })
    } else {
        let report = edgequake_docscan::BatchReport::from_outcomes(outcomes);
        serde_json::to_string_pretty(&JsonOutput {
            envelope: ScanEnvelope::batch(report),
            analysis,
        })
    };
    json.context("Failed to serialise output")
}

fn render_text(outcomes: &[ProcessingOutcome], analyses: &[FileAnalysis]) -> String {
    let mut out = String::new();
    let headers = outcomes.len() > 1;
    for outcome in outcomes {
        if headers {
            out.push_str(&format!("==> {} <==\n", outcome.original_filename));
        }
        match outcome.text() {
            Some(text) => {
                out.push_str(text);
                if !text.ends_with('\n') {
                    out.push('\n');
                }
            }
            None => out.push_str(&format!(
                "[{}] {}\n",
                outcome.error_code.as_deref().unwrap_or("ERROR"),
                outcome.message
            )),
        }
        for analysis in analyses.iter().filter(|a| a.index == outcome.index) {
            match &analysis.result {
                AnalysisOutcome::Done(a) => out.push_str(&format!(
                    "\n--- {} ---\n{}\n",
                    a.analysis_type.name(),
                    a.result
                )),
                AnalysisOutcome::Failed { error, .. } => {
                    out.push_str(&format!("\n--- analysis failed ---\n{}\n", error))
                }
            }
        }
        if headers {
            out.push('\n');
        }
    }
    out
}

fn write_output(path: Option<&PathBuf>, rendered: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            Ok(())
        }
    }
}

/// Map CLI args to `RecognizerConfig`.
async fn build_recognizer_config(cli: &Cli) -> Result<RecognizerConfig> {
    let mut builder = RecognizerConfig::builder()
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref lang) = cli.language {
        builder = builder.language(lang.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid recognizer configuration")
}

/// Map CLI args to `ScanConfig`.
fn build_scan_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .max_file_size(cli.max_file_size)
        .thumbnail_size(cli.thumbnail_size)
        .page_separator(parse_separator(&cli.separator));

    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "newline" | "\\n" => PageSeparator::Newline,
        "blank" | "blankline" => PageSeparator::BlankLine,
        _ => PageSeparator::Custom(s.to_string()),
    }
}
