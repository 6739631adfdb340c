//! CLI binary for answer-grader.
//!
//! A thin shim over the library crate: maps CLI flags to `GraderConfig`,
//! drives one `GradingSession` through ingest → select → recognise →
//! evaluate, and prints the results.

use anyhow::{Context, Result};
use answer_grader::{
    AnswerLanguage, EngineKind, EvaluationOutcome, GraderConfig, GradingSession, IngestError,
    KeywordReport, NormalizationStrategy, ProgressCallback, RecognitionOutcome,
    SessionProgressCallback,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner with one log line per finished step.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SessionProgressCallback for CliProgressCallback {
    fn on_ingest_start(&self, total_files: usize) {
        self.bar.set_prefix("Ingesting");
        self.bar.set_message(format!("{total_files} file(s)"));
    }

    fn on_file_ingested(&self, filename: &str, items: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            filename,
            dim(&format!("{items} page(s)"))
        ));
    }

    fn on_file_failed(&self, filename: &str, error: &str) {
        self.bar
            .println(format!("  {} {}  {}", red("✗"), filename, red(error)));
    }

    fn on_recognition_start(&self, engine: EngineKind, items: usize) {
        self.bar.set_prefix("Recognising");
        self.bar.set_message(format!("{items} image(s) via {engine}"));
    }

    fn on_recognition_fallback(&self, error: &str) {
        self.bar.println(format!(
            "  {} vision engine failed, using batch OCR  {}",
            cyan("⚠"),
            dim(error)
        ));
    }

    fn on_recognition_complete(&self, engine: Option<EngineKind>, chars: usize) {
        match engine {
            Some(engine) => self.bar.println(format!(
                "  {} recognised via {}  {}",
                green("✓"),
                engine,
                dim(&format!("{chars} chars"))
            )),
            None => self
                .bar
                .println(format!("  {} recognition failed", red("✗"))),
        }
    }

    fn on_evaluation_start(&self, model: &str) {
        self.bar.set_prefix("Evaluating");
        self.bar.set_message(format!("with {model}"));
    }

    fn on_evaluation_complete(&self, success: bool, chars: usize) {
        if success {
            self.bar.println(format!(
                "  {} evaluated  {}",
                green("✓"),
                dim(&format!("{chars} chars"))
            ));
        } else {
            self.bar.println(format!("  {} evaluation failed", red("✗")));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise every page of a scanned script
  answer-grader script.pdf

  # Recognise pages 2 to 4 only, Tamil script
  answer-grader --select 2-4 --lang ta script.pdf

  # Single photo (vision model first, batch OCR as fallback)
  answer-grader answer.jpg

  # Recognise and grade
  answer-grader script.pdf --answer-key key.txt \
      --rubric "grammar=3,correct spelling=2,creativity=5"

  # Offline keyword grading, one question per line in each file
  answer-grader script.pdf --grader keyword --answer-key key.txt \
      --marks marks.txt --keywords keywords.txt

  # JSON report
  answer-grader --json script.pdf --answer-key key.txt --rubric "accuracy=10"

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY              OpenAI API key
  ANTHROPIC_API_KEY           Anthropic API key
  GEMINI_API_KEY              Google Gemini API key
  ANSWER_GRADER_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  ANSWER_GRADER_MODEL         Override model ID for that provider

SERVICES:
  The PDF rasteriser and the batch OCR service are expected at
  http://localhost:5000/extract_pdf and http://localhost:5000/ocr unless
  --rasterizer-url / --ocr-url say otherwise.
"#;

/// Recognise handwritten answer scripts and grade them against a rubric.
#[derive(Parser, Debug)]
#[command(
    name = "answer-grader",
    version,
    about = "Recognise handwritten answer scripts and grade them against a rubric",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or image files, in the order their pages should appear.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Items to recognise: all, 3, 2-4 or 1,3,5 (1-indexed preview positions).
    #[arg(long, env = "ANSWER_GRADER_SELECT", default_value = "all")]
    select: String,

    /// File containing the teacher's answer key.
    #[arg(long, env = "ANSWER_GRADER_ANSWER_KEY")]
    answer_key: Option<PathBuf>,

    /// Rubric, e.g. "grammar=3,correct spelling=2,creativity=5".
    #[arg(long, env = "ANSWER_GRADER_RUBRIC")]
    rubric: Option<String>,

    /// How the recognised text is graded.
    #[arg(long, env = "ANSWER_GRADER_GRADER", value_enum, default_value = "llm")]
    grader: GraderArg,

    /// File with one mark per answer-key line (keyword grader; default 1 each).
    #[arg(long, env = "ANSWER_GRADER_MARKS")]
    marks: Option<PathBuf>,

    /// File with comma-separated keywords per answer-key line (keyword grader).
    #[arg(long, env = "ANSWER_GRADER_KEYWORDS")]
    keywords: Option<PathBuf>,

    /// Language of the answer script.
    #[arg(long, env = "ANSWER_GRADER_LANG", value_enum, default_value = "en")]
    lang: LangArg,

    /// Cleanup applied to the recognised text.
    #[arg(long, env = "ANSWER_GRADER_NORMALIZE", value_enum, default_value = "duplicate-pass")]
    normalize: NormalizeArg,

    /// PDF rasterisation endpoint.
    #[arg(long, env = "ANSWER_GRADER_RASTERIZER_URL")]
    rasterizer_url: Option<String>,

    /// Batch OCR endpoint.
    #[arg(long, env = "ANSWER_GRADER_OCR_URL")]
    ocr_url: Option<String>,

    /// LLM provider for the vision and grading engines.
    #[arg(long, env = "ANSWER_GRADER_PROVIDER")]
    provider: Option<String>,

    /// Vision model for single-page transcription.
    #[arg(long, env = "ANSWER_GRADER_VISION_MODEL")]
    vision_model: Option<String>,

    /// Model identifier for grading.
    #[arg(long, env = "ANSWER_GRADER_GRADING_MODEL")]
    grading_model: Option<String>,

    /// HTTP timeout in seconds for the two services.
    #[arg(long, env = "ANSWER_GRADER_TIMEOUT")]
    timeout: Option<u64>,

    /// Output a JSON report instead of plain text.
    #[arg(long, env = "ANSWER_GRADER_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "ANSWER_GRADER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ANSWER_GRADER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ANSWER_GRADER_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LangArg {
    En,
    Ta,
}

impl From<LangArg> for AnswerLanguage {
    fn from(v: LangArg) -> Self {
        match v {
            LangArg::En => AnswerLanguage::English,
            LangArg::Ta => AnswerLanguage::Tamil,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum GraderArg {
    /// Rubric grading by the LLM grading engine.
    Llm,
    /// Deterministic fuzzy keyword matching, no provider needed.
    Keyword,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum NormalizeArg {
    DuplicatePass,
    FirstParagraph,
    Verbatim,
}

impl From<NormalizeArg> for NormalizationStrategy {
    fn from(v: NormalizeArg) -> Self {
        match v {
            NormalizeArg::DuplicatePass => NormalizationStrategy::DuplicatePass,
            NormalizeArg::FirstParagraph => NormalizationStrategy::FirstParagraph,
            NormalizeArg::Verbatim => NormalizationStrategy::Verbatim,
        }
    }
}

/// Preview positions chosen with `--select`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Selection {
    All,
    Positions(Vec<usize>),
}

/// Machine-readable summary printed with `--json`.
#[derive(Serialize)]
struct Report<'a> {
    items: usize,
    selected: usize,
    ingest_failures: &'a [IngestError],
    recognized_text: &'a str,
    recognition_engine: Option<EngineKind>,
    fell_back: bool,
    recognition_error: Option<String>,
    evaluation: Option<&'a str>,
    evaluation_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword_report: Option<&'a KeywordReport>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let selection = parse_selection(&cli.select)?;
    let answer_key = read_optional(cli.answer_key.as_deref(), "answer key").await?;
    let marks_key = read_optional(cli.marks.as_deref(), "marks").await?;
    let keywords_key = read_optional(cli.keywords.as_deref(), "keywords").await?;

    // ── Build session ────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn SessionProgressCallback>),
    )?;
    let mut session = GradingSession::new(config).context("Failed to start session")?;

    // ── Ingest ───────────────────────────────────────────────────────────
    let report = session
        .ingest_paths(&cli.files)
        .await
        .context("Failed to read input files")?;
    if session.previews().is_empty() {
        if let Some(ref cb) = progress {
            cb.finish();
        }
        anyhow::bail!("No pages or images could be ingested");
    }

    // ── Select ───────────────────────────────────────────────────────────
    apply_selection(&mut session, &selection)?;
    let selected = session.previews().selected().len();

    // ── Recognise ────────────────────────────────────────────────────────
    session
        .recognize()
        .await
        .context("Nothing to recognise")?;

    // ── Evaluate ─────────────────────────────────────────────────────────
    let evaluate = match (cli.grader, &answer_key, &cli.rubric) {
        (GraderArg::Keyword, Some(key), _) => {
            session
                .evaluate_keywords(
                    key,
                    marks_key.as_deref().unwrap_or_default(),
                    keywords_key.as_deref().unwrap_or_default(),
                )
                .context("Cannot evaluate")?;
            true
        }
        (GraderArg::Keyword, None, _) => {
            if !cli.quiet {
                eprintln!(
                    "{} --answer-key is needed for keyword grading; skipping",
                    cyan("⚠")
                );
            }
            false
        }
        (GraderArg::Llm, Some(key), Some(rubric)) => {
            session
                .evaluate(key, rubric)
                .await
                .context("Cannot evaluate")?;
            true
        }
        (GraderArg::Llm, None, Some(_)) | (GraderArg::Llm, Some(_), None) => {
            if !cli.quiet {
                eprintln!(
                    "{} both --answer-key and --rubric are needed to evaluate; skipping",
                    cyan("⚠")
                );
            }
            false
        }
        (GraderArg::Llm, None, None) => false,
    };

    if let Some(ref cb) = progress {
        cb.finish();
    }

    // ── Output ───────────────────────────────────────────────────────────
    let recognition = session.last_recognition();
    let (engine, fell_back, recognition_error) = match recognition {
        Some(RecognitionOutcome::Recognized(r)) => (Some(r.engine), r.fell_back, None),
        Some(RecognitionOutcome::Failed { cause, .. }) => (None, false, Some(cause.to_string())),
        None => (None, false, None),
    };
    let evaluation_error = session
        .evaluation()
        .filter(|e| !e.is_success())
        .map(|e| e.text().to_string());

    if cli.json {
        let out = Report {
            items: session.previews().len(),
            selected,
            ingest_failures: &report.failures,
            recognized_text: session.recognized_text(),
            recognition_engine: engine,
            fell_back,
            recognition_error,
            evaluation: evaluate.then(|| session.evaluation_text()),
            evaluation_error,
            keyword_report: match session.evaluation() {
                Some(EvaluationOutcome::Graded(r)) => r.report.as_ref(),
                _ => None,
            },
        };
        let json = serde_json::to_string_pretty(&out).context("Failed to serialise report")?;
        println!("{json}");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_block(&mut handle, session.recognized_text())?;
    if evaluate {
        handle
            .write_all(b"\n")
            .context("Failed to write to stdout")?;
        write_block(&mut handle, session.evaluation_text())?;
    }

    if !cli.quiet && !show_progress {
        eprintln!(
            "{} item(s), {} selected, {} file(s) failed",
            session.previews().len(),
            selected,
            report.failures.len()
        );
    }

    Ok(())
}

async fn read_optional(path: Option<&Path>, what: &str) -> Result<Option<String>> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {what} from {:?}", path))
            .map(Some),
        None => Ok(None),
    }
}

fn write_block(out: &mut impl Write, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        out.write_all(b"\n").context("Failed to write to stdout")?;
    }
    Ok(())
}

/// Map CLI args to `GraderConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GraderConfig> {
    let mut builder = GraderConfig::builder()
        .language(cli.lang.into())
        .normalization(cli.normalize.into());

    if let Some(ref url) = cli.rasterizer_url {
        builder = builder.rasterizer_url(url);
    }
    if let Some(ref url) = cli.ocr_url {
        builder = builder.ocr_url(url);
    }
    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name);
    }
    if let Some(ref model) = cli.vision_model {
        builder = builder.vision_model(model);
    }
    if let Some(ref model) = cli.grading_model {
        builder = builder.grading_model(model);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.http_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Select preview items by 1-indexed position.
fn apply_selection(session: &mut GradingSession, selection: &Selection) -> Result<()> {
    match selection {
        Selection::All => session.select_all(true),
        Selection::Positions(positions) => {
            let total = session.previews().len();
            let ids: Vec<_> = session.previews().iter().map(|p| p.id).collect();
            for &pos in positions {
                let id = ids.get(pos - 1).copied().with_context(|| {
                    format!("Item {pos} does not exist (only {total} item(s) ingested)")
                })?;
                if session.previews().get(id).is_some_and(|p| !p.selected) {
                    session.toggle(id);
                }
            }
        }
    }
    Ok(())
}

/// Parse `--select` into a `Selection`.
fn parse_selection(s: &str) -> Result<Selection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(Selection::All);
    }

    // Range: "2-4"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start position in range")?;
        let end: usize = end.trim().parse().context("Invalid end position in range")?;

        if start < 1 {
            anyhow::bail!("Positions are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(Selection::Positions((start..=end).collect()));
    }

    // Set: "1,3,5" or single: "3"
    let positions: Vec<usize> = s
        .split(',')
        .map(|p| {
            p.trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid position: '{}'", p.trim()))
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(&p) = positions.iter().find(|&&p| p < 1) {
        anyhow::bail!("Positions are 1-indexed, minimum is 1 (got {})", p);
    }

    Ok(Selection::Positions(positions))
}
