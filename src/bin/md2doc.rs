//! CLI binary for edgequake-export.
//!
//! A thin shim over the library crate: every subcommand reads its input
//! file, calls one `Exporter` entry point and prints the resulting URL.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_export::{
    parse_rows, ArtifactOptions, Content, ExportConfig, ExportOutput, ExportProgressCallback,
    Exporter, FileEntry, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Spinner for single artifacts, bar for batches. Degraded blocks are
/// printed above the bar as they happen.
struct CliProgressCallback {
    bar: ProgressBar,
    degraded: AtomicUsize,
}

impl CliProgressCallback {
    fn new(message: &str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Rendering");
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            degraded: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let degraded = self.degraded.load(Ordering::SeqCst);
        if degraded > 0 {
            eprintln!(
                "{} {} block(s) replaced by placeholders",
                yellow("⚠"),
                bold(&degraded.to_string())
            );
        }
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_entries: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_entries as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Bundling");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_entries} files…"))
        ));
    }

    fn on_entry_start(&self, _index: usize, _total: usize, filename: &str) {
        self.bar.set_message(filename.to_string());
    }

    fn on_entry_complete(&self, index: usize, total: usize, url: &str) {
        if total > 1 {
            self.bar.println(format!(
                "  {} {:>3}/{:<3}  {}",
                green("✓"),
                index,
                total,
                dim(url)
            ));
            self.bar.inc(1);
        }
    }

    fn on_block_degraded(&self, reference: &str, reason: &str) {
        self.degraded.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  {}",
            yellow("⚠"),
            reference,
            dim(reason)
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown to PDF (stdin works too: md2doc pdf -)
  md2doc pdf notes.md -f notes.pdf

  # Content blocks or markdown to a word document
  md2doc docx blocks.json --title "Quarterly report"

  # Slide specs to a deck
  md2doc pptx slides.json --title "Kick-off"

  # Rows to a spreadsheet or CSV
  md2doc xlsx rows.json --title Sales
  md2doc csv rows.json

  # Raw file (XML gets a prolog)
  md2doc file feed.xml --filename feed.xml

  # Several artifacts in one archive
  md2doc archive entries.json --format tar.gz --name bundle

ENVIRONMENT VARIABLES:
  FILE_EXPORT_DIR           Output root (default ./output)
  FILE_EXPORT_BASE_URL      Public URL prefix (default http://localhost:9003/files)
  PERSISTENT_FILES          Keep files instead of deleting them after FILES_DELAY
  FILES_DELAY               Minutes before non-persistent folders are deleted
  IMAGE_SOURCE              unsplash, local_sd or none
  UNSPLASH_ACCESS_KEY       Unsplash API key
  LOCAL_SD_URL              Stable Diffusion web API base URL
  LOCAL_SD_API_KEY          Bearer token for LOCAL_SD_URL
  FILE_EXPORT_TEMPLATE_DIR  Directory holding .docx / .pptx / .xlsx templates
  IMAGE_TIMEOUT_SECS        Per-request image timeout (1-300, default 30)
  RUST_LOG / LOG_LEVEL      Log filter; LOG_FORMAT=json for JSON logs
"#;

/// Render markdown, content blocks, slides and tables into documents.
#[derive(Parser, Debug)]
#[command(
    name = "md2doc",
    version,
    about = "Render markdown, content blocks, slides and tables into PDF, DOCX, PPTX, XLSX, CSV and archives",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output root; overrides FILE_EXPORT_DIR.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Public URL prefix; overrides FILE_EXPORT_BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Template directory; overrides FILE_EXPORT_TEMPLATE_DIR.
    #[arg(long, global = true)]
    template_dir: Option<PathBuf>,

    /// Print the result as JSON.
    #[arg(long, global = true, env = "MD2DOC_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "MD2DOC_NO_PROGRESS")]
    no_progress: bool,

    /// Wait for scheduled deletions before exiting instead of cancelling
    /// them.
    #[arg(long, global = true)]
    wait_cleanup: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MD2DOC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MD2DOC_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Filename inside the export folder (default: export_<timestamp>.<ext>).
    #[arg(short, long)]
    filename: Option<String>,

    /// Keep the file; overrides PERSISTENT_FILES.
    #[arg(long)]
    persistent: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Markdown to PDF.
    Pdf {
        /// Markdown file, or `-` for stdin.
        input: String,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Markdown or a JSON block list to a word document.
    Docx {
        /// `.json` block list, markdown file, or `-` for stdin.
        input: String,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// JSON slide list to a slide deck.
    Pptx {
        input: String,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// JSON rows to a spreadsheet.
    Xlsx {
        input: String,
        /// Sheet name.
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// JSON rows to CSV.
    Csv {
        input: String,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Any text file, written verbatim.
    File {
        input: String,
        /// Filename inside the export folder.
        #[arg(long)]
        filename: String,
        #[arg(long)]
        persistent: bool,
    },
    /// JSON list of entries to one archive.
    Archive {
        input: String,
        /// zip, 7z or tar.gz.
        #[arg(long, default_value = "zip")]
        format: String,
        /// Archive base name (default: archive).
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        persistent: bool,
    },
}

impl OutputArgs {
    fn options(&self, title: Option<String>) -> ArtifactOptions {
        ArtifactOptions {
            filename: self.filename.clone(),
            persistent: self.persistent.then_some(true),
            title,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    init_logging(&cli, show_progress);

    // ── Build exporter ───────────────────────────────────────────────────
    let progress = show_progress.then(|| CliProgressCallback::new(cli.command.label()));
    let mut config = ExportConfig::from_env().context("Invalid export configuration")?;
    if let Some(ref dir) = cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(ref url) = cli.base_url {
        config.base_url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(ref dir) = cli.template_dir {
        config.template_dir = Some(dir.clone());
    }
    if let Some(ref cb) = progress {
        config.progress_callback = Some(cb.clone() as ProgressCallback);
    }
    let exporter = Exporter::new(config).context("Failed to initialise exporter")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let start = Instant::now();
    let result = run(&exporter, &cli.command).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let output = result?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else {
        println!("{}", output.url);
        if !cli.quiet {
            eprintln!(
                "{}  {}  {}ms  →  {}",
                green("✔"),
                bold(&output.filename),
                start.elapsed().as_millis(),
                dim(&output.path.display().to_string()),
            );
        }
    }

    // ── Scheduled deletions ──────────────────────────────────────────────
    let pending = exporter.cleanup().pending();
    if pending > 0 {
        if cli.wait_cleanup {
            if !cli.quiet {
                eprintln!(
                    "{} waiting {}s for scheduled deletion…",
                    dim("…"),
                    exporter.cleanup().delay().as_secs()
                );
            }
            exporter.cleanup().wait_all().await;
        } else {
            exporter.cleanup().abort_all();
            if !cli.quiet {
                eprintln!(
                    "{} scheduled deletion cancelled on exit; the file is kept",
                    dim("ℹ")
                );
            }
        }
    }

    Ok(())
}

async fn run(exporter: &Exporter, command: &Command) -> Result<ExportOutput> {
    let output = match command {
        Command::Pdf { input, out } => {
            let content = Content::Markdown(read_input(input).await?);
            exporter.create_pdf(&content, out.options(None)).await
        }
        Command::Docx { input, title, out } => {
            let raw = read_input(input).await?;
            let content = if is_json(input) {
                Content::from_value(&parse_json(input, &raw)?)
            } else {
                Content::Markdown(raw)
            };
            exporter.create_word(&content, out.options(title.clone())).await
        }
        Command::Pptx { input, title, out } => {
            // The library reports unparsable slide data with a precise error.
            let raw = read_input(input).await?;
            exporter
                .create_presentation_from_value(&Value::String(raw), out.options(title.clone()))
                .await
        }
        Command::Xlsx { input, title, out } => {
            let rows = parse_rows(&parse_json(input, &read_input(input).await?)?);
            exporter.create_excel(&rows, out.options(title.clone())).await
        }
        Command::Csv { input, out } => {
            let rows = parse_rows(&parse_json(input, &read_input(input).await?)?);
            exporter.create_csv(&rows, out.options(None)).await
        }
        Command::File {
            input,
            filename,
            persistent,
        } => {
            let raw = read_input(input).await?;
            exporter
                .create_file(&raw, filename, persistent.then_some(true))
                .await
        }
        Command::Archive {
            input,
            format,
            name,
            persistent,
        } => {
            let raw = read_input(input).await?;
            let entries: Vec<FileEntry> = serde_json::from_str(&raw)
                .with_context(|| format!("'{input}' is not a JSON list of entries"))?;
            exporter
                .generate_and_archive(&entries, format, name.as_deref(), persistent.then_some(true))
                .await
        }
    };
    output.with_context(|| format!("{} export failed", command.label()))
}

impl Command {
    fn label(&self) -> &'static str {
        match self {
            Command::Pdf { .. } => "PDF",
            Command::Docx { .. } => "DOCX",
            Command::Pptx { .. } => "PPTX",
            Command::Xlsx { .. } => "XLSX",
            Command::Csv { .. } => "CSV",
            Command::File { .. } => "File",
            Command::Archive { .. } => "Archive",
        }
    }
}

async fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {input:?}"))
}

fn is_json(input: &str) -> bool {
    Path::new(input)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn parse_json(input: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("'{input}' is not valid JSON"))
}

// ── Logging ──────────────────────────────────────────────────────────────────

/// Map a `LOG_LEVEL` value (names or numeric levels) to a filter directive.
fn map_log_level(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" | "10" => Some("debug"),
        "info" | "20" => Some("info"),
        "warning" | "warn" | "30" => Some("warn"),
        "error" | "critical" | "40" | "50" => Some("error"),
        _ => None,
    }
}

/// `--verbose` / `--quiet` first, then `RUST_LOG`, then `LOG_LEVEL`.
/// With the spinner active the default drops to `warn` so the bar stays
/// readable.
fn log_filter(cli: &Cli, show_progress: bool) -> EnvFilter {
    if cli.verbose {
        return EnvFilter::new("debug");
    }
    if cli.quiet {
        return EnvFilter::new("error");
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|v| map_log_level(&v))
        .unwrap_or(if show_progress { "warn" } else { "info" });
    EnvFilter::new(level)
}

fn init_logging(cli: &Cli, show_progress: bool) {
    let filter = log_filter(cli, show_progress);
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}
