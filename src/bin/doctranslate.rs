//! CLI binary for edgequake-doctranslate.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig`, drives one `Workflow` run and prints the result.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_doctranslate::http::build_http_client;
use edgequake_doctranslate::{
    translated_filename, ClientConfig, HealthReport, JobApiClient, JobStatus, Language, Level,
    TranslateError, Tracer, Workflow, WorkflowObserver, WorkflowState, DEFAULT_POLL_INTERVAL_MS,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
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

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner whose prefix follows the workflow state and
/// whose message follows the job status.
struct CliObserver {
    bar: ProgressBar,
    started: Instant,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] {pos:>3}%  {msg}  {elapsed:.dim}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Uploading");
        bar.set_message("requesting upload URL…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl WorkflowObserver for CliObserver {
    fn on_transition(&self, from: WorkflowState, to: WorkflowState) {
        match to {
            WorkflowState::FileUploaded if from == WorkflowState::Idle => {
                self.bar.println(format!("  {} File uploaded", green("✓")));
                self.bar.set_prefix("Uploaded");
            }
            WorkflowState::Submitting => {
                self.bar.set_prefix("Submitting");
                self.bar.set_message("sending translation request…");
            }
            WorkflowState::Polling => {
                self.bar.println(format!("  {} Job accepted", green("✓")));
                self.bar.set_prefix("Translating");
                self.bar.set_message("waiting for first status…");
            }
            WorkflowState::Completed => {
                self.bar.set_position(100);
                self.bar.println(format!(
                    "  {} Translation finished  {}",
                    green("✓"),
                    dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
                ));
                self.bar.set_prefix("Downloading");
                self.bar.set_message("fetching translated file…");
            }
            _ => {}
        }
    }

    fn on_status(&self, _job_id: &str, status: JobStatus) {
        self.bar.set_position(status.progress_percent() as u64);
        self.bar.set_message(status.message());
    }

    fn on_error(&self, _state: WorkflowState, error: &TranslateError) {
        self.bar.println(format!("  {} {}", red("✗"), red(&error.to_string())));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Translate a deck from English to Spanish (writes deck-translated.pptx)
  doctranslate --api-url https://api.example.com/prod/ deck.pptx --target es

  # Explicit output path and source language
  doctranslate deck.pptx --source fr --target de -o out/deck-de.pptx

  # Give up after ten minutes, poll every second
  doctranslate deck.pptx --target ja --max-poll-secs 600 --poll-interval-ms 1000

  # Machine-readable summary
  doctranslate --json deck.pptx --target ko > result.json

  # Keep the correlated request log for a support ticket
  doctranslate deck.pptx --target it --log-level debug --trace-file trace.jsonl

  # Show supported languages and the targets available from French
  doctranslate --list-languages --source fr

  # Check that the backend can reach its buckets and worker
  doctranslate --api-url https://api.example.com/prod/ --health

ENVIRONMENT VARIABLES:
  DOCTRANSLATE_API_URL            Backend base URL
  DOCTRANSLATE_ORIGINAL_BUCKET    Bucket for uploaded documents
  DOCTRANSLATE_TRANSLATED_BUCKET  Bucket holding translated documents
  DOCTRANSLATE_SOURCE             Default source language
  DOCTRANSLATE_TARGET             Default target language
  DOCTRANSLATE_LOG_LEVEL          Correlated log level (debug, info, warn, error)
  RUST_LOG                        Override the stderr tracing filter

Press Ctrl-C to abort the run at any step.
"#;

/// Translate PowerPoint decks through a presigned-upload translation service.
#[derive(Parser, Debug)]
#[command(
    name = "doctranslate",
    version,
    about = "Translate PowerPoint decks through an asynchronous translation service",
    long_about = "Upload a presentation straight to object storage with a presigned URL, submit \
a translation job, poll its status until it resolves and download the translated deck.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Presentation to translate (.ppt or .pptx).
    #[arg(required_unless_present_any = ["list_languages", "health"])]
    input: Option<PathBuf>,

    /// Write the translated deck here. Default: `<name>-translated.pptx`
    /// next to the input.
    #[arg(short, long, env = "DOCTRANSLATE_OUTPUT")]
    output: Option<PathBuf>,

    /// Source language code.
    #[arg(short, long, env = "DOCTRANSLATE_SOURCE", default_value = "en")]
    source: String,

    /// Target language code (see --list-languages).
    #[arg(short, long, env = "DOCTRANSLATE_TARGET", default_value = "")]
    target: String,

    /// Backend base URL.
    #[arg(long, env = "DOCTRANSLATE_API_URL", required_unless_present = "list_languages")]
    api_url: Option<String>,

    /// Bucket receiving uploaded documents.
    #[arg(
        long,
        env = "DOCTRANSLATE_ORIGINAL_BUCKET",
        default_value = "ppt-translation-original"
    )]
    original_bucket: String,

    /// Bucket holding translated documents.
    #[arg(
        long,
        env = "DOCTRANSLATE_TRANSLATED_BUCKET",
        default_value = "ppt-translation-translated"
    )]
    translated_bucket: String,

    /// Delay between status checks, in milliseconds.
    #[arg(long, env = "DOCTRANSLATE_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Stop polling after this many seconds. Default: wait indefinitely.
    #[arg(long, env = "DOCTRANSLATE_MAX_POLL_SECS",
          value_parser = clap::value_parser!(u64).range(1..))]
    max_poll_secs: Option<u64>,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "DOCTRANSLATE_REQUEST_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    request_timeout: Option<u64>,

    /// Level of the correlated request log: debug, info, warn, error.
    #[arg(long, env = "DOCTRANSLATE_LOG_LEVEL", default_value = "info", value_parser = parse_level)]
    log_level: Level,

    /// Write the correlated request log as JSON lines to this file.
    #[arg(long, env = "DOCTRANSLATE_TRACE_FILE")]
    trace_file: Option<PathBuf>,

    /// Print the supported languages, and the targets available from
    /// --source, then exit.
    #[arg(long)]
    list_languages: bool,

    /// Query the backend's health endpoint and exit. Exits non-zero when
    /// the backend reports itself unhealthy.
    #[arg(long, conflicts_with = "list_languages")]
    health: bool,

    /// Output a JSON summary instead of human-readable text.
    #[arg(long, env = "DOCTRANSLATE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCTRANSLATE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCTRANSLATE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCTRANSLATE_QUIET")]
    quiet: bool,
}

fn parse_level(s: &str) -> std::result::Result<Level, String> {
    s.parse::<Level>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
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

    // ── List-languages mode ──────────────────────────────────────────────
    if cli.list_languages {
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&language_listing(&cli.source))
                    .context("Failed to serialise languages")?
            );
        } else {
            for lang in Language::all() {
                println!("{}  {}", bold(lang.code), lang.name);
            }
            let targets: Vec<&str> = Language::targets_for(&cli.source).map(|l| l.code).collect();
            println!(
                "{}",
                dim(&format!("targets from {}: {}", cli.source, targets.join(" ")))
            );
        }
        return Ok(());
    }

    // ── Health mode ──────────────────────────────────────────────────────
    if cli.health {
        let tracer = Arc::new(Tracer::new(cli.log_level));
        let result = check_health(&cli, tracer.clone()).await;
        if let Some(ref path) = cli.trace_file {
            write_trace(&tracer, path)?;
        }
        let report = result?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else {
            print_health(&report);
        }
        if !report.is_healthy() {
            bail!("backend reports status '{}'", report.status);
        }
        return Ok(());
    }

    let input = cli.input.clone().context("No input file given")?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&input));

    let config = build_config(&cli)?;
    let observer = show_progress.then(CliObserver::new);
    let mut workflow = Workflow::new(config).context("Failed to initialise client")?;
    if let Some(ref obs) = observer {
        workflow = workflow.with_observer(obs.clone());
    }

    // ── Ctrl-C aborts whichever step is running ──────────────────────────
    let started = Instant::now();
    let result = until_interrupted(
        run(&mut workflow, &cli, &input, &output),
        tokio::signal::ctrl_c(),
    )
    .await;

    if let Some(ref obs) = observer {
        obs.finish();
    }
    let result = result.unwrap_or_else(|| {
        workflow.reset();
        Err(anyhow::anyhow!("Interrupted"))
    });
    if let Some(ref path) = cli.trace_file {
        write_trace(workflow.tracer(), path)?;
    }
    let bytes = result?;

    // ── Summary ──────────────────────────────────────────────────────────
    if cli.json {
        let summary = serde_json::json!({
            "input": input,
            "output": output,
            "bytes": bytes,
            "job": workflow.job(),
            "runId": workflow.run_id(),
            "durationMs": started.elapsed().as_millis() as u64,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} → {}  {}  {}",
            green("✔"),
            cli.source,
            cli.target,
            bold(&output.display().to_string()),
            dim(&format!(
                "{bytes} bytes in {:.1}s",
                started.elapsed().as_secs_f64()
            )),
        );
    }

    Ok(())
}

/// One full upload → submit → poll → download run.
async fn run(workflow: &mut Workflow, cli: &Cli, input: &Path, output: &Path) -> Result<u64> {
    workflow
        .upload_file(input)
        .await
        .with_context(|| format!("Failed to upload {}", input.display()))?;

    let job_id = workflow
        .start_translation(&cli.source, &cli.target)
        .await
        .context("Translation request failed")?;
    if !cli.quiet && !cli.json && cli.no_progress {
        eprintln!("{} job {}", cyan("◆"), bold(&job_id));
    }

    workflow
        .poll_until_resolved()
        .await
        .context("Translation did not complete")?;

    workflow
        .download_result(output)
        .await
        .with_context(|| format!("Failed to save {}", output.display()))
}

/// Drive `work` until it finishes or `interrupt` fires. Returns `None` when
/// interrupted; `work` is dropped mid-step. A failing `interrupt` future
/// (no signal handler available) is ignored.
async fn until_interrupted<W, I>(work: W, interrupt: I) -> Option<Result<u64>>
where
    W: Future<Output = Result<u64>>,
    I: Future<Output = io::Result<()>>,
{
    tokio::select! {
        r = work => Some(r),
        Ok(()) = interrupt => None,
    }
}

/// `GET health` through a standalone API client.
async fn check_health(cli: &Cli, tracer: Arc<Tracer>) -> Result<HealthReport> {
    let config = build_config(cli)?;
    let http = build_http_client(&config).context("Failed to initialise client")?;
    let api = JobApiClient::new(http, config.api_base_url.clone(), tracer);
    api.health().await.context("Health check failed")
}

fn print_health(report: &HealthReport) {
    let mark = if report.is_healthy() {
        green("✓")
    } else {
        red("✗")
    };
    println!("{mark} {}", bold(&report.status));
    if let Some(ref error) = report.error {
        println!("  {}", red(error));
    }
    for (name, detail) in &report.components {
        println!("  {}  {}", cyan(name), detail);
    }
    if let Some(ref ts) = report.timestamp {
        println!("  {}", dim(ts));
    }
}

/// `--list-languages --json` body.
fn language_listing(source: &str) -> serde_json::Value {
    let targets: Vec<&str> = Language::targets_for(source).map(|l| l.code).collect();
    serde_json::json!({
        "languages": Language::all(),
        "source": source,
        "targets": targets,
    })
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let api_url = cli
        .api_url
        .clone()
        .context("--api-url (or DOCTRANSLATE_API_URL) is required")?;

    ClientConfig::builder()
        .api_base_url(api_url)
        .original_bucket(cli.original_bucket.clone())
        .translated_bucket(cli.translated_bucket.clone())
        .poll_interval_ms(cli.poll_interval_ms)
        .max_poll_duration_secs(cli.max_poll_secs)
        .request_timeout_secs(cli.request_timeout)
        .log_level(cli.log_level)
        .build()
        .context("Invalid configuration")
}

/// `slides/deck.pptx` → `slides/deck-translated.pptx`.
fn default_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(translated_filename(&name))
}

/// Dump the tracer's records as JSON lines.
fn write_trace(tracer: &Tracer, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create trace file {}", path.display()))?;
    let mut out = io::BufWriter::new(file);
    for record in tracer.records() {
        serde_json::to_writer(&mut out, &record).context("Failed to serialise log record")?;
        out.write_all(b"\n")
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    out.flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}
