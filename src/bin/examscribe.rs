//! CLI binary for examscribe.
//!
//! A thin shim over the library crate that maps CLI flags to the stage
//! entry points and renders progress.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use examscribe::pipeline::ProgressHook;
use examscribe::{
    run_classification, run_extraction, FileStore, LabelField, OpenAiClient, PipelineConfig,
    QuestionDb, RunReport, Section, Taxonomy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
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

// ── CLI progress hook using indicatif ────────────────────────────────────────

/// Terminal progress hook: one bar anchored at the bottom, per-unit log
/// lines above it. Units complete out of order across workers; the bar
/// only ever counts, so ordering does not matter.
struct CliHook {
    bar: ProgressBar,
}

impl CliHook {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>4}/{len}  ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Processing");
        Arc::new(Self { bar })
    }
}

impl ProgressHook for CliHook {
    fn on_run_start(&self, total_units: usize) {
        self.bar.set_length(total_units as u64);
        self.bar.reset_eta();
    }

    fn on_unit_start(&self, key: &str) {
        self.bar.set_message(key.to_string());
    }

    fn on_unit_committed(&self, key: &str) {
        self.bar.println(format!("  {} {key}", green("✓")));
        self.bar.inc(1);
    }

    fn on_unit_failed(&self, key: &str, detail: &str) {
        self.bar
            .println(format!("  {} {key}  {}", red("✗"), dim(detail)));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_units: usize, committed: usize) {
        self.bar.finish_and_clear();
        let failed = total_units - committed;
        eprintln!(
            "{} {} of {} committed{}",
            if failed == 0 { green("✓") } else { red("✗") },
            bold(&committed.to_string()),
            total_units,
            if failed == 0 {
                String::new()
            } else {
                format!(", {} pending", red(&failed.to_string()))
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract questions from every page image under pages/
  examscribe extract --root pages --results results.json

  # One year only, with a specific model
  examscribe extract --root pages --year 2019 --model google/gemini-2.0-flash-001

  # Load extraction results into the question database
  examscribe import --results results.json --db questions.db

  # Classify subjects, then topics
  examscribe classify-subject --db questions.db
  examscribe classify-topic --db questions.db

  # How far along is the database?
  examscribe stats --db questions.db

LAYOUT EXPECTED UNDER --root:
  pages/
   ├─ 2019/
   │   ├─ 2019_EE_01.png
   │   └─ 2019_EE_02.png
   └─ 2020/
       └─ 2020_EE_01.png

All commands are safe to interrupt and re-run: completed pages and rows are
skipped, flagged records are reprocessed first.

ENVIRONMENT VARIABLES:
  OPENROUTER_API_KEY   API key for the model endpoint (any OpenAI-compatible
                       endpoint works; override the URL with --api-base)
"#;

/// Extract and classify exam questions from scanned papers.
#[derive(Parser, Debug)]
#[command(
    name = "examscribe",
    version,
    about = "Extract and classify exam questions from scanned papers using vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "EXAMSCRIBE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "EXAMSCRIBE_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "EXAMSCRIBE_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::Args, Debug)]
struct ModelArgs {
    /// Model ID on the configured endpoint.
    #[arg(long, env = "EXAMSCRIBE_MODEL", default_value = "google/gemini-2.0-flash-001")]
    model: String,

    /// Base URL of an OpenAI-compatible chat-completions endpoint.
    #[arg(long, env = "EXAMSCRIBE_API_BASE", default_value = "https://openrouter.ai/api/v1")]
    api_base: String,

    /// API key; read from OPENROUTER_API_KEY when not given.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

impl ModelArgs {
    fn client(&self) -> Result<Arc<OpenAiClient>> {
        let Some(key) = &self.api_key else {
            bail!("no API key: pass --api-key or set OPENROUTER_API_KEY");
        };
        Ok(Arc::new(OpenAiClient::new(&self.api_base, key, &self.model)))
    }
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Number of concurrent workers.
    #[arg(short, long, env = "EXAMSCRIBE_WORKERS", default_value_t = 10)]
    workers: usize,

    /// Delay between failed attempts, in milliseconds.
    #[arg(long, env = "EXAMSCRIBE_BACKOFF_MS", default_value_t = 2_000)]
    backoff_ms: u64,

    /// Per-model-call timeout in seconds.
    #[arg(long, env = "EXAMSCRIBE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

impl RunArgs {
    fn config(&self) -> Result<PipelineConfig> {
        PipelineConfig::builder()
            .workers(self.workers)
            .backoff_ms(self.backoff_ms)
            .api_timeout_secs(self.api_timeout)
            .build()
            .context("invalid pipeline configuration")
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract questions from page images into the results file.
    Extract {
        /// Root directory holding per-year page-image folders.
        #[arg(long, env = "EXAMSCRIBE_ROOT", default_value = "pages")]
        root: PathBuf,

        /// Restrict the run to one year directory.
        #[arg(long)]
        year: Option<String>,

        /// Path of the JSON results file.
        #[arg(long, env = "EXAMSCRIBE_RESULTS", default_value = "results.json")]
        results: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Load extraction results into the question database.
    Import {
        /// Path of the JSON results file.
        #[arg(long, env = "EXAMSCRIBE_RESULTS", default_value = "results.json")]
        results: PathBuf,

        /// Path of the SQLite question database.
        #[arg(long, env = "EXAMSCRIBE_DB", default_value = "questions.db")]
        db: PathBuf,

        /// Section to record for imported rows: EE or GA.
        #[arg(long, default_value = "EE")]
        section: Section,
    },

    /// Assign a subject to every unclassified question row.
    ClassifySubject {
        /// Path of the SQLite question database.
        #[arg(long, env = "EXAMSCRIBE_DB", default_value = "questions.db")]
        db: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Assign a topic to every subject-classified question row.
    ClassifyTopic {
        /// Path of the SQLite question database.
        #[arg(long, env = "EXAMSCRIBE_DB", default_value = "questions.db")]
        db: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Print classification progress for the question database.
    Stats {
        /// Path of the SQLite question database.
        #[arg(long, env = "EXAMSCRIBE_DB", default_value = "questions.db")]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Suppress INFO-level library logs while the progress bar is active;
    // the bar carries the per-unit feedback.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let hook: Arc<dyn ProgressHook> = if show_progress {
        CliHook::new()
    } else {
        Arc::new(examscribe::pipeline::NoopHook)
    };

    match cli.command {
        Command::Extract {
            root,
            year,
            results,
            model,
            run,
        } => {
            let client = model.client()?;
            let config = run.config()?;
            let store = Arc::new(
                FileStore::open(&results)
                    .await
                    .with_context(|| format!("opening results file {}", results.display()))?,
            );
            let report =
                run_extraction(client, store, &root, year.as_deref(), &config, hook).await?;
            summarize(&report, cli.quiet);
        }

        Command::Import {
            results,
            db,
            section,
        } => {
            let store = FileStore::open(&results)
                .await
                .with_context(|| format!("opening results file {}", results.display()))?;
            let db = QuestionDb::open(&db)?;
            let inserted = db.import_results(&store.snapshot().await, section)?;
            if !cli.quiet {
                eprintln!("{} {} new rows imported", green("✓"), bold(&inserted.to_string()));
            }
        }

        Command::ClassifySubject { db, model, run } => {
            let report = classify(db, model, run, LabelField::Subject, hook).await?;
            summarize(&report, cli.quiet);
        }

        Command::ClassifyTopic { db, model, run } => {
            let report = classify(db, model, run, LabelField::Topic, hook).await?;
            summarize(&report, cli.quiet);
        }

        Command::Stats { db } => {
            let db = QuestionDb::open(&db)?;
            let stats = db.stats()?;
            println!("questions:        {}", stats.total);
            println!(
                "with subject:     {}  ({} pending)",
                stats.with_subject,
                stats.pending(LabelField::Subject)
            );
            println!(
                "with topic:       {}  ({} pending)",
                stats.with_topic,
                stats.pending(LabelField::Topic)
            );
        }
    }

    Ok(())
}

async fn classify(
    db: PathBuf,
    model: ModelArgs,
    run: RunArgs,
    field: LabelField,
    hook: Arc<dyn ProgressHook>,
) -> Result<RunReport> {
    let client = model.client()?;
    let config = run.config()?;
    let db = Arc::new(QuestionDb::open(&db)?);
    let taxonomy = Arc::new(Taxonomy::gate());
    let report = run_classification(client, db, taxonomy, field, &config, hook).await?;
    Ok(report)
}

fn summarize(report: &RunReport, quiet: bool) {
    if quiet {
        return;
    }
    eprintln!(
        "{} committed, {} salvaged, {} failed (of {})",
        report.tally.committed, report.tally.salvaged, report.tally.failed, report.total
    );
}
