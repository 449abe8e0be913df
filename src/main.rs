//! # mathrag CLI
//!
//! The `mathrag` binary serves the answering API and provides commands for
//! seeding the knowledge base, one-shot questions, and feedback inspection.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mathrag serve` | Start the HTTP server |
//! | `mathrag ask "<question>"` | Answer one question and print the JSON envelope |
//! | `mathrag kb init` | Recreate the knowledge base collection |
//! | `mathrag kb ingest <file>` | Load solved problems from JSON / JSONL |
//! | `mathrag kb query "<question>"` | Show nearest neighbours and the hit/miss decision |
//! | `mathrag feedback record` | Append a correctness judgment |
//! | `mathrag feedback stats` | Summarize the feedback log |
//!
//! Credentials are read from `OPENAI_API_KEY` and `TAVILY_API_KEY`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mathrag::app::App;
use mathrag::config::{self, Config};
use mathrag::feedback::{FeedbackRecorder, ACK_MESSAGE};
use mathrag::ingest::{self, IngestOptions};
use mathrag::{query, server};

/// Math question answering over a curated knowledge base, with web
/// fallback and content guardrails.
#[derive(Parser)]
#[command(name = "mathrag", version)]
struct Cli {
    /// Path to configuration file (TOML). Defaults are used if it is missing.
    #[arg(long, global = true, default_value = "./config/mathrag.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Answer a single question and print the response envelope.
    Ask {
        question: String,
    },

    /// Manage the knowledge base collection.
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Record or inspect answer feedback.
    Feedback {
        #[command(subcommand)]
        action: FeedbackAction,
    },
}

#[derive(Subcommand)]
enum KbAction {
    /// Drop and recreate the collection with the configured dimensions.
    Init,

    /// Embed and upsert solved problems from a JSON array or JSON Lines file.
    ///
    /// Each record needs `question` and `solution` (or `answer`); `id` is optional.
    Ingest {
        path: PathBuf,

        /// Recreate the collection before loading.
        #[arg(long)]
        recreate: bool,

        /// Override the batch size from config (number of texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Parse the file and report the record count without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the nearest neighbours for a question.
    Query {
        question: String,

        /// Override `[retrieval].threshold` for this lookup.
        #[arg(long)]
        threshold: Option<f32>,
    },
}

#[derive(Subcommand)]
enum FeedbackAction {
    /// Append a judgment to the feedback log.
    Record {
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
        #[arg(long, action = clap::ArgAction::Set)]
        correct: bool,
    },
    /// Print totals of correct and incorrect judgments.
    Stats,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "mathrag=debug,tower_http=debug"
    } else {
        "mathrag=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

fn load(path: &std::path::Path) -> Result<Config> {
    let mut cfg = config::load_config_or_default(path)?;
    cfg.apply_env()?;
    config::validate(&cfg)?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let app = App::from_config(&cfg)?;
            server::run_server(&app).await?;
        }
        Commands::Ask { question } => {
            let app = App::from_config(&cfg)?;
            query::run_ask(&app, &question).await?;
        }
        Commands::Kb { action } => {
            let app = App::from_config(&cfg)?;
            match action {
                KbAction::Init => ingest::run_init(&app).await?,
                KbAction::Ingest {
                    path,
                    recreate,
                    batch_size,
                    dry_run,
                } => {
                    let options = IngestOptions {
                        recreate,
                        batch_size,
                        dry_run,
                    };
                    ingest::run_ingest(&app, &path, &options).await?;
                }
                KbAction::Query {
                    question,
                    threshold,
                } => {
                    query::run_kb_query(&app, &question, threshold).await?;
                }
            }
        }
        Commands::Feedback { action } => {
            // Feedback never touches the external clients.
            let recorder = FeedbackRecorder::new(cfg.feedback.path.clone());
            match action {
                FeedbackAction::Record {
                    question,
                    answer,
                    correct,
                } => {
                    recorder.record(&question, &answer, correct).await?;
                    println!("{}", ACK_MESSAGE);
                }
                FeedbackAction::Stats => {
                    let stats = recorder.stats().await?;
                    println!("feedback {}", recorder.path().display());
                    println!("  total: {}", stats.total);
                    println!("  correct: {}", stats.correct);
                    println!("  incorrect: {}", stats.incorrect);
                }
            }
        }
    }

    Ok(())
}
