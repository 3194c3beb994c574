//! # Research Brief CLI (`brief`)
//!
//! ## Usage
//!
//! ```bash
//! brief [--config ./config/brief.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `brief run "<topic>"` | Produce one cited briefing (or an abstention) |
//! | `brief sources` | List local documents and their guardrail status |
//! | `brief eval` | Run a JSONL dataset of cases and write a report |
//! | `brief serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Offline briefing from data/raw/{pdfs,pages}
//! brief run "agentic AI in security operations"
//!
//! # Add two web pages to the local corpus for this run
//! brief run "agentic AI" --mode online --url https://a.example --url https://b.example
//!
//! # Machine-readable result (answer, retrieved chunks, citations, verdict)
//! brief run "agentic AI" --json
//!
//! # Regression check; exits 1 when any case fails
//! brief eval --dataset data/eval/dataset.jsonl
//! ```
//!
//! When `--config` is omitted, `./config/brief.toml` is used if present and
//! built-in defaults otherwise.

use anyhow::Result;
use clap::{Parser, Subcommand};
use research_brief::{config, engine, eval, logging, server, sources};
use research_brief_core::RunMode;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "./config/brief.toml";
const DEFAULT_DATASET_PATH: &str = "data/eval/dataset.jsonl";

/// Research Brief: evidence-grounded research briefings with citations.
#[derive(Parser)]
#[command(
    name = "brief",
    about = "Research Brief - evidence-grounded briefings from local documents and the web",
    version,
    long_about = "Research Brief collects local PDFs and pages (plus web pages in online mode), \
    screens them for prompt injection and PII, retrieves evidence with hybrid BM25 + dense search, \
    and writes a cited briefing, abstaining when the evidence is too thin."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/brief.toml` when it exists, built-in defaults
    /// otherwise. An explicitly given path must exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce a briefing for a topic.
    ///
    /// Prints the Markdown answer, or the abstention notice when the
    /// quality gate rejects the answer. The run trace is saved under
    /// `[runs].dir`.
    Run {
        /// The research topic; also the retrieval query.
        topic: String,

        /// `offline` (local documents only) or `online` (also fetch --url pages).
        #[arg(long, default_value = "offline")]
        mode: String,

        /// Page to fetch in online mode. Repeatable.
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Print the full run result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List local documents and their guardrail status.
    Sources,

    /// Run an evaluation dataset and write a JSON report.
    ///
    /// Exits with status 1 when any case fails.
    Eval {
        /// JSONL file, one case per line.
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        dataset: PathBuf,

        /// Report destination.
        #[arg(long, default_value = eval::DEFAULT_REPORT_PATH)]
        out: PathBuf,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn load_config(path: Option<&PathBuf>) -> Result<config::Config> {
    match path {
        Some(p) => config::load_config(p),
        None => config::load_or_default(&PathBuf::from(DEFAULT_CONFIG_PATH)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            topic,
            mode,
            urls,
            json,
        } => {
            let mode: RunMode = mode.parse()?;
            let result = tokio::task::spawn_blocking(move || -> Result<_> {
                let pipeline = engine::build_pipeline(&cfg)?;
                Ok(pipeline.run(&topic, mode, &urls)?)
            })
            .await??;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.answer);
                println!();
                println!("Trace: {}", result.trace_location);
            }
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Eval { dataset, out } => {
            let (report, path) = tokio::task::spawn_blocking(move || -> Result<_> {
                let cases = eval::load_cases(&dataset)?;
                let pipeline = engine::build_pipeline(&cfg)?;
                let report = eval::run_cases(&pipeline, &cases);
                let path = eval::write_report(&report, &out)?;
                Ok((report, path))
            })
            .await??;

            println!(
                "Eval done. Failed: {}/{}. Report: {}",
                report.failed,
                report.results.len(),
                path.display()
            );
            if report.failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
