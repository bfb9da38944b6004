//! # jobforge CLI (`jf`)
//!
//! The `jf` binary is the primary interface for jobforge. It provides
//! commands for store initialization, document ingestion, retrieval
//! inspection, and drafting application materials from a job posting.
//!
//! ## Usage
//!
//! ```bash
//! jf --config ./jobforge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `jf init` | Create the vector store |
//! | `jf ingest <path>` | Ingest a file or every supported file in a directory |
//! | `jf search "<query>"` | Show the top-k chunks for a query |
//! | `jf apply` | Draft application materials from a job post (stdin or `--file`) |
//! | `jf reset --yes` | Delete every stored chunk |

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jobforge::models::ApplicationDraft;
use jobforge::ollama::OllamaClient;
use jobforge::store::{InitOutcome, Store};
use jobforge::{config, generate, ingest, search};

/// jobforge — draft tailored job applications from your own documents,
/// entirely locally.
#[derive(Parser)]
#[command(
    name = "jf",
    about = "jobforge — a local-first RAG pipeline for tailored job applications",
    version,
    long_about = "jobforge ingests your past applications, CVs, and notes into a local \
    vector store and drafts a cover letter, CV bullets, and an ATS keyword report \
    for a pasted job posting, using a local Ollama model. Nothing leaves your machine."
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file = built-in defaults.
    #[arg(long, global = true, default_value = "./jobforge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the vector store.
    ///
    /// Creates the SQLite database file and schema. Idempotent — running
    /// it multiple times is safe. If the existing store is corrupt it is
    /// discarded and recreated once (disable with `store.auto_recover = false`).
    Init,

    /// Ingest a file, or every supported file under a directory.
    ///
    /// Supported formats: md, markdown, txt, csv, pdf, docx, xlsx.
    /// Markdown front-matter becomes chunk metadata. Failed files are
    /// skipped with a warning; the rest of the batch continues.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,
    },

    /// Show the most relevant stored chunks for a query.
    Search {
        /// The search query string.
        query: String,

        /// Number of results (defaults to retrieval.top_k from config).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Draft application materials from a job posting.
    ///
    /// Reads the job post from --file, or from stdin when no file is
    /// given. Prints the draft as JSON: either the three-key schema
    /// (cover_letter_markdown, cv_bullets, ats_report) or {"raw": ...}
    /// when the model's output could not be coerced into it.
    Apply {
        /// Read the job post from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Delete every stored chunk. Destructive.
    Reset {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let (store, outcome) = Store::open(&cfg.store).await?;
            match outcome {
                InitOutcome::Opened => {
                    println!("Store ready at {} ({} chunks).", store.path().display(), store.count().await?);
                }
                InitOutcome::Recovered { reason } => {
                    println!(
                        "Store was corrupt and has been recreated empty at {} (reason: {}).",
                        store.path().display(),
                        reason
                    );
                }
            }
            store.close().await;
        }
        Commands::Ingest { path } => {
            let (store, _) = Store::open(&cfg.store).await?;
            let client = OllamaClient::new(&cfg.ollama)?;
            let summary = ingest::ingest_path(&store, &client, &cfg.chunking, &path).await?;
            println!("ingest {}", path.display());
            println!("  files ingested: {}", summary.files);
            println!("  files skipped: {}", summary.skipped);
            println!("  chunks written: {}", summary.chunks);
            println!("ok");
            store.close().await;
        }
        Commands::Search { query, k } => {
            let (store, _) = Store::open(&cfg.store).await?;
            let client = OllamaClient::new(&cfg.ollama)?;
            let k = k.unwrap_or(cfg.retrieval.top_k);
            let results = search::search(&store, &client, &query, k).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, result) in results.iter().enumerate() {
                let source = result
                    .metadata
                    .get("filename")
                    .and_then(|v| v.as_str())
                    .unwrap_or("(unknown)");
                println!("{}. [{:.4}] {} / {}", i + 1, result.distance, source, result.id);
                println!("    excerpt: \"{}\"", excerpt(&result.text));
                println!();
            }
            store.close().await;
        }
        Commands::Apply { file } => {
            let job_post = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read job post: {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read job post from stdin")?;
                    buf
                }
            };
            if job_post.trim().is_empty() {
                bail!("Job post is empty. Paste it on stdin or pass --file.");
            }

            let (store, _) = Store::open(&cfg.store).await?;
            let client = OllamaClient::new(&cfg.ollama)?;
            let draft =
                generate::generate(&store, &client, &client, &job_post, cfg.retrieval.top_k)
                    .await?;
            if let ApplicationDraft::Raw { .. } = draft {
                tracing::warn!("model output was not valid draft JSON; returning raw text");
            }
            println!("{}", serde_json::to_string_pretty(&draft)?);
            store.close().await;
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("Refusing to delete all chunks without --yes.");
            }
            let (store, _) = Store::open(&cfg.store).await?;
            let before = store.count().await?;
            store.reset().await?;
            println!("Deleted {} chunks from {}.", before, store.path().display());
            store.close().await;
        }
    }

    Ok(())
}

/// First line of a chunk, bounded, for search output.
fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    let cut: String = trimmed.chars().take(160).collect();
    if cut.len() < trimmed.len() {
        format!("{cut}…")
    } else {
        cut
    }
}
