//! # docqa CLI
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the index database and document directory |
//! | `docqa add <path>` | Index (or re-index) one PDF |
//! | `docqa delete <id>` | Remove a document's chunks from the index |
//! | `docqa rebuild` | Clear the index and re-ingest every PDF in the document directory |
//! | `docqa docs` | List indexed documents |
//! | `docqa ask "<question>"` | Answer a question with numbered citations |
//! | `docqa sources list\|set\|remove` | Maintain the filename → URL mapping |
//! | `docqa serve` | Start the HTTP API |
//!
//! Logging goes to stderr; set `RUST_LOG` (default `docqa=info`) to adjust.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docqa::commands;
use docqa::config;
use docqa::server;
use docqa::state::AppContext;

/// docqa: question answering over a PDF collection with linked citations.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Every setting has a default, but the file must exist.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Question answering over a PDF collection with numbered, linked citations",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index database and the document directory.
    ///
    /// Idempotent: running it again leaves an existing index untouched.
    Init,

    /// Index a PDF. Re-adding a file replaces its previous chunks.
    ///
    /// The file name is the document id; the file is not copied.
    Add {
        /// Path to the PDF.
        path: PathBuf,
    },

    /// Remove every chunk of a document from the index.
    Delete {
        /// Document id (the PDF's file name).
        document_id: String,
    },

    /// Clear the index and re-ingest every PDF in the document directory.
    Rebuild,

    /// List indexed documents with chunk counts.
    Docs,

    /// Answer a question from the indexed documents.
    Ask {
        /// The question.
        question: String,

        /// Number of chunks to retrieve (default from config).
        #[arg(long)]
        k: Option<usize>,

        /// Print the answer and citations as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Maintain the filename → citation URL mapping.
    Sources {
        #[command(subcommand)]
        action: SourcesAction,
    },

    /// Start the HTTP API server.
    Serve,
}

#[derive(Subcommand)]
enum SourcesAction {
    /// List all mapped files and URLs.
    List,
    /// Map a file name to an http(s) URL.
    Set { filename: String, url: String },
    /// Remove a file's mapping.
    Remove { filename: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => commands::run_init(cfg).await?,
        Commands::Add { path } => commands::run_add(cfg, &path).await?,
        Commands::Delete { document_id } => commands::run_delete(cfg, &document_id).await?,
        Commands::Rebuild => commands::run_rebuild(cfg).await?,
        Commands::Docs => commands::run_docs(cfg).await?,
        Commands::Ask { question, k, json } => commands::run_ask(cfg, &question, k, json).await?,
        Commands::Sources { action } => match action {
            SourcesAction::List => commands::run_sources_list(&cfg)?,
            SourcesAction::Set { filename, url } => {
                commands::run_sources_set(&cfg, &filename, &url)?
            }
            SourcesAction::Remove { filename } => commands::run_sources_remove(&cfg, &filename)?,
        },
        Commands::Serve => {
            let ctx = AppContext::open(cfg, true).await?;
            server::run_server(ctx).await?;
        }
    }

    Ok(())
}
