//! CLI command implementations.
//!
//! Each function runs one `docqa` subcommand and prints its report to
//! stdout. Diagnostics go through `tracing` to stderr.

use anyhow::Result;
use std::path::Path;

use docqa_core::models::Answer;

use crate::config::Config;
use crate::error::{find_qa_error, QaError};
use crate::sources::SourceResolver;
use crate::state::AppContext;

/// Create the index database, its schema, and the document directory.
pub async fn run_init(config: Config) -> Result<()> {
    std::fs::create_dir_all(&config.paths.documents_dir)?;
    let ctx = AppContext::open(config, true).await?;
    let docs = ctx.indexer.documents().await?;
    println!("Index initialized at {}", ctx.config.paths.db.display());
    println!("  documents dir: {}", ctx.config.paths.documents_dir.display());
    println!("  documents indexed: {}", docs.len());
    Ok(())
}

pub async fn run_add(config: Config, path: &Path) -> Result<()> {
    let ctx = AppContext::open(config, true).await?;
    match ctx.indexer.add_document(path).await {
        Ok(report) => {
            println!("add {}", report.document_id);
            println!("  chunks: {}", report.chunks);
            println!("  extraction: {}", report.method);
            println!(
                "  source: {}",
                report.source_url.as_deref().unwrap_or("(none)")
            );
            println!("ok");
            Ok(())
        }
        Err(e) => match find_qa_error(&e) {
            Some(QaError::ExtractionFailure { document_id }) => {
                println!("add {}", document_id);
                println!("  skipped: no text could be extracted");
                Ok(())
            }
            _ => Err(e),
        },
    }
}

pub async fn run_delete(config: Config, document_id: &str) -> Result<()> {
    let ctx = AppContext::open(config, true).await?;
    match ctx.indexer.delete_document(document_id).await {
        Ok(report) => {
            println!("delete {}", report.document_id);
            println!("  chunks removed: {}", report.removed_chunks);
            println!("ok");
            Ok(())
        }
        Err(e) => match find_qa_error(&e) {
            Some(QaError::NotFound(id)) => {
                println!("delete {}", id);
                println!("  not found in index");
                Ok(())
            }
            _ => Err(e),
        },
    }
}

pub async fn run_rebuild(config: Config) -> Result<()> {
    let ctx = AppContext::open(config, true).await?;
    let report = ctx.indexer.rebuild_all().await?;
    println!("rebuild {}", ctx.config.paths.documents_dir.display());
    println!("  documents found: {}", report.documents_found);
    println!("  documents indexed: {}", report.documents_indexed);
    println!("  chunks written: {}", report.chunks);
    for failure in &report.failures {
        println!("  failed: {} ({})", failure.document_id, failure.error);
    }
    println!("ok");
    Ok(())
}

pub async fn run_docs(config: Config) -> Result<()> {
    let ctx = AppContext::open(config, true).await?;
    let docs = ctx.indexer.documents().await?;
    if docs.is_empty() {
        println!("No documents indexed.");
        return Ok(());
    }
    println!("{:<50} {:>8}", "DOCUMENT", "CHUNKS");
    for d in &docs {
        println!("{:<50} {:>8}", d.document_id, d.chunks);
    }
    Ok(())
}

pub async fn run_ask(config: Config, question: &str, k: Option<usize>, json: bool) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }
    if k == Some(0) {
        anyhow::bail!("--k must be >= 1");
    }
    let ctx = AppContext::open(config, false).await?;
    ctx.reload().await?;
    let answer = ctx.ask(question.trim(), k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print!("{}", format_answer(&answer));
    }
    Ok(())
}

/// Plain-text rendering of an answer and its numbered sources.
pub fn format_answer(answer: &Answer) -> String {
    let mut out = String::new();
    out.push_str(&answer.answer_text);
    out.push('\n');
    if !answer.citations.is_empty() {
        out.push_str("\nSources:\n");
        for c in &answer.citations {
            out.push_str(&format!(
                "[{}] {} (page {}) {}\n    {}\n",
                c.n, c.module, c.page, c.url, c.excerpt
            ));
        }
    }
    out
}

pub fn run_sources_list(config: &Config) -> Result<()> {
    let resolver = SourceResolver::new(&config.paths.sources);
    let entries = resolver.list();
    if entries.is_empty() {
        println!("No sources mapped ({}).", resolver.path().display());
        return Ok(());
    }
    for (filename, url) in &entries {
        println!("{:<50} {}", filename, url);
    }
    Ok(())
}

pub fn run_sources_set(config: &Config, filename: &str, url: &str) -> Result<()> {
    SourceResolver::new(&config.paths.sources).set(filename, url)?;
    println!("{} -> {}", filename, url.trim());
    println!("Re-add the document for the new source to appear in citations.");
    Ok(())
}

pub fn run_sources_remove(config: &Config, filename: &str) -> Result<()> {
    if SourceResolver::new(&config.paths.sources).remove(filename)? {
        println!("removed {}", filename);
    } else {
        println!("{} was not mapped", filename);
    }
    Ok(())
}
