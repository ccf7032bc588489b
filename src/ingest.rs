//! Index maintenance: add, delete and rebuild.
//!
//! The [`Indexer`] owns the write side of the index. Every mutation takes
//! its single-writer lock and, when configured, the cross-process
//! [`WriterLock`] next to the database file, so at most one add/delete/rebuild
//! runs against a persisted index at a time even with a CLI and a server
//! sharing it. The flow for one document is:
//!
//! PDF → [`Extractor`] (blocking thread) → paragraphs → source URL from
//! [`SourceResolver`] → chunks → embeddings → one store transaction that
//! replaces the document's previous chunk set.
//!
//! Embedding happens before the write transaction opens, so a failed
//! extraction or embedding leaves the previous chunk set untouched.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use docqa_core::embedding::EmbeddingProvider;
use docqa_core::models::{DocumentSummary, IndexMeta};
use docqa_core::paragraph::build_chunks;
use docqa_core::store::Store;

use crate::error::QaError;
use crate::extract::Extractor;
use crate::lock::WriterLock;
use crate::sources::SourceResolver;

/// Result of indexing one document.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AddReport {
    pub document_id: String,
    pub chunks: usize,
    pub method: String,
    pub source_url: Option<String>,
}

/// A document that could not be indexed during a rebuild.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RebuildFailure {
    pub document_id: String,
    pub error: String,
}

/// Result of a full rebuild.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub documents_found: usize,
    pub documents_indexed: usize,
    pub chunks: usize,
    pub removed_chunks: usize,
    pub failures: Vec<RebuildFailure>,
}

/// Result of deleting a document.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeleteReport {
    pub document_id: String,
    pub removed_chunks: usize,
}

pub struct Indexer {
    store: Arc<dyn Store>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<Extractor>,
    sources: SourceResolver,
    documents_dir: PathBuf,
    write_lock: Mutex<()>,
    lock_file: Option<PathBuf>,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<Extractor>,
        sources: SourceResolver,
        documents_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            embedder,
            extractor,
            sources,
            documents_dir,
            write_lock: Mutex::new(()),
            lock_file: None,
        }
    }

    /// Also hold an exclusive lock on `path` for every mutation.
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file = Some(path.into());
        self
    }

    async fn lock_writer(&self) -> Result<Option<WriterLock>> {
        match &self.lock_file {
            Some(path) => Ok(Some(WriterLock::acquire(path).await?)),
            None => Ok(None),
        }
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    /// Index (or re-index) the PDF at `path`. Its file name is the document id.
    ///
    /// Fails with [`QaError::ExtractionFailure`] when no paragraph survives
    /// extraction; any chunks from an earlier ingestion are kept.
    pub async fn add_document(&self, path: &Path) -> Result<AddReport> {
        let _guard = self.write_lock.lock().await;
        let _file_lock = self.lock_writer().await?;
        self.add_locked(path).await
    }

    /// Remove every chunk of `document_id`.
    ///
    /// Fails with [`QaError::NotFound`] when the document has no chunks.
    pub async fn delete_document(&self, document_id: &str) -> Result<DeleteReport> {
        let _guard = self.write_lock.lock().await;
        let _file_lock = self.lock_writer().await?;
        let removed = self.store.delete_document(document_id).await?;
        if removed == 0 {
            tracing::info!(document_id, "delete: document not found");
            return Err(QaError::NotFound(document_id.to_string()).into());
        }
        tracing::info!(document_id, removed, "deleted document");
        Ok(DeleteReport {
            document_id: document_id.to_string(),
            removed_chunks: removed,
        })
    }

    /// Clear the index and re-ingest every PDF in the document directory in
    /// filename order. Per-document failures are collected, not fatal.
    pub async fn rebuild_all(&self) -> Result<RebuildReport> {
        let _guard = self.write_lock.lock().await;
        let _file_lock = self.lock_writer().await?;

        // List first: a misconfigured directory must not wipe the index.
        let pdfs = list_pdfs(&self.documents_dir)?;
        let removed = self.store.clear().await?;
        self.store.set_meta(&self.current_meta()).await?;

        let mut report = RebuildReport {
            documents_found: pdfs.len(),
            removed_chunks: removed,
            ..RebuildReport::default()
        };

        for path in &pdfs {
            match self.add_locked(path).await {
                Ok(added) => {
                    report.documents_indexed += 1;
                    report.chunks += added.chunks;
                }
                Err(e) => {
                    let document_id = document_id_for(path).unwrap_or_default();
                    tracing::warn!(document_id = %document_id, error = %e, "skipping document");
                    report.failures.push(RebuildFailure {
                        document_id,
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        tracing::info!(
            found = report.documents_found,
            indexed = report.documents_indexed,
            chunks = report.chunks,
            failed = report.failures.len(),
            "rebuild complete"
        );
        Ok(report)
    }

    /// Indexed documents with chunk counts, sorted by id.
    pub async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        self.store.documents().await
    }

    fn current_meta(&self) -> IndexMeta {
        IndexMeta {
            model: self.embedder.model_name().to_string(),
            dims: self.embedder.dims(),
        }
    }

    async fn add_locked(&self, path: &Path) -> Result<AddReport> {
        let document_id = document_id_for(path)?;
        if !path.is_file() {
            anyhow::bail!("file not found: {}", path.display());
        }
        self.check_embedder_matches().await?;

        let extractor = self.extractor.clone();
        let owned_path = path.to_path_buf();
        let extraction = tokio::task::spawn_blocking(move || extractor.extract(&owned_path))
            .await
            .context("extraction task panicked")?;

        let method = match extraction.method {
            Some(m) if !extraction.paragraphs.is_empty() => m,
            _ => {
                tracing::warn!(document_id = %document_id, "no text extracted, skipping");
                return Err(QaError::extraction_failure(&document_id).into());
            }
        };

        let source_url = self.sources.resolve(&document_id);
        if source_url.is_none() {
            tracing::info!(document_id = %document_id, "no citation source mapped");
        }

        let chunks = build_chunks(&document_id, source_url.as_deref(), &extraction.paragraphs);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .with_context(|| format!("Failed to embed chunks of {}", document_id))?;
        if vectors.len() != chunks.len() {
            anyhow::bail!(
                "embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }

        self.store
            .replace_document(&document_id, &chunks, &vectors)
            .await?;
        self.store.set_meta(&self.current_meta()).await?;

        tracing::info!(
            document_id = %document_id,
            chunks = chunks.len(),
            method,
            "indexed document"
        );

        Ok(AddReport {
            document_id,
            chunks: chunks.len(),
            method: method.to_string(),
            source_url,
        })
    }

    /// Refuse to mix vectors from two embedding functions in one index.
    async fn check_embedder_matches(&self) -> Result<()> {
        let current = self.current_meta();
        if let Some(meta) = self.store.meta().await? {
            if meta != current && !self.store.documents().await?.is_empty() {
                return Err(QaError::index_unavailable(format!(
                    "index was built with '{}' ({} dims) but '{}' ({} dims) is configured; run rebuild",
                    meta.model, meta.dims, current.model, current.dims
                ))
                .into());
            }
        }
        Ok(())
    }
}

/// The document id of a PDF path: its file name.
pub fn document_id_for(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid document path: {}", path.display()))?;
    if !is_pdf(path) {
        return Err(QaError::NotAPdf(name.to_string()).into());
    }
    Ok(name.to_string())
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// PDFs directly inside `dir`, sorted by file name.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("document directory not found: {}", dir.display());
    }
    let mut pdfs: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_pdf(e.path()))
        .map(|e| e.into_path())
        .collect();
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pdfs)
}
