//! Domain errors.
//!
//! Plumbing uses `anyhow` throughout; [`QaError`] names the failures callers
//! need to tell apart. Ingestion and query code return these wrapped in an
//! `anyhow::Error`, and the CLI and HTTP layers `downcast_ref` to choose
//! exit behaviour or status codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QaError {
    /// Neither embedded text nor OCR produced a usable paragraph.
    #[error("no text could be extracted from '{document_id}'")]
    ExtractionFailure { document_id: String },

    /// Delete of a document that has no chunks in the index.
    #[error("document not found in index: {0}")]
    NotFound(String),

    /// The persisted index is missing, unreadable or built with another embedder.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    /// Generator errored or returned an empty completion.
    #[error("generation failed: {0}")]
    GenerationFailure(String),

    /// Path is not a PDF file this tool can ingest.
    #[error("not a PDF document: {0}")]
    NotAPdf(String),
}

impl QaError {
    pub fn extraction_failure(document_id: impl Into<String>) -> Self {
        Self::ExtractionFailure {
            document_id: document_id.into(),
        }
    }

    pub fn index_unavailable(message: impl std::fmt::Display) -> Self {
        Self::IndexUnavailable(message.to_string())
    }
}

/// Find a [`QaError`] anywhere in an `anyhow` error chain.
pub fn find_qa_error(err: &anyhow::Error) -> Option<&QaError> {
    err.chain().find_map(|e| e.downcast_ref::<QaError>())
}
