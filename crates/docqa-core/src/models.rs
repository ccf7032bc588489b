//! Core data models shared by ingestion, retrieval, and answer rendering.

use serde::Serialize;

/// A paragraph of extracted document text with its 1-based page of origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParagraph {
    pub page_number: u32,
    pub text: String,
}

/// The unit of retrieval: one paragraph of a document plus its identity metadata.
///
/// Chunks are immutable once stored. They disappear only when their owning
/// document is deleted or superseded by a later ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Chunk UUID.
    pub id: String,
    /// Owning document (the PDF filename).
    pub document_id: String,
    /// Filename without extension, used for display.
    pub module_name: String,
    /// Citation URL for the owning document, if one is mapped.
    pub source_url: Option<String>,
    /// 1-based page of origin.
    pub page_number: u32,
    /// Position within the document, contiguous from 0.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// A stored chunk together with its embedding vector.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A chunk returned by the retriever, with its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Embedding function an index was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexMeta {
    pub model: String,
    pub dims: usize,
}

/// Number of chunks held for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub chunks: usize,
}

/// One numbered source reference in a rendered answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub n: usize,
    pub url: String,
    pub module: String,
    pub page: u32,
    pub excerpt: String,
}

/// The rendered result of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    /// Markdown answer with citation markers linked to their sources.
    pub answer_text: String,
    pub citations: Vec<Citation>,
}
