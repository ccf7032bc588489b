//! Persisted index abstraction.
//!
//! The [`Store`] trait defines the durable operations behind the vector
//! index: replace a document's chunk set, delete a document, clear the
//! index, and load everything back for an in-memory snapshot. Each mutating
//! call must be durable and atomic on return: a document's chunks are either
//! all present from its latest ingestion or entirely absent.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, DocumentSummary, IndexMeta, IndexedChunk};

/// Abstract storage backend for the chunk index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`replace_document`](Store::replace_document) | Atomically supersede a document's chunks and vectors |
/// | [`delete_document`](Store::delete_document) | Remove every chunk of a document |
/// | [`clear`](Store::clear) | Remove every chunk in the index |
/// | [`documents`](Store::documents) | Per-document chunk counts |
/// | [`load_all`](Store::load_all) | All chunks with vectors, in storage order |
/// | [`meta`](Store::meta) / [`set_meta`](Store::set_meta) | Embedding function the index was built with |
#[async_trait]
pub trait Store: Send + Sync {
    /// Replace all chunks for `document_id` with `chunks` and their `vectors`.
    ///
    /// Old chunks are removed in the same transaction, so a document never
    /// has two chunk sets at once. `vectors[i]` belongs to `chunks[i]`.
    async fn replace_document(
        &self,
        document_id: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()>;

    /// Delete every chunk of `document_id`. Returns how many were removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// Delete every chunk in the index. Returns how many were removed.
    async fn clear(&self) -> Result<usize>;

    /// Documents currently indexed, sorted by id, with chunk counts.
    async fn documents(&self) -> Result<Vec<DocumentSummary>>;

    /// Every stored chunk with its vector, ordered by document id then chunk index.
    async fn load_all(&self) -> Result<Vec<IndexedChunk>>;

    /// Embedding model the index was built with, if any chunk was ever stored.
    async fn meta(&self) -> Result<Option<IndexMeta>>;

    /// Record the embedding model the index is built with.
    async fn set_meta(&self, meta: &IndexMeta) -> Result<()>;
}
