//! In-memory index snapshot and top-K retrieval.
//!
//! An [`IndexSnapshot`] is an immutable copy of the persisted index loaded
//! through a [`Store`]. Queries run against a snapshot; reloading builds a
//! new snapshot and swaps it in, so a query never observes a half-loaded
//! index.
//!
//! # Ranking
//!
//! 1. Embed the query with the same provider used at ingestion.
//! 2. Score every chunk by cosine similarity.
//! 3. Sort by score (desc); equal scores keep storage order
//!    (document id, chunk index), so results are deterministic.
//! 4. Truncate to `k`.

use anyhow::{bail, Result};

use crate::embedding::{cosine_similarity, embed_query, EmbeddingProvider};
use crate::models::{DocumentSummary, IndexMeta, IndexedChunk, RetrievedChunk};
use crate::store::Store;

/// Immutable, query-ready view of the index.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    meta: Option<IndexMeta>,
    chunks: Vec<IndexedChunk>,
}

impl IndexSnapshot {
    pub fn new(meta: Option<IndexMeta>, chunks: Vec<IndexedChunk>) -> Self {
        Self { meta, chunks }
    }

    /// Load every chunk from `store`, checking that the index was built with
    /// the same embedding function as `provider`.
    ///
    /// An empty index built by nobody yet loads fine under any provider.
    pub async fn load(store: &dyn Store, provider: &dyn EmbeddingProvider) -> Result<Self> {
        let meta = store.meta().await?;
        let chunks = store.load_all().await?;
        if let Some(m) = &meta {
            if !chunks.is_empty() && (m.model != provider.model_name() || m.dims != provider.dims())
            {
                bail!(
                    "index was built with embedding model '{}' ({} dims) but '{}' ({} dims) is configured; rebuild the index",
                    m.model,
                    m.dims,
                    provider.model_name(),
                    provider.dims()
                );
            }
        }
        Ok(Self::new(meta, chunks))
    }

    pub fn meta(&self) -> Option<&IndexMeta> {
        self.meta.as_ref()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Per-document chunk counts, sorted by document id.
    pub fn documents(&self) -> Vec<DocumentSummary> {
        let mut out: Vec<DocumentSummary> = Vec::new();
        for ic in &self.chunks {
            match out.last_mut() {
                Some(last) if last.document_id == ic.chunk.document_id => last.chunks += 1,
                _ => out.push(DocumentSummary {
                    document_id: ic.chunk.document_id.clone(),
                    chunks: 1,
                }),
            }
        }
        out.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        out
    }

    /// Rank all chunks against a pre-computed query vector.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Vec<RetrievedChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, ic)| (i, cosine_similarity(query_vec, &ic.vector)))
            .collect();
        // sort_by is stable: ties keep storage order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| RetrievedChunk {
                chunk: self.chunks[i].chunk.clone(),
                score,
            })
            .collect()
    }
}

/// Return up to `k` chunks most similar to `query`.
pub async fn retrieve(
    index: &IndexSnapshot,
    provider: &dyn EmbeddingProvider,
    query: &str,
    k: usize,
) -> Result<Vec<RetrievedChunk>> {
    if query.trim().is_empty() || index.is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    let query_vec = embed_query(provider, query).await?;
    Ok(index.search(&query_vec, k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::models::Chunk;
    use crate::store::memory::InMemoryStore;

    fn indexed(doc: &str, index: i64, text: &str, embedder: &HashingEmbedder) -> IndexedChunk {
        IndexedChunk {
            chunk: Chunk {
                id: format!("{}#{}", doc, index),
                document_id: doc.to_string(),
                module_name: doc.to_string(),
                source_url: None,
                page_number: 1,
                chunk_index: index,
                text: text.to_string(),
                hash: String::new(),
            },
            vector: embedder.embed_one(text),
        }
    }

    #[tokio::test]
    async fn test_retrieve_ranks_by_similarity() {
        let e = HashingEmbedder::new(256);
        let snap = IndexSnapshot::new(
            None,
            vec![
                indexed("a.pdf", 0, "Library opening hours and printing credits", &e),
                indexed("b.pdf", 0, "Thesis submission deadlines and examination", &e),
            ],
        );
        let hits = retrieve(&snap, &e, "when is thesis submission", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.document_id, "b.pdf");
    }

    #[tokio::test]
    async fn test_retrieve_on_empty_index_is_empty() {
        let e = HashingEmbedder::new(16);
        let snap = IndexSnapshot::default();
        assert!(retrieve(&snap, &e, "anything", 4).await.unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_storage_order() {
        let e = HashingEmbedder::new(32);
        let snap = IndexSnapshot::new(
            None,
            vec![
                indexed("a.pdf", 0, "same words here", &e),
                indexed("a.pdf", 1, "same words here", &e),
                indexed("b.pdf", 0, "same words here", &e),
            ],
        );
        let q = e.embed_one("same words here");
        let ids: Vec<String> = snap.search(&q, 3).into_iter().map(|r| r.chunk.id).collect();
        assert_eq!(ids, vec!["a.pdf#0", "a.pdf#1", "b.pdf#0"]);
    }

    #[test]
    fn test_documents_counts() {
        let e = HashingEmbedder::new(8);
        let snap = IndexSnapshot::new(
            None,
            vec![
                indexed("a.pdf", 0, "x", &e),
                indexed("a.pdf", 1, "y", &e),
                indexed("b.pdf", 0, "z", &e),
            ],
        );
        let docs = snap.documents();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].chunks, 2);
        assert_eq!(docs[1].chunks, 1);
    }

    #[tokio::test]
    async fn test_load_rejects_other_embedding_model() {
        let store = InMemoryStore::new();
        let built_with = HashingEmbedder::new(8);
        let ic = indexed("a.pdf", 0, "some text", &built_with);
        store
            .replace_document("a.pdf", &[ic.chunk.clone()], &[ic.vector.clone()])
            .await
            .unwrap();
        store
            .set_meta(&IndexMeta {
                model: built_with.model_name().to_string(),
                dims: 8,
            })
            .await
            .unwrap();

        assert!(IndexSnapshot::load(&store, &built_with).await.is_ok());
        let other = HashingEmbedder::new(16);
        let err = IndexSnapshot::load(&store, &other).await.unwrap_err();
        assert!(err.to_string().contains("rebuild"));
    }
}
