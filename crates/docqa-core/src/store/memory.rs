//! In-memory [`Store`] implementation for testing.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety. Nothing is
//! persisted; dropping the store drops the index.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{Chunk, DocumentSummary, IndexMeta, IndexedChunk};

use super::Store;

/// In-memory store for tests.
pub struct InMemoryStore {
    chunks: RwLock<Vec<IndexedChunk>>,
    meta: RwLock<Option<IndexMeta>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
            meta: RwLock::new(None),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_poisoned() -> anyhow::Error {
    anyhow::anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Store for InMemoryStore {
    async fn replace_document(
        &self,
        document_id: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch for {}: {} chunks, {} vectors",
                document_id,
                chunks.len(),
                vectors.len()
            );
        }
        let mut stored = self.chunks.write().map_err(|_| lock_poisoned())?;
        stored.retain(|ic| ic.chunk.document_id != document_id);
        for (c, v) in chunks.iter().zip(vectors.iter()) {
            stored.push(IndexedChunk {
                chunk: c.clone(),
                vector: v.clone(),
            });
        }
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut stored = self.chunks.write().map_err(|_| lock_poisoned())?;
        let before = stored.len();
        stored.retain(|ic| ic.chunk.document_id != document_id);
        Ok(before - stored.len())
    }

    async fn clear(&self) -> Result<usize> {
        let mut stored = self.chunks.write().map_err(|_| lock_poisoned())?;
        let removed = stored.len();
        stored.clear();
        Ok(removed)
    }

    async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        let stored = self.chunks.read().map_err(|_| lock_poisoned())?;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for ic in stored.iter() {
            *counts.entry(ic.chunk.document_id.as_str()).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(id, chunks)| DocumentSummary {
                document_id: id.to_string(),
                chunks,
            })
            .collect())
    }

    async fn load_all(&self) -> Result<Vec<IndexedChunk>> {
        let stored = self.chunks.read().map_err(|_| lock_poisoned())?;
        let mut all = stored.clone();
        all.sort_by(|a, b| {
            a.chunk
                .document_id
                .cmp(&b.chunk.document_id)
                .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        Ok(all)
    }

    async fn meta(&self) -> Result<Option<IndexMeta>> {
        Ok(self.meta.read().map_err(|_| lock_poisoned())?.clone())
    }

    async fn set_meta(&self, meta: &IndexMeta) -> Result<()> {
        *self.meta.write().map_err(|_| lock_poisoned())? = Some(meta.clone());
        Ok(())
    }
}
