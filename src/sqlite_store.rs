//! SQLite-backed [`Store`] implementation.
//!
//! Chunks and their vectors live in two tables (`chunks`, `chunk_vectors`)
//! written together in one transaction per mutation, so a document's chunk
//! set is always either the complete latest one or absent.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use docqa_core::embedding::{blob_to_vec, vec_to_blob};
use docqa_core::models::{Chunk, DocumentSummary, IndexMeta, IndexedChunk};
use docqa_core::store::Store;

use crate::db;
use crate::migrate;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the index at `db_path` and bring its schema up to date.
    ///
    /// See [`db::connect`] for the meaning of `create`.
    pub async fn open(db_path: &Path, create: bool) -> Result<Self> {
        let pool = db::connect(db_path, create).await?;
        migrate::run_migrations(&pool)
            .await
            .with_context(|| format!("Failed to migrate index at {}", db_path.display()))?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Store for SqliteStore {
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

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, module_name, source_url, page_number,
                                    chunk_index, text, hash, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(document_id)
            .bind(&chunk.module_name)
            .bind(&chunk.source_url)
            .bind(chunk.page_number as i64)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO chunk_vectors (chunk_id, document_id, embedding) VALUES (?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(document_id)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn clear(&self) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunk_vectors")
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM chunks")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        let rows = sqlx::query(
            "SELECT document_id, COUNT(*) AS n FROM chunks GROUP BY document_id ORDER BY document_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DocumentSummary {
                document_id: row.get("document_id"),
                chunks: row.get::<i64, _>("n") as usize,
            })
            .collect())
    }

    async fn load_all(&self) -> Result<Vec<IndexedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, c.module_name, c.source_url, c.page_number,
                   c.chunk_index, c.text, c.hash, cv.embedding
            FROM chunks c
            JOIN chunk_vectors cv ON cv.chunk_id = c.id
            ORDER BY c.document_id, c.chunk_index
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                IndexedChunk {
                    chunk: Chunk {
                        id: row.get("id"),
                        document_id: row.get("document_id"),
                        module_name: row.get("module_name"),
                        source_url: row.get("source_url"),
                        page_number: row.get::<i64, _>("page_number") as u32,
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                        hash: row.get("hash"),
                    },
                    vector: blob_to_vec(&blob),
                }
            })
            .collect())
    }

    async fn meta(&self) -> Result<Option<IndexMeta>> {
        let row = sqlx::query("SELECT model, dims FROM index_meta WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| IndexMeta {
            model: r.get("model"),
            dims: r.get::<i64, _>("dims") as usize,
        }))
    }

    async fn set_meta(&self, meta: &IndexMeta) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO index_meta (id, model, dims, updated_at) VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&meta.model)
        .bind(meta.dims as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{find_qa_error, QaError};
    use tempfile::TempDir;

    fn chunk(doc: &str, index: i64, url: Option<&str>) -> Chunk {
        Chunk {
            id: format!("{}-{}", doc, index),
            document_id: doc.to_string(),
            module_name: doc.trim_end_matches(".pdf").to_string(),
            source_url: url.map(str::to_string),
            page_number: (index + 1) as u32,
            chunk_index: index,
            text: format!("paragraph {} of {}", index, doc),
            hash: "h".to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_without_create_reports_unavailable() {
        let tmp = TempDir::new().unwrap();
        let err = SqliteStore::open(&tmp.path().join("missing.sqlite"), false)
            .await
            .err()
            .unwrap();
        assert!(matches!(find_qa_error(&err), Some(QaError::IndexUnavailable(_))));
    }

    #[tokio::test]
    async fn test_replace_and_reload_persists_provenance() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        {
            let store = SqliteStore::open(&path, true).await.unwrap();
            store
                .replace_document(
                    "guide.pdf",
                    &[chunk("guide.pdf", 0, Some("https://g.example")), chunk("guide.pdf", 1, None)],
                    &[vec![1.0, 0.0], vec![0.0, 1.0]],
                )
                .await
                .unwrap();
            store
                .set_meta(&IndexMeta {
                    model: "hash-v1-2".into(),
                    dims: 2,
                })
                .await
                .unwrap();
            store.close().await;
        }

        let store = SqliteStore::open(&path, false).await.unwrap();
        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].chunk.source_url.as_deref(), Some("https://g.example"));
        assert_eq!(all[0].chunk.module_name, "guide");
        assert_eq!(all[1].chunk.page_number, 2);
        assert_eq!(all[1].vector, vec![0.0, 1.0]);
        assert_eq!(store.meta().await.unwrap().unwrap().model, "hash-v1-2");
    }

    #[tokio::test]
    async fn test_replace_supersedes_and_delete_removes() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("i.sqlite"), true)
            .await
            .unwrap();
        store
            .replace_document("a.pdf", &[chunk("a.pdf", 0, None), chunk("a.pdf", 1, None)], &[vec![1.0], vec![1.0]])
            .await
            .unwrap();
        store
            .replace_document("a.pdf", &[chunk("a.pdf", 0, None)], &[vec![1.0]])
            .await
            .unwrap();
        store
            .replace_document("b.pdf", &[chunk("b.pdf", 0, None)], &[vec![1.0]])
            .await
            .unwrap();

        let docs = store.documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].document_id, "a.pdf");
        assert_eq!(docs[0].chunks, 1);

        assert_eq!(store.delete_document("a.pdf").await.unwrap(), 1);
        assert_eq!(store.delete_document("a.pdf").await.unwrap(), 0);
        assert_eq!(store.clear().await.unwrap(), 1);
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_mismatch_leaves_old_chunks() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("i.sqlite"), true)
            .await
            .unwrap();
        store
            .replace_document("a.pdf", &[chunk("a.pdf", 0, None)], &[vec![1.0]])
            .await
            .unwrap();
        assert!(store
            .replace_document("a.pdf", &[chunk("a.pdf", 0, None)], &[])
            .await
            .is_err());
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }
}
