//! Process-wide state: the loaded index snapshot and the wired-up components.
//!
//! [`IndexHandle`] holds the snapshot queries read from. Reloading builds a
//! complete new [`IndexSnapshot`] first and only then swaps the `Arc` under
//! a short write lock, so a query that already took a snapshot keeps using
//! it and never sees a partially loaded index.

use anyhow::Result;
use std::sync::{Arc, RwLock};

use docqa_core::embedding::EmbeddingProvider;
use docqa_core::generation::Generator;
use docqa_core::index::IndexSnapshot;
use docqa_core::store::Store;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::error::QaError;
use crate::extract::Extractor;
use crate::generation::create_generator;
use crate::ingest::Indexer;
use crate::lock::lock_path_for;
use crate::sources::SourceResolver;
use crate::sqlite_store::SqliteStore;

/// Swappable handle to the current index snapshot.
#[derive(Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl IndexHandle {
    /// A handle with no index loaded; queries fail with `IndexUnavailable`.
    pub fn unloaded() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: IndexSnapshot) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(snapshot))),
        }
    }

    /// The snapshot in use right now.
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        guard
            .clone()
            .ok_or_else(|| QaError::index_unavailable("index has not been loaded").into())
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn swap(&self, snapshot: IndexSnapshot) {
        let next = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(next);
    }

    /// Load a fresh snapshot from `store` and swap it in.
    ///
    /// On failure the previous snapshot stays in place. Returns the number
    /// of chunks in the new snapshot.
    pub async fn reload(
        &self,
        store: &dyn Store,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<usize> {
        let snapshot = IndexSnapshot::load(store, embedder)
            .await
            .map_err(QaError::index_unavailable)?;
        let len = snapshot.len();
        self.swap(snapshot);
        Ok(len)
    }
}

/// Everything a command or the server needs, wired from one [`Config`].
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn Generator>,
    pub indexer: Arc<Indexer>,
    pub sources: SourceResolver,
    pub index: Arc<IndexHandle>,
}

impl AppContext {
    /// Open the SQLite index and build every component from `config`.
    ///
    /// With `create` a missing index is created empty (ingestion, server);
    /// without it a missing index is [`QaError::IndexUnavailable`] (queries).
    /// The snapshot is not loaded here; call [`AppContext::reload`].
    pub async fn open(config: Config, create: bool) -> Result<Self> {
        let store = SqliteStore::open(&config.paths.db, create).await?;
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
        let generator: Arc<dyn Generator> = Arc::from(create_generator(&config.generation)?);
        let extractor = Arc::new(Extractor::from_config(&config.extraction));
        Ok(Self::from_parts(
            config,
            Arc::new(store),
            embedder,
            generator,
            extractor,
        ))
    }

    /// Assemble a context from explicit components.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
        extractor: Arc<Extractor>,
    ) -> Self {
        let sources = SourceResolver::new(&config.paths.sources);
        let indexer = Arc::new(Indexer::new(
            store.clone(),
            embedder.clone(),
            extractor,
            sources.clone(),
            config.paths.documents_dir.clone(),
        )
        .with_lock_file(lock_path_for(&config.paths.db)));
        Self {
            config: Arc::new(config),
            store,
            embedder,
            generator,
            indexer,
            sources,
            index: Arc::new(IndexHandle::unloaded()),
        }
    }

    /// Reload the query snapshot from the store.
    pub async fn reload(&self) -> Result<usize> {
        self.index
            .reload(self.store.as_ref(), self.embedder.as_ref())
            .await
    }
}
