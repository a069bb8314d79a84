use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use bookdb_core::traits::{Embedder, TextIndex, VectorIndex};
use bookdb_core::words::get_words;
use bookdb_core::{EmbeddingEntry, Engine, Error, Result, SearchResult, VectorFilter};

use crate::backend::SearchBackend;

/// Fields whose tokens `record_words` reports.
pub const WORD_FIELDS: [&str; 2] = ["title", "synopsis"];

pub type DynRetrievalService = RetrievalService<Arc<dyn TextIndex>, Arc<dyn VectorIndex>>;

/// Engine dispatch over the backend adapter. Holds no per-request state.
pub struct RetrievalService<T, V> {
    backend: SearchBackend<T, V>,
    embedder: Option<Arc<dyn Embedder>>,
    request_timeout: Duration,
}

impl<T, V> RetrievalService<T, V>
where
    T: TextIndex,
    V: VectorIndex,
{
    pub fn new(backend: SearchBackend<T, V>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        let request_timeout = Duration::from_millis(backend.settings().request_timeout_ms);
        Self { backend, embedder, request_timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &SearchBackend<T, V> {
        &self.backend
    }

    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.embedder.as_ref()
    }

    pub async fn search(&self, query: &str, engine: Engine, filter: &VectorFilter) -> Result<SearchResult> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery("query must not be empty".into()));
        }
        let books = self
            .bounded(async {
                match engine {
                    Engine::Vector => {
                        let vector = self.embed_query(query).await?;
                        self.backend.vector_query(&vector, filter, None, None).await
                    }
                    Engine::Text => {
                        if !filter.is_empty() {
                            debug!("text engine ignores filter {:?}", filter.to_sql());
                        }
                        self.backend.text_query(query, None).await
                    }
                }
            })
            .await?;
        info!("search engine={} query={:?} -> {} books", engine, query, books.len());
        Ok(SearchResult { engine, query: query.to_string(), books })
    }

    pub async fn get_record(&self, id: &str) -> Result<Map<String, Value>> {
        self.bounded(self.backend.get_record(id)).await
    }

    /// Sorted unique lowercase tokens of the record's title and synopsis.
    pub async fn record_words(&self, id: &str) -> Result<Vec<String>> {
        let doc = self.get_record(id).await?;
        get_words(&doc, &WORD_FIELDS)
    }

    /// The query embedding (as `_id: "query"`) followed by the stored
    /// embeddings of `chunk_ids`.
    pub async fn embeddings(&self, user_query: &str, chunk_ids: &[String]) -> Result<Vec<EmbeddingEntry>> {
        if user_query.trim().is_empty() {
            return Err(Error::InvalidQuery("user_query must not be empty".into()));
        }
        self.bounded(async {
            let query = self.embed_query(user_query).await?;
            let stored = self.backend.chunk_embeddings(chunk_ids).await?;
            let mut out = Vec::with_capacity(stored.len() + 1);
            out.push(EmbeddingEntry { id: "query".to_string(), embedding: query });
            out.extend(stored);
            Ok(out)
        })
        .await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let embedder = self
            .embedder
            .clone()
            .ok_or_else(|| Error::ModelUnavailable("no embedding model loaded".into()))?;
        let text = query.to_string();
        tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| Error::Backend(format!("embedding task failed: {e}")))?
    }

    async fn bounded<R>(&self, fut: impl Future<Output = Result<R>>) -> Result<R> {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| Error::Timeout(self.request_timeout.as_millis() as u64))?
    }
}
