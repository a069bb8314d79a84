use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::filter::VectorFilter;
use crate::types::{BookHit, EmbeddingEntry};

/// Turns text into fixed-dimension vectors. `dim()` never changes for the
/// lifetime of an instance, and inference is read-only so one instance can
/// serve concurrent requests.
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::Backend(format!("{} returned no embedding", self.model_id())))
    }
}

/// Record collection with a lexical relevance index over its text fields.
#[async_trait]
pub trait TextIndex: Send + Sync {
    /// Relevance-ranked hits, best first, at most `limit`.
    async fn text_query(&self, query: &str, limit: usize) -> Result<Vec<BookHit>>;

    /// The raw stored document for `id`, or `RecordNotFound`.
    async fn get_record(&self, id: &str) -> Result<Map<String, Value>>;
}

/// Chunk collection with an approximate nearest-neighbour index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Cosine-ranked hits restricted by `filter`, best first, at most `limit`.
    async fn vector_query(
        &self,
        vector: &[f32],
        filter: &VectorFilter,
        candidate_pool: usize,
        limit: usize,
    ) -> Result<Vec<BookHit>>;

    /// Stored embeddings of the given chunk ids; unknown ids are skipped.
    async fn chunk_embeddings(&self, ids: &[String]) -> Result<Vec<EmbeddingEntry>>;
}

#[async_trait]
impl<T: TextIndex + ?Sized> TextIndex for Arc<T> {
    async fn text_query(&self, query: &str, limit: usize) -> Result<Vec<BookHit>> {
        (**self).text_query(query, limit).await
    }

    async fn get_record(&self, id: &str) -> Result<Map<String, Value>> {
        (**self).get_record(id).await
    }
}

#[async_trait]
impl<V: VectorIndex + ?Sized> VectorIndex for Arc<V> {
    async fn vector_query(
        &self,
        vector: &[f32],
        filter: &VectorFilter,
        candidate_pool: usize,
        limit: usize,
    ) -> Result<Vec<BookHit>> {
        (**self).vector_query(vector, filter, candidate_pool, limit).await
    }

    async fn chunk_embeddings(&self, ids: &[String]) -> Result<Vec<EmbeddingEntry>> {
        (**self).chunk_embeddings(ids).await
    }
}
