use serde_json::{Map, Value};
use tracing::debug;

use bookdb_core::config::SearchConfig;
use bookdb_core::retry::RetryPolicy;
use bookdb_core::traits::{TextIndex, VectorIndex};
use bookdb_core::{BookHit, EmbeddingEntry, Result, VectorFilter};

/// Search Backend Adapter: fills in query defaults, retries transient store
/// failures and normalizes both hit lists into descending-score order.
pub struct SearchBackend<T, V> {
    text: T,
    vector: V,
    search: SearchConfig,
    retry: RetryPolicy,
}

impl<T, V> SearchBackend<T, V>
where
    T: TextIndex,
    V: VectorIndex,
{
    pub fn new(text: T, vector: V, search: SearchConfig, retry: RetryPolicy) -> Self {
        Self { text, vector, search, retry }
    }

    pub fn settings(&self) -> &SearchConfig {
        &self.search
    }

    /// `limit` defaults to the configured limit and is clamped to `[1, max_limit]`.
    pub fn resolve_limit(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.search.limit).clamp(1, self.search.max_limit.max(1))
    }

    pub async fn vector_query(
        &self,
        vector: &[f32],
        filter: &VectorFilter,
        candidate_pool: Option<usize>,
        limit: Option<usize>,
    ) -> Result<Vec<BookHit>> {
        let limit = self.resolve_limit(limit);
        let candidate_pool = candidate_pool.unwrap_or(self.search.candidate_pool).max(limit);
        debug!("vector_query limit={} candidate_pool={} filter={:?}", limit, candidate_pool, filter.to_sql());
        let hits = self
            .retry
            .run("vector_query", || self.vector.vector_query(vector, filter, candidate_pool, limit))
            .await?;
        Ok(normalize(hits, limit))
    }

    pub async fn text_query(&self, query: &str, limit: Option<usize>) -> Result<Vec<BookHit>> {
        let limit = self.resolve_limit(limit);
        debug!("text_query {:?} limit={}", query, limit);
        let hits = self.retry.run("text_query", || self.text.text_query(query, limit)).await?;
        Ok(normalize(hits, limit))
    }

    pub async fn get_record(&self, id: &str) -> Result<Map<String, Value>> {
        self.retry.run("get_record", || self.text.get_record(id)).await
    }

    pub async fn chunk_embeddings(&self, ids: &[String]) -> Result<Vec<EmbeddingEntry>> {
        self.retry.run("chunk_embeddings", || self.vector.chunk_embeddings(ids)).await
    }
}

/// Drop non-finite scores, order by descending score (stable for ties) and
/// cap at `limit`.
pub fn normalize(mut hits: Vec<BookHit>, limit: usize) -> Vec<BookHit> {
    hits.retain(|h| h.score.is_finite());
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(limit);
    hits
}
