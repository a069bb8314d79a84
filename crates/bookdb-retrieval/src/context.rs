use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use bookdb_core::config::AppConfig;
use bookdb_core::traits::{Embedder, TextIndex, VectorIndex};
use bookdb_core::{BookHit, Error, Result};
use bookdb_embed::load_embedder;
use bookdb_text::TantivyBookIndex;
use bookdb_vector::{ChunkStoreSettings, LanceChunkStore};

use crate::backend::SearchBackend;
use crate::service::DynRetrievalService;

/// Process-wide handles, built once at startup and shared by reference.
pub struct AppContext {
    pub config: AppConfig,
    pub service: Arc<DynRetrievalService>,
}

impl AppContext {
    /// Open both stores and load the embedding model.
    ///
    /// A missing text index or a model that fails to load does not stop
    /// startup: the affected path reports its error per request.
    pub async fn init(config: AppConfig) -> Result<Self> {
        let text_dir = config.store.text_index_dir();
        let text: Arc<dyn TextIndex> = match TantivyBookIndex::open(&text_dir) {
            Ok(index) => {
                info!("Text index {} open ({} records)", text_dir.display(), index.len());
                Arc::new(index)
            }
            Err(Error::IndexNotFound(what)) => {
                warn!("{} is missing; text search will fail until it is built", what);
                Arc::new(AbsentTextIndex(config.store.text_index_name.clone()))
            }
            Err(e) => return Err(e),
        };

        let uri = config.store.vector_uri();
        let vector: Arc<dyn VectorIndex> =
            Arc::new(LanceChunkStore::connect(&uri, ChunkStoreSettings::from(&config.store)).await?);

        let embedder = match load_embedder(&config.embedding) {
            Ok(embedder) => Some(embedder),
            Err(e) => {
                warn!("{}; vector search disabled, text search still served", e);
                None
            }
        };

        Ok(Self::from_parts(config, text, vector, embedder))
    }

    pub fn from_parts(
        config: AppConfig,
        text: Arc<dyn TextIndex>,
        vector: Arc<dyn VectorIndex>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        let backend = SearchBackend::new(text, vector, config.search.clone(), config.retry.clone());
        let service = Arc::new(DynRetrievalService::new(backend, embedder));
        Self { config, service }
    }
}

/// Stands in for a text index that has not been built yet.
struct AbsentTextIndex(String);

#[async_trait]
impl TextIndex for AbsentTextIndex {
    async fn text_query(&self, _query: &str, _limit: usize) -> Result<Vec<BookHit>> {
        Err(Error::IndexNotFound(self.0.clone()))
    }

    async fn get_record(&self, _id: &str) -> Result<Map<String, Value>> {
        Err(Error::IndexNotFound(self.0.clone()))
    }
}
