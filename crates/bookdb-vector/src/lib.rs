pub mod index_build;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

use lancedb::Connection;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use bookdb_core::config::StoreConfig;
use bookdb_core::{Error, FilterField, Result};

pub use index_build::{compute_ivfpq_params, IvfPqParams};

/// Names the chunk store resolves against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkStoreSettings {
    pub table: String,
    pub embedding_field: String,
    pub index_name: String,
}

impl From<&StoreConfig> for ChunkStoreSettings {
    fn from(config: &StoreConfig) -> Self {
        Self {
            table: config.chunk_table(),
            embedding_field: config.embedding_field.clone(),
            index_name: config.vector_index_name.clone(),
        }
    }
}

/// Persisted description of a named vector index. The index exists iff
/// its definition is stored in the `meta` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexDefinition {
    pub name: String,
    pub table: String,
    pub path: String,
    pub num_dimensions: usize,
    pub similarity: String,
    pub filter_fields: Vec<FilterField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ann: Option<IvfPqParams>,
}

impl VectorIndexDefinition {
    pub fn meta_key(name: &str) -> String {
        format!("vector_index:{name}")
    }

    pub fn allows(&self, field: FilterField) -> bool {
        self.filter_fields.contains(&field)
    }
}

/// Chunk collection plus its named cosine vector index, stored in LanceDB.
pub struct LanceChunkStore {
    conn: Connection,
    settings: ChunkStoreSettings,
    definition: RwLock<Option<VectorIndexDefinition>>,
}

impl LanceChunkStore {
    pub async fn connect(uri: &str, settings: ChunkStoreSettings) -> Result<Self> {
        if !uri.contains("://") {
            std::fs::create_dir_all(uri).map_err(|e| Error::Backend(format!("creating {uri}: {e}")))?;
        }
        let conn = table::open_db(uri).await?;
        info!("Vector store at {} (table {}, index {})", uri, settings.table, settings.index_name);
        Ok(Self { conn, settings, definition: RwLock::new(None) })
    }

    /// Connect and empty the chunk table, forgetting the index definition.
    ///
    /// Only rows owned by this store are removed; other tables and files
    /// under `uri` are left alone.
    pub async fn recreate(uri: &str, settings: ChunkStoreSettings) -> Result<Self> {
        let store = Self::connect(uri, settings).await?;
        store.reset().await?;
        Ok(store)
    }

    pub async fn reset(&self) -> Result<()> {
        let name = &self.settings.table;
        if table::table_exists(&self.conn, name).await? {
            let t = self.conn.open_table(name).execute().await.map_err(table::lance_err)?;
            t.delete("true").await.map_err(table::lance_err)?;
        }
        table::delete_meta(&self.conn, &VectorIndexDefinition::meta_key(&self.settings.index_name)).await?;
        *self.definition.write().await = None;
        info!("Chunk table {} emptied", name);
        Ok(())
    }

    pub fn settings(&self) -> &ChunkStoreSettings {
        &self.settings
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub async fn count_chunks(&self) -> Result<usize> {
        if !table::table_exists(&self.conn, &self.settings.table).await? {
            return Ok(0);
        }
        let t = self.conn.open_table(&self.settings.table).execute().await.map_err(table::lance_err)?;
        t.count_rows(None).await.map_err(table::lance_err)
    }

    /// The stored definition of the configured index, cached after the
    /// first successful lookup.
    pub async fn definition(&self) -> Result<VectorIndexDefinition> {
        if let Some(def) = self.definition.read().await.as_ref() {
            return Ok(def.clone());
        }
        let key = VectorIndexDefinition::meta_key(&self.settings.index_name);
        let raw = table::get_meta(&self.conn, &key)
            .await?
            .ok_or_else(|| Error::IndexNotFound(self.settings.index_name.clone()))?;
        let def: VectorIndexDefinition =
            serde_json::from_str(&raw).map_err(|e| Error::Backend(format!("corrupt definition for {key}: {e}")))?;
        *self.definition.write().await = Some(def.clone());
        Ok(def)
    }
}
