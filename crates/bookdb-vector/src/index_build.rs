//! Registration and IVF_PQ training for the named vector index.
//!
//! Flow:
//! 1) Count the rows of the chunk table
//! 2) With enough rows, train an IVF_PQ index (cosine) over the embedding column
//! 3) Store the definition in `meta`; from then on the index "exists"

use lancedb::index::vector::IvfPqIndexBuilder;
use lancedb::index::Index;
use lancedb::DistanceType;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use bookdb_core::{Error, FilterField, Result};

use crate::table::{lance_err, set_meta};
use crate::{LanceChunkStore, VectorIndexDefinition};

/// Below this many rows PQ codebooks cannot be trained; search stays exhaustive.
pub const MIN_ROWS_FOR_ANN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IvfPqParams {
    pub nlist: usize,
    pub m: usize,
    pub nbits: usize,
}

/// `None` when the table is too small for an ANN index.
pub fn compute_ivfpq_params(total_rows: usize, dim: usize) -> Option<IvfPqParams> {
    if total_rows < MIN_ROWS_FOR_ANN || dim == 0 {
        return None;
    }
    let sqrt_n = (total_rows as f64).sqrt().round() as usize;
    let nlist = sqrt_n.clamp(1, 65_536);
    let max_m = if dim >= 1024 { 32 } else { 16 };
    let m = (1..=max_m.min(dim)).rev().find(|m| dim % m == 0).unwrap_or(1);
    Some(IvfPqParams { nlist, m, nbits: 8 })
}

impl LanceChunkStore {
    /// Register the configured index over the chunk table, training IVF_PQ
    /// when the table is large enough.
    pub async fn create_vector_index(&self, dim: usize, filter_fields: &[FilterField]) -> Result<VectorIndexDefinition> {
        let settings = self.settings();
        let table = self
            .connection()
            .open_table(&settings.table)
            .execute()
            .await
            .map_err(lance_err)?;
        let rows = table.count_rows(None).await.map_err(lance_err)?;

        let ann = compute_ivfpq_params(rows, dim);
        match ann {
            Some(params) => {
                info!(
                    "Training IVF_PQ over {} rows (nlist={}, m={})",
                    rows, params.nlist, params.m
                );
                table
                    .create_index(
                        &[settings.embedding_field.as_str()],
                        Index::IvfPq(
                            IvfPqIndexBuilder::default()
                                .distance_type(DistanceType::Cosine)
                                .num_partitions(params.nlist as u32)
                                .num_sub_vectors(params.m as u32),
                        ),
                    )
                    .name(format!("{}_ivfpq", settings.index_name))
                    .execute()
                    .await
                    .map_err(lance_err)?;
            }
            None => warn!("{} rows is too few for IVF_PQ; vector search will be exhaustive", rows),
        }

        let definition = VectorIndexDefinition {
            name: settings.index_name.clone(),
            table: settings.table.clone(),
            path: settings.embedding_field.clone(),
            num_dimensions: dim,
            similarity: "cosine".to_string(),
            filter_fields: filter_fields.to_vec(),
            ann,
        };
        let raw = serde_json::to_string(&definition).map_err(|e| Error::Backend(e.to_string()))?;
        set_meta(self.connection(), &VectorIndexDefinition::meta_key(&definition.name), &raw).await?;
        *self.definition.write().await = Some(definition.clone());
        info!("Vector index '{}' registered ({} dims)", definition.name, dim);
        Ok(definition)
    }
}
