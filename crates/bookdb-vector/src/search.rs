use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::DistanceType;
use std::collections::HashMap;
use tracing::debug;

use bookdb_core::traits::VectorIndex;
use bookdb_core::{BookHit, EmbeddingEntry, Error, Result, VectorFilter};

use crate::schema::{DISTANCE, ID, PAGES, TITLE, YEAR};
use crate::table::{lance_err, sql_quote, table_exists};
use crate::LanceChunkStore;

/// Cosine distance in [0, 2] to a similarity in [0, 1].
pub fn distance_to_score(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

/// How many extra candidates the ANN stage re-ranks exactly per result.
pub fn refine_factor(candidate_pool: usize, limit: usize) -> u32 {
    if limit == 0 {
        return 1;
    }
    candidate_pool.div_ceil(limit).max(1) as u32
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::Backend(format!("column '{name}' missing or mistyped")))
}

impl LanceChunkStore {
    pub async fn search(
        &self,
        vector: &[f32],
        filter: &VectorFilter,
        candidate_pool: usize,
        limit: usize,
    ) -> Result<Vec<BookHit>> {
        let def = self.definition().await?;
        if vector.len() != def.num_dimensions {
            return Err(Error::DimensionMismatch { expected: def.num_dimensions, actual: vector.len() });
        }
        if let Some(field) = filter.fields().find(|f| !def.allows(*f)) {
            return Err(Error::InvalidFilter(format!("'{}' is not a filter field of index '{}'", field, def.name)));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let table = self.connection().open_table(&def.table).execute().await.map_err(lance_err)?;
        let mut query = table
            .vector_search(vector.to_vec())
            .map_err(lance_err)?
            .column(&def.path)
            .distance_type(DistanceType::Cosine)
            .select(Select::columns(&[ID, TITLE, YEAR, PAGES]))
            .limit(limit);
        if let Some(sql) = filter.to_sql() {
            query = query.only_if(sql);
        }
        if def.ann.is_some() {
            query = query.refine_factor(refine_factor(candidate_pool, limit));
        }

        let mut stream = query.execute().await.map_err(lance_err)?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(lance_err)? {
            let ids = column::<StringArray>(&batch, ID)?;
            let titles = column::<StringArray>(&batch, TITLE)?;
            let years = column::<Int64Array>(&batch, YEAR)?;
            let pages = column::<Int64Array>(&batch, PAGES)?;
            let distances = column::<Float32Array>(&batch, DISTANCE)?;
            for i in 0..batch.num_rows() {
                hits.push(BookHit {
                    id: ids.value(i).to_string(),
                    score: distance_to_score(distances.value(i)),
                    title: titles.value(i).to_string(),
                    year: years.value(i),
                    pages: pages.value(i),
                });
            }
        }
        debug!("vector query on '{}' -> {} hits", def.name, hits.len());
        Ok(hits)
    }

    /// Stored embeddings for `ids`, in request order; unknown ids are skipped.
    pub async fn embeddings(&self, ids: &[String]) -> Result<Vec<EmbeddingEntry>> {
        let settings = self.settings();
        if !table_exists(self.connection(), &settings.table).await? {
            return Err(Error::IndexNotFound(settings.table.clone()));
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.connection().open_table(&settings.table).execute().await.map_err(lance_err)?;
        let in_list = ids.iter().map(|id| sql_quote(id)).collect::<Vec<_>>().join(", ");
        let mut stream = table
            .query()
            .only_if(format!("{ID} IN ({in_list})"))
            .select(Select::columns(&[ID, settings.embedding_field.as_str()]))
            .execute()
            .await
            .map_err(lance_err)?;

        let mut found: HashMap<String, Vec<f32>> = HashMap::new();
        while let Some(batch) = stream.try_next().await.map_err(lance_err)? {
            let batch_ids = column::<StringArray>(&batch, ID)?;
            let vectors = column::<FixedSizeListArray>(&batch, &settings.embedding_field)?;
            for i in 0..batch.num_rows() {
                if !vectors.is_valid(i) {
                    continue;
                }
                let inner = vectors.value(i);
                let values = inner.as_primitive::<Float32Type>().values().to_vec();
                found.insert(batch_ids.value(i).to_string(), values);
            }
        }
        Ok(ids
            .iter()
            .filter_map(|id| found.get(id).cloned().map(|embedding| EmbeddingEntry { id: id.clone(), embedding }))
            .collect())
    }
}

#[async_trait]
impl VectorIndex for LanceChunkStore {
    async fn vector_query(
        &self,
        vector: &[f32],
        filter: &VectorFilter,
        candidate_pool: usize,
        limit: usize,
    ) -> Result<Vec<BookHit>> {
        self.search(vector, filter, candidate_pool, limit).await
    }

    async fn chunk_embeddings(&self, ids: &[String]) -> Result<Vec<EmbeddingEntry>> {
        self.embeddings(ids).await
    }
}
