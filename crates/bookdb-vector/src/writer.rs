use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::database::CreateTableMode;
use std::sync::Arc;
use tracing::{debug, info};

use bookdb_core::{EmbeddedChunk, Error, Result};

use crate::schema::build_chunk_schema;
use crate::table::{arrow_err, lance_err, table_exists};
use crate::LanceChunkStore;

const BATCH_SIZE: usize = 1000;

impl LanceChunkStore {
	/// Append embedded chunks to the chunk table, creating it on first use.
	///
	/// Every embedding is checked against `dim` before anything is written.
	pub async fn write_chunks(&self, chunks: &[EmbeddedChunk], dim: usize) -> Result<usize> {
		if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dim) {
			return Err(Error::DimensionMismatch { expected: dim, actual: bad.embedding.len() });
		}
		if chunks.is_empty() {
			info!("No chunks to write");
			return Ok(0);
		}
		info!("Writing {} chunks into table {}", chunks.len(), self.settings().table);
		let mut written = 0usize;
		for batch in chunks.chunks(BATCH_SIZE) {
			self.insert_batch(batch, dim).await?;
			written += batch.len();
			debug!("wrote {}/{} chunks", written, chunks.len());
		}
		Ok(written)
	}

	async fn insert_batch(&self, docs: &[EmbeddedChunk], dim: usize) -> Result<()> {
		let record_batch = self.to_record_batch(docs, dim)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		let conn = self.connection();
		let table = &self.settings().table;
		if table_exists(conn, table).await? {
			let existing = conn.open_table(table).execute().await.map_err(lance_err)?;
			if existing.count_rows(None).await.map_err(lance_err)? > 0 {
				existing.add(reader).execute().await.map_err(lance_err)?;
				return Ok(());
			}
			// Empty after a reset: replace it so a new embedding dimension takes effect.
			conn.create_table(table, reader).mode(CreateTableMode::Overwrite).execute().await.map_err(lance_err)?;
		} else {
			conn.create_table(table, reader).execute().await.map_err(lance_err)?;
		}
		Ok(())
	}

	fn to_record_batch(&self, docs: &[EmbeddedChunk], dim: usize) -> Result<RecordBatch> {
		let schema = build_chunk_schema(&self.settings().embedding_field, dim);
		let mut ids = Vec::with_capacity(docs.len());
		let mut record_ids = Vec::with_capacity(docs.len());
		let mut texts = Vec::with_capacity(docs.len());
		let mut titles = Vec::with_capacity(docs.len());
		let mut years = Vec::with_capacity(docs.len());
		let mut pages = Vec::with_capacity(docs.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(docs.len());
		for doc in docs {
			let c = &doc.chunk;
			ids.push(c.id.clone());
			record_ids.push(c.record_id.clone());
			texts.push(c.text.clone());
			titles.push(c.title.clone());
			years.push(c.year);
			pages.push(c.pages);
			vectors.push(Some(doc.embedding.iter().map(|&x| Some(x)).collect()));
		}
		RecordBatch::try_new(
			schema,
			vec![
				Arc::new(StringArray::from(ids)),
				Arc::new(StringArray::from(record_ids)),
				Arc::new(StringArray::from(texts)),
				Arc::new(StringArray::from(titles)),
				Arc::new(Int64Array::from(years)),
				Arc::new(Int64Array::from(pages)),
				Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim as i32)),
			],
		)
		.map_err(arrow_err)
	}
}
