//! Offline reload of the chunk store.

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use bookdb_core::chunking::ChunkBuilder;
use bookdb_core::config::StoreConfig;
use bookdb_core::traits::Embedder;
use bookdb_core::{Chunk, EmbeddedChunk, FilterField, Record};
use bookdb_vector::{ChunkStoreSettings, LanceChunkStore};

/// Chunks of every record that has a synopsis; the rest are skipped with a
/// warning.
pub fn collect_chunks(chunker: &ChunkBuilder, records: &[Record]) -> anyhow::Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for record in records {
        if record.synopsis.is_none() {
            warn!("{} has no synopsis, not chunked", record.id);
            continue;
        }
        chunks.extend(chunker.chunk_record(record)?);
    }
    Ok(chunks)
}

/// Empty the chunk store, then embed and write `chunks` and register the
/// vector index. The store is emptied even when there is nothing to write.
pub async fn reload_chunk_store(
    store_config: &StoreConfig,
    chunks: &[Chunk],
    embedder: &dyn Embedder,
    batch_size: usize,
) -> anyhow::Result<usize> {
    let uri = store_config.vector_uri();
    let store = LanceChunkStore::recreate(&uri, ChunkStoreSettings::from(store_config)).await?;
    if chunks.is_empty() {
        info!("No chunks to embed; {} left empty", uri);
        return Ok(0);
    }

    info!("Embedding {} chunks with {} (dim {})", chunks.len(), embedder.model_id(), embedder.dim());
    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} chunks ({eta})").context("progress template")?,
    );
    let mut embedded = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        embedded.extend(batch.iter().cloned().zip(vectors).map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding }));
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();

    let written = store.write_chunks(&embedded, embedder.dim()).await?;
    let definition = store.create_vector_index(embedder.dim(), &FilterField::ALL).await?;
    info!(
        "Wrote {} chunks to {} ({})",
        written,
        uri,
        if definition.ann.is_some() { "IVF_PQ index trained" } else { "exact search" }
    );
    Ok(written)
}
