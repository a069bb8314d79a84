use clap::Parser;
use std::path::PathBuf;

use bookdb_cli::catalog::load_records;
use bookdb_cli::init_tracing;
use bookdb_cli::reload::{collect_chunks, reload_chunk_store};
use bookdb_core::chunking::{ChunkBuilder, ChunkingConfig};
use bookdb_core::config::AppConfig;
use bookdb_core::Record;
use bookdb_embed::load_embedder;
use bookdb_text::TantivyBookIndex;

/// Offline bulk load: rebuilds the text index and the chunk store from a
/// catalog file.
#[derive(Parser, Debug)]
#[command(name = "bookdb-indexer", version)]
struct Args {
    /// Catalog file, a JSON array of books or JSON lines.
    catalog: PathBuf,
    /// Keep the existing text index.
    #[arg(long, short = 's')]
    skip_text: bool,
    /// Keep the existing chunk store.
    #[arg(long)]
    skip_vector: bool,
    /// Only chunk and embed the first N records.
    #[arg(long)]
    limit_vector: Option<usize>,
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
    #[arg(long, default_value_t = 200)]
    max_tokens: usize,
    #[arg(long, default_value_t = 30)]
    overlap_tokens: usize,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = AppConfig::load()?;

    println!("Book catalog indexer\n====================");
    println!("Catalog: {}", args.catalog.display());
    let records = load_records(&args.catalog)?;
    println!("Loaded {} records", records.len());

    if args.skip_text {
        println!("Skipping text index (--skip-text)");
    } else {
        let dir = config.store.text_index_dir();
        let index = TantivyBookIndex::create(&dir, &records)?;
        println!("Indexed {} records into {}", index.len(), dir.display());
    }

    let mut chunk_count = 0;
    if args.skip_vector {
        println!("Skipping chunk store (--skip-vector)");
    } else {
        let runtime = tokio::runtime::Runtime::new()?;
        chunk_count = runtime.block_on(build_vector_store(&config, &args, &records))?;
    }

    println!("\nIndexing completed");
    println!("Chunks written: {chunk_count}");
    println!("Try: cargo run --bin bookdb-search -- '<query>' --engine both");
    Ok(())
}

async fn build_vector_store(config: &AppConfig, args: &Args, records: &[Record]) -> anyhow::Result<usize> {
    let chunker =
        ChunkBuilder::new(ChunkingConfig { max_tokens: args.max_tokens, overlap_tokens: args.overlap_tokens });
    let selected = &records[..args.limit_vector.unwrap_or(records.len()).min(records.len())];
    let chunks = collect_chunks(&chunker, selected)?;
    if chunks.is_empty() {
        println!("No chunks to embed; emptying the chunk store");
    }
    let embedder = load_embedder(&config.embedding)?;
    reload_chunk_store(&config.store, &chunks, embedder.as_ref(), args.batch_size).await
}
