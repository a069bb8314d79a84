use serde_json::Map;

use bookdb_core::chunking::ChunkBuilder;
use bookdb_core::config::AppConfig;
use bookdb_core::traits::Embedder;
use bookdb_core::{EmbeddedChunk, Engine, FilterField, Record, VectorFilter};
use bookdb_embed::load_embedder;
use bookdb_retrieval::AppContext;
use bookdb_text::TantivyBookIndex;
use bookdb_vector::{ChunkStoreSettings, LanceChunkStore};

fn record(id: &str, title: &str, year: i64, pages: i64, synopsis: &str) -> Record {
    Record { id: id.into(), title: title.into(), year, pages, synopsis: Some(synopsis.into()), extra: Map::new() }
}

#[tokio::test]
async fn both_engines_over_on_disk_stores() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.store.data_dir = tmp.path().to_string_lossy().to_string();
    config.embedding.use_fake = true;
    config.embedding.fake_dim = 64;

    let records = vec![
        record("b1", "The Pet", 2001, 120, "A pet story about a loyal dog."),
        record("b2", "Ships", 1999, 300, "Sailing ships of the old navy."),
        record("b3", "Stars", 2001, 90, "A tour of distant stars."),
    ];
    TantivyBookIndex::create(&config.store.text_index_dir(), &records).unwrap();

    let embedder = load_embedder(&config.embedding).unwrap();
    let store = LanceChunkStore::recreate(&config.store.vector_uri(), ChunkStoreSettings::from(&config.store))
        .await
        .unwrap();
    let chunks = ChunkBuilder::default().chunk_records(&records).unwrap();
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).unwrap();
    let embedded: Vec<EmbeddedChunk> =
        chunks.into_iter().zip(vectors).map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding }).collect();
    store.write_chunks(&embedded, embedder.dim()).await.unwrap();
    store.create_vector_index(embedder.dim(), &FilterField::ALL).await.unwrap();
    drop(store);

    let ctx = AppContext::init(config).await.unwrap();
    let text = ctx.service.search("ships", Engine::Text, &VectorFilter::new()).await.unwrap();
    assert_eq!(text.books[0].id, "b2");

    let vector = ctx.service.search("pet story", Engine::Vector, &VectorFilter::new()).await.unwrap();
    assert_eq!(vector.books[0].id, "b1_0");
    assert_eq!(vector.books.len(), 3);

    let filtered = ctx
        .service
        .search("pet story", Engine::Vector, &VectorFilter::new().eq(FilterField::Year, 2001))
        .await
        .unwrap();
    assert!(filtered.books.iter().all(|b| b.year == 2001));

    assert_eq!(ctx.service.record_words("b1").await.unwrap(), vec!["a", "about", "dog", "loyal", "pet", "story", "the"]);
}
