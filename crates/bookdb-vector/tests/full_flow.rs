use bookdb_core::chunking::ChunkBuilder;
use bookdb_core::traits::{Embedder, VectorIndex};
use bookdb_core::{EmbeddedChunk, Error, FilterField, Record, VectorFilter};
use bookdb_embed::HashEmbedder;
use bookdb_vector::{ChunkStoreSettings, LanceChunkStore};
use serde_json::{json, Map};
use tempfile::TempDir;

const DIM: usize = 64;

fn settings() -> ChunkStoreSettings {
    ChunkStoreSettings {
        table: "book_chunks".into(),
        embedding_field: "embedding".into(),
        index_name: "vector_index".into(),
    }
}

fn record(id: &str, title: &str, year: i64, pages: i64, synopsis: &str) -> Record {
    Record { id: id.into(), title: title.into(), year, pages, synopsis: Some(synopsis.into()), extra: Map::new() }
}

fn catalog() -> Vec<Record> {
    vec![
        record("b1", "The Pet", 2001, 120, "A pet story about a loyal dog."),
        record("b2", "Pet Sematary", 1983, 374, "A cursed burial ground for a family pet."),
        record("b3", "Ships", 1999, 300, "Sailing ships of the old navy."),
        record("b4", "Stars", 2001, 90, "A tour of distant stars and galaxies."),
    ]
}

async fn indexed_store(tmp: &TempDir, embedder: &HashEmbedder) -> LanceChunkStore {
    let uri = tmp.path().join("lance").to_string_lossy().to_string();
    let store = LanceChunkStore::recreate(&uri, settings()).await.expect("store");
    let chunks = ChunkBuilder::default().chunk_records(&catalog()).expect("chunks");
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).expect("embed");
    let embedded: Vec<EmbeddedChunk> =
        chunks.into_iter().zip(vectors).map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding }).collect();
    assert_eq!(store.write_chunks(&embedded, DIM).await.expect("write"), 4);
    let def = store.create_vector_index(DIM, &FilterField::ALL).await.expect("index");
    assert!(def.ann.is_none(), "four rows never train IVF_PQ");
    store
}

#[tokio::test]
async fn lancedb_full_flow() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashEmbedder::new(DIM);
    let store = indexed_store(&tmp, &embedder).await;
    assert_eq!(store.count_chunks().await.unwrap(), 4);

    let q = embedder.embed("pet story").unwrap();
    let hits = store.vector_query(&q, &VectorFilter::new(), 50, 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, "b1_0");
    assert_eq!(hits[0].title, "The Pet");
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));
}

#[tokio::test]
async fn filter_restricts_candidates_before_ranking() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashEmbedder::new(DIM);
    let store = indexed_store(&tmp, &embedder).await;

    let q = embedder.embed("pet story").unwrap();
    let filter = VectorFilter::new().eq(FilterField::Year, 2001);
    let hits = store.vector_query(&q, &filter, 50, 10).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.year == 2001));

    let filter = VectorFilter::from_json(&json!({"pages": {"$lt": 100}})).unwrap();
    let hits = store.vector_query(&q, &filter, 50, 10).await.unwrap();
    assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["b4_0"]);

    let filter = VectorFilter::new().eq(FilterField::Year, 1800);
    assert!(store.vector_query(&q, &filter, 50, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn wrong_query_dimension_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashEmbedder::new(DIM);
    let store = indexed_store(&tmp, &embedder).await;
    match store.vector_query(&[0.1; 8], &VectorFilter::new(), 50, 3).await {
        Err(Error::DimensionMismatch { expected, actual }) => assert_eq!((expected, actual), (DIM, 8)),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn filter_on_unregistered_field_is_invalid() {
    let tmp = TempDir::new().unwrap();
    let uri = tmp.path().join("lance").to_string_lossy().to_string();
    let embedder = HashEmbedder::new(DIM);
    let store = LanceChunkStore::recreate(&uri, settings()).await.unwrap();
    let chunks = ChunkBuilder::default().chunk_records(&catalog()).unwrap();
    let embedded: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let embedding = embedder.embed(&chunk.text).unwrap();
            EmbeddedChunk { chunk, embedding }
        })
        .collect();
    store.write_chunks(&embedded, DIM).await.unwrap();
    store.create_vector_index(DIM, &[FilterField::Year]).await.unwrap();

    let q = embedder.embed("ships").unwrap();
    let filter = VectorFilter::new().eq(FilterField::Pages, 300);
    assert!(matches!(store.vector_query(&q, &filter, 50, 3).await, Err(Error::InvalidFilter(_))));
}

#[tokio::test]
async fn missing_index_is_reported() {
    let tmp = TempDir::new().unwrap();
    let uri = tmp.path().to_string_lossy().to_string();
    let store = LanceChunkStore::connect(&uri, settings()).await.unwrap();
    let q = vec![0.0f32; DIM];
    assert!(matches!(
        store.vector_query(&q, &VectorFilter::new(), 50, 3).await,
        Err(Error::IndexNotFound(_))
    ));
    assert!(matches!(store.chunk_embeddings(&["b1_0".to_string()]).await, Err(Error::IndexNotFound(_))));
}

#[tokio::test]
async fn write_rejects_mismatched_embeddings_before_writing() {
    let tmp = TempDir::new().unwrap();
    let uri = tmp.path().to_string_lossy().to_string();
    let store = LanceChunkStore::connect(&uri, settings()).await.unwrap();
    let mut chunks = ChunkBuilder::default().chunk_records(&catalog()).unwrap().into_iter();
    let good = EmbeddedChunk { chunk: chunks.next().unwrap(), embedding: vec![0.5; DIM] };
    let bad = EmbeddedChunk { chunk: chunks.next().unwrap(), embedding: vec![0.5; DIM - 1] };
    assert!(matches!(
        store.write_chunks(&[good, bad], DIM).await,
        Err(Error::DimensionMismatch { expected: DIM, .. })
    ));
    assert_eq!(store.count_chunks().await.unwrap(), 0);
}

#[tokio::test]
async fn chunk_embeddings_follow_request_order() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashEmbedder::new(DIM);
    let store = indexed_store(&tmp, &embedder).await;
    let ids = vec!["b3_0".to_string(), "missing".to_string(), "b1_0".to_string()];
    let entries = store.chunk_embeddings(&ids).await.unwrap();
    assert_eq!(entries.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["b3_0", "b1_0"]);
    assert_eq!(entries[0].embedding.len(), DIM);
    let expected = embedder.embed("Ships\n\nSailing ships of the old navy.").unwrap();
    for (a, b) in entries[0].embedding.iter().zip(expected) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[tokio::test]
async fn reload_keeps_unrelated_files_and_forgets_the_index() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashEmbedder::new(DIM);
    let store = indexed_store(&tmp, &embedder).await;
    drop(store);

    let lance_dir = tmp.path().join("lance");
    let notes = lance_dir.join("notes.txt");
    std::fs::write(&notes, "keep me").unwrap();

    let uri = lance_dir.to_string_lossy().to_string();
    let store = LanceChunkStore::recreate(&uri, settings()).await.unwrap();
    assert_eq!(std::fs::read_to_string(&notes).unwrap(), "keep me");
    assert_eq!(store.count_chunks().await.unwrap(), 0);
    let q = embedder.embed("pet story").unwrap();
    assert!(matches!(
        store.vector_query(&q, &VectorFilter::new(), 50, 3).await,
        Err(Error::IndexNotFound(_))
    ));
}

#[tokio::test]
async fn reload_accepts_a_new_dimension() {
    let tmp = TempDir::new().unwrap();
    let store = indexed_store(&tmp, &HashEmbedder::new(DIM)).await;
    drop(store);

    let small = HashEmbedder::new(16);
    let uri = tmp.path().join("lance").to_string_lossy().to_string();
    let store = LanceChunkStore::recreate(&uri, settings()).await.unwrap();
    let chunks = ChunkBuilder::default().chunk_records(&catalog()).unwrap();
    let embedded: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let embedding = small.embed(&chunk.text).unwrap();
            EmbeddedChunk { chunk, embedding }
        })
        .collect();
    assert_eq!(store.write_chunks(&embedded, 16).await.unwrap(), 4);
    store.create_vector_index(16, &FilterField::ALL).await.unwrap();
    let hits = store.vector_query(&small.embed("ships").unwrap(), &VectorFilter::new(), 50, 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    let entries = store.chunk_embeddings(&["b3_0".to_string()]).await.unwrap();
    assert_eq!(entries[0].embedding.len(), 16);
}

#[tokio::test]
async fn repeated_ids_are_returned_each_time() {
    let tmp = TempDir::new().unwrap();
    let store = indexed_store(&tmp, &HashEmbedder::new(DIM)).await;
    let ids = vec!["b1_0".to_string(), "b1_0".to_string()];
    let entries = store.chunk_embeddings(&ids).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], entries[1]);
}
