use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{Map, Value};
use std::sync::Arc;
use tower::ServiceExt;

use bookdb_cli::http::router;
use bookdb_core::chunking::ChunkBuilder;
use bookdb_core::config::AppConfig;
use bookdb_core::traits::Embedder;
use bookdb_core::{EmbeddedChunk, Record};
use bookdb_embed::HashEmbedder;
use bookdb_retrieval::{AppContext, MemoryStore};

const DIM: usize = 64;

fn record(id: &str, title: &str, year: i64, pages: i64, synopsis: &str) -> Record {
    Record { id: id.into(), title: title.into(), year, pages, synopsis: Some(synopsis.into()), extra: Map::new() }
}

fn app(with_model: bool) -> Router {
    let records = vec![
        record("b1", "The Pet", 2001, 120, "A pet story about a loyal dog."),
        record("b2", "Ships", 1999, 300, "Sailing ships of the old navy."),
        record("b3", "Stars", 2001, 90, "A tour of distant stars."),
    ];
    let embedder = HashEmbedder::new(DIM);
    let chunks = ChunkBuilder::default().chunk_records(&records).unwrap();
    let mut records = records;
    records.push(Record {
        id: "b4".into(),
        title: "Untitled".into(),
        year: 1970,
        pages: 10,
        synopsis: None,
        extra: Map::new(),
    });
    let embedded = chunks
        .into_iter()
        .map(|chunk| {
            let embedding = embedder.embed(&chunk.text).unwrap();
            EmbeddedChunk { chunk, embedding }
        })
        .collect();
    let store = Arc::new(MemoryStore::new(records, embedded, DIM).unwrap());
    let embedder: Option<Arc<dyn Embedder>> = with_model.then(|| Arc::new(embedder) as Arc<dyn Embedder>);
    let ctx = AppContext::from_parts(AppConfig::default(), store.clone(), store, embedder);
    router(ctx.service, None)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn search_defaults_to_vector_engine() {
    let (status, body) = get(app(true), "/api/search?query=pet%20story").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["engine"], "vector");
    assert_eq!(body["query"], "pet story");
    assert_eq!(body["books"][0]["_id"], "b1_0");
    assert_eq!(body["books"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn text_engine_over_http() {
    let (status, body) = get(app(true), "/api/search?query=ships&engine=text").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["engine"], "text");
    assert_eq!(body["books"][0]["_id"], "b2");
    assert_eq!(body["books"][0]["title"], "Ships");
}

#[tokio::test]
async fn filter_param_restricts_vector_hits() {
    let (status, body) = get(app(true), "/api/search?query=pet&filter=%7B%22year%22%3A2001%7D").await;
    assert_eq!(status, StatusCode::OK);
    let books = body["books"].as_array().unwrap();
    assert_eq!(books.len(), 2);
    assert!(books.iter().all(|b| b["year"] == 2001));
}

#[tokio::test]
async fn bad_requests_are_400() {
    let (status, body) = get(app(true), "/api/search?query=pet&engine=hybrid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_engine");

    let (status, body) = get(app(true), "/api/search?query=pet&filter=%7B%22title%22%3A1%7D").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_filter");

    let (status, body) = get(app(true), "/api/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_query");
}

#[tokio::test]
async fn book_lookup_and_words() {
    let (status, body) = get(app(true), "/api/book/b2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_id"], "b2");
    assert_eq!(body["pages"], 300);

    let (status, body) = get(app(true), "/api/book/b1/words").await;
    assert_eq!(status, StatusCode::OK);
    let words: Vec<String> = serde_json::from_value(body).unwrap();
    assert_eq!(words, vec!["a", "about", "dog", "loyal", "pet", "story", "the"]);

    let (status, body) = get(app(true), "/api/book/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn embeddings_take_repeated_ids() {
    let (status, body) =
        get(app(true), "/api/embedding/?user_query=pet%20story&book_ids=b2_0&book_ids=b1_0&book_ids=missing").await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    let ids: Vec<&str> = entries.iter().map(|e| e["_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["query", "b2_0", "b1_0"]);
    assert_eq!(entries[0]["embedding"].as_array().unwrap().len(), DIM);

    let (status, _) = get(app(true), "/api/embedding?book_ids=b1_0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_model_only_breaks_vector_path() {
    let (status, body) = get(app(false), "/api/search?query=pet").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "model_unavailable");

    let (status, _) = get(app(false), "/api/search?query=pet&engine=text").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(app(false), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["embedding_model"].is_null());
}

#[tokio::test]
async fn words_of_a_record_without_synopsis_are_422() {
    let (status, body) = get(app(true), "/api/book/b4/words").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "field_not_found");

    let (status, body) = get(app(true), "/api/book/b4").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("synopsis").is_none());
}
