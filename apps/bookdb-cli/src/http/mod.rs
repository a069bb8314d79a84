pub mod error;

use axum::{
    extract::{Path, Query, RawQuery, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use bookdb_core::config::ServerConfig;
use bookdb_core::{EmbeddingEntry, Engine, Error, SearchResult, VectorFilter};
use bookdb_retrieval::DynRetrievalService;

use self::error::ApiResult;

pub type SharedService = Arc<DynRetrievalService>;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub engine: Option<String>,
    /// JSON filter, e.g. `{"year": 2001}`; vector engine only.
    pub filter: Option<String>,
}

pub fn router(service: SharedService, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/api/search", get(search))
        .route("/api/book/:id", get(get_book))
        .route("/api/book/:id/words", get(get_book_words))
        .route("/api/embedding", get(get_embeddings))
        .route("/api/embedding/", get(get_embeddings));

    if let Some(dir) = static_dir.filter(|d| d.is_dir()) {
        info!("Serving UI from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    app.layer(cors).layer(TraceLayer::new_for_http()).with_state(service)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig, service: SharedService) -> anyhow::Result<()> {
    let app = router(service, Some(PathBuf::from(&config.static_dir)));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Book search API listening on http://{}", addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}

async fn health(State(service): State<SharedService>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "embedding_model": service.embedder().map(|e| e.model_id().to_string()),
    }))
}

async fn search(State(service): State<SharedService>, Query(params): Query<SearchParams>) -> ApiResult<Json<SearchResult>> {
    let engine = match params.engine.as_deref() {
        None => Engine::default(),
        Some(raw) => raw.parse()?,
    };
    let filter: VectorFilter = params.filter.as_deref().unwrap_or_default().parse()?;
    let query = params.query.unwrap_or_default();
    Ok(Json(service.search(&query, engine, &filter).await?))
}

async fn get_book(State(service): State<SharedService>, Path(id): Path<String>) -> ApiResult<Json<Map<String, Value>>> {
    Ok(Json(service.get_record(&id).await?))
}

async fn get_book_words(State(service): State<SharedService>, Path(id): Path<String>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(service.record_words(&id).await?))
}

/// `?user_query=..&book_ids=a&book_ids=b`; repeated keys are why this
/// reads the raw query string.
async fn get_embeddings(State(service): State<SharedService>, RawQuery(raw): RawQuery) -> ApiResult<Json<Vec<EmbeddingEntry>>> {
    let mut user_query = None;
    let mut book_ids = Vec::new();
    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "user_query" => user_query = Some(value.into_owned()),
            "book_ids" => book_ids.push(value.into_owned()),
            _ => {}
        }
    }
    let user_query = user_query.ok_or_else(|| Error::InvalidQuery("user_query is required".into()))?;
    Ok(Json(service.embeddings(&user_query, &book_ids).await?))
}
