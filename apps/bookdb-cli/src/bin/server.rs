use bookdb_cli::{http, init_tracing};
use bookdb_core::config::AppConfig;
use bookdb_retrieval::AppContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = AppConfig::load()?;
    let ctx = AppContext::init(config).await?;
    http::serve(&ctx.config.server, ctx.service.clone()).await
}
