pub mod catalog;
pub mod http;
pub mod reload;

use tracing_subscriber::EnvFilter;

use bookdb_core::BookHit;

/// `RUST_LOG` wins; otherwise `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// One result line, `score: id title (year, pagespp)`, score rounded to six
/// decimals.
pub fn format_hit(book: &BookHit) -> String {
    let score = (f64::from(book.score) * 1e6).round() / 1e6;
    format!("{score}: {} {} ({}, {}pp)", book.id, book.title, book.year, book.pages)
}
