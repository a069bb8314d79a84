use clap::{Parser, ValueEnum};

use bookdb_cli::{format_hit, init_tracing};
use bookdb_core::config::AppConfig;
use bookdb_core::{Engine, SearchResult, VectorFilter};
use bookdb_retrieval::AppContext;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    Text,
    Vector,
    /// Both engines, printed as two separate result lists.
    Both,
}

/// Query the built indexes from the terminal.
#[derive(Parser, Debug)]
#[command(name = "bookdb-search", version)]
struct Args {
    /// Search text.
    query: Option<String>,
    #[arg(long, value_enum, default_value_t = EngineArg::Vector)]
    engine: EngineArg,
    /// Vector filter as JSON, e.g. '{"year": {"$gte": 2000}}'.
    #[arg(long)]
    filter: Option<String>,
    /// Print the distinct words of a book instead of searching.
    #[arg(long, value_name = "ID")]
    words: Option<String>,
    /// With --words, keep only words starting with this prefix.
    #[arg(long)]
    prefix: Option<String>,
}

fn print_result(result: &SearchResult) {
    println!("\n[{}] {} results for \"{}\"", result.engine, result.books.len(), result.query);
    for (i, book) in result.books.iter().enumerate() {
        println!("  {}. {}", i + 1, format_hit(book));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let ctx = AppContext::init(AppConfig::load()?).await?;

    if let Some(id) = &args.words {
        let words = ctx.service.record_words(id).await?;
        let prefix = args.prefix.as_deref().unwrap_or_default();
        for word in words.iter().filter(|w| w.starts_with(prefix)) {
            println!("{word}");
        }
        return Ok(());
    }

    let Some(query) = args.query.as_deref() else {
        anyhow::bail!("a query is required unless --words is given");
    };
    let filter: VectorFilter = args.filter.as_deref().unwrap_or_default().parse()?;
    let engines: &[Engine] = match args.engine {
        EngineArg::Text => &[Engine::Text],
        EngineArg::Vector => &[Engine::Vector],
        EngineArg::Both => &[Engine::Text, Engine::Vector],
    };
    for engine in engines {
        let result = ctx.service.search(query, *engine, &filter).await?;
        print_result(&result);
    }
    Ok(())
}
