pub mod chunking;
pub mod config;
pub mod error;
pub mod filter;
pub mod retry;
pub mod traits;
pub mod types;
pub mod words;

pub use error::{Error, Result};
pub use filter::{Comparison, Condition, FilterField, Predicate, VectorFilter};
pub use types::{BookHit, Chunk, EmbeddedChunk, EmbeddingEntry, Engine, Record, SearchResult};
