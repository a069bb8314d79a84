//! bookdb-text
//!
//! Tantivy-backed record collection with a BM25 index over title and
//! synopsis. `index` rebuilds it offline, `search` serves queries and
//! exact id lookups.

pub mod index;
pub mod search;
pub mod tantivy_utils;

pub use search::TantivyBookIndex;
