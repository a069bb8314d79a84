//! Domain types shared by the text store, the vector store and the service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub type RecordId = String;
pub type ChunkId = String;

/// One catalog book as loaded by the offline bulk load.
///
/// Fields not modelled here (authors, genres, cover, ...) are kept in `extra`
/// so the raw document survives a round trip through the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub title: String,
    pub year: i64,
    pub pages: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// The record as a raw JSON document.
    pub fn to_document(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self).map_err(anyhow::Error::from)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Backend(format!("record serialized to non-object: {other}"))),
        }
    }
}

/// A bounded text segment of a record, the unit of vector search.
///
/// `title`, `year` and `pages` are a denormalized copy of the parent record
/// so the vector store can filter without a join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    #[serde(rename = "_id")]
    pub id: ChunkId,
    pub record_id: RecordId,
    #[serde(rename = "_chunk")]
    pub text: String,
    pub offset: usize,
    pub title: String,
    pub year: i64,
    pub pages: i64,
}

impl Chunk {
    pub fn compose_id(record_id: &str, offset: usize) -> ChunkId {
        format!("{record_id}_{offset}")
    }

    /// Verify the denormalized projection still agrees with `record`.
    pub fn check_consistent(&self, record: &Record) -> Result<()> {
        let mismatch = if self.record_id != record.id {
            Some("record_id")
        } else if self.id != Self::compose_id(&record.id, self.offset) {
            Some("_id")
        } else if self.title != record.title {
            Some("title")
        } else if self.year != record.year {
            Some("year")
        } else if self.pages != record.pages {
            Some("pages")
        } else {
            None
        };
        match mismatch {
            Some(field) => Err(Error::InconsistentChunk(format!("{} differs on '{}'", self.id, field))),
            None => Ok(()),
        }
    }
}

/// A chunk paired with its embedding, ready to be written to the vector store.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Which retrieval path served a query.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Text,
    #[default]
    Vector,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Text => "text",
            Engine::Vector => "vector",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Engine::Text),
            "vector" => Ok(Engine::Vector),
            other => Err(Error::InvalidEngine(other.to_string())),
        }
    }
}

/// A single hit, identical in shape for both engines.
///
/// Vector scores are a bounded similarity, text scores an unbounded
/// relevance; the two must never be compared or merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookHit {
    #[serde(rename = "_id")]
    pub id: String,
    pub score: f32,
    pub title: String,
    pub year: i64,
    pub pages: i64,
}

/// Response envelope returned regardless of engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub engine: Engine,
    pub query: String,
    pub books: Vec<BookHit>,
}

/// An embedding as exposed by the diagnostic endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record {
            id: "0452281741".into(),
            title: "The Pet".into(),
            year: 2001,
            pages: 120,
            synopsis: Some("A pet story".into()),
            extra: Map::new(),
        }
    }

    #[test]
    fn engine_parses_only_two_variants() {
        assert_eq!("text".parse::<Engine>().unwrap(), Engine::Text);
        assert_eq!("vector".parse::<Engine>().unwrap(), Engine::Vector);
        assert!(matches!("Vector".parse::<Engine>(), Err(Error::InvalidEngine(_))));
        assert!(matches!("hybrid".parse::<Engine>(), Err(Error::InvalidEngine(_))));
        assert_eq!(Engine::default(), Engine::Vector);
    }

    #[test]
    fn record_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "_id": "1", "title": "T", "year": 1999, "pages": 10,
            "synopsis": "S", "authors": ["A. Author"]
        });
        let rec: Record = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(rec.extra.get("authors"), raw.get("authors"));
        let doc = rec.to_document().unwrap();
        assert_eq!(Value::Object(doc), raw);
    }

    #[test]
    fn hit_serializes_with_underscore_id() {
        let hit = BookHit { id: "x_0".into(), score: 0.5, title: "T".into(), year: 2001, pages: 3 };
        let v = serde_json::to_value(&hit).unwrap();
        assert_eq!(v["_id"], "x_0");
        assert!(v.get("id").is_none());
    }

    #[test]
    fn chunk_consistency_detects_drift() {
        let rec = record();
        let mut chunk = Chunk {
            id: Chunk::compose_id(&rec.id, 0),
            record_id: rec.id.clone(),
            text: "The Pet".into(),
            offset: 0,
            title: rec.title.clone(),
            year: rec.year,
            pages: rec.pages,
        };
        chunk.check_consistent(&rec).expect("consistent");
        chunk.year = 2002;
        assert!(matches!(chunk.check_consistent(&rec), Err(Error::InconsistentChunk(_))));
    }
}
