//! In-process store implementing both search capabilities with exact
//! algorithms. Backs tests and demos that have no on-disk indexes.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;

use bookdb_core::traits::{TextIndex, VectorIndex};
use bookdb_core::{BookHit, EmbeddedChunk, EmbeddingEntry, Error, Record, Result, VectorFilter};

pub struct MemoryStore {
    records: Vec<Record>,
    chunks: Vec<EmbeddedChunk>,
    dim: usize,
}

impl MemoryStore {
    pub fn new(records: Vec<Record>, chunks: Vec<EmbeddedChunk>, dim: usize) -> Result<Self> {
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: bad.embedding.len() });
        }
        Ok(Self { records, chunks, dim })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (na * nb)
}

#[async_trait]
impl TextIndex for MemoryStore {
    /// Term-frequency relevance over title and synopsis.
    async fn text_query(&self, query: &str, limit: usize) -> Result<Vec<BookHit>> {
        let terms: Vec<String> = words(query).collect();
        let mut hits: Vec<BookHit> = self
            .records
            .iter()
            .filter_map(|r| {
                let mut counts: HashMap<String, usize> = HashMap::new();
                let text = format!("{} {}", r.title, r.synopsis.as_deref().unwrap_or_default());
                for w in words(&text) {
                    *counts.entry(w).or_default() += 1;
                }
                let score = terms.iter().map(|t| counts.get(t).copied().unwrap_or(0)).sum::<usize>() as f32;
                (score > 0.0).then(|| BookHit { id: r.id.clone(), score, title: r.title.clone(), year: r.year, pages: r.pages })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get_record(&self, id: &str) -> Result<Map<String, Value>> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))?
            .to_document()
    }
}

#[async_trait]
impl VectorIndex for MemoryStore {
    /// Exhaustive cosine search, filter applied before ranking.
    async fn vector_query(
        &self,
        vector: &[f32],
        filter: &VectorFilter,
        _candidate_pool: usize,
        limit: usize,
    ) -> Result<Vec<BookHit>> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        let mut hits: Vec<BookHit> = self
            .chunks
            .iter()
            .filter(|c| filter.matches(c.chunk.year, c.chunk.pages))
            .map(|c| BookHit {
                id: c.chunk.id.clone(),
                score: ((1.0 + cosine(vector, &c.embedding)) / 2.0).clamp(0.0, 1.0),
                title: c.chunk.title.clone(),
                year: c.chunk.year,
                pages: c.chunk.pages,
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn chunk_embeddings(&self, ids: &[String]) -> Result<Vec<EmbeddingEntry>> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.chunks
                    .iter()
                    .find(|c| &c.chunk.id == id)
                    .map(|c| EmbeddingEntry { id: id.clone(), embedding: c.embedding.clone() })
            })
            .collect())
    }
}
