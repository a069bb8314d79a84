use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Chunk, Record};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 200, overlap_tokens: 30 }
    }
}

/// Splits records into overlapping chunks for the offline vector load.
#[derive(Default)]
pub struct ChunkBuilder {
    config: ChunkingConfig,
}

impl ChunkBuilder {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn chunk_records(&self, records: &[Record]) -> Result<Vec<Chunk>> {
        let mut all_chunks = Vec::new();
        for record in records {
            all_chunks.extend(self.chunk_record(record)?);
        }
        info!("{} records became {} chunks", records.len(), all_chunks.len());
        Ok(all_chunks)
    }

    /// Chunks of `title + "\n\n" + synopsis`, ids `{record_id}_{offset}`.
    pub fn chunk_record(&self, record: &Record) -> Result<Vec<Chunk>> {
        let synopsis = record
            .synopsis
            .as_deref()
            .ok_or_else(|| Error::FieldNotFound(format!("synopsis of {}", record.id)))?;
        let combined = format!("{}\n\n{}", record.title, synopsis);
        let chunks: Vec<Chunk> = self
            .split_text(&combined)
            .into_iter()
            .enumerate()
            .map(|(offset, text)| Chunk {
                id: Chunk::compose_id(&record.id, offset),
                record_id: record.id.clone(),
                text,
                offset,
                title: record.title.clone(),
                year: record.year,
                pages: record.pages,
            })
            .collect();
        for chunk in &chunks {
            chunk.check_consistent(record)?;
        }
        debug!("record {} -> {} chunks", record.id, chunks.len());
        Ok(chunks)
    }

    /// Greedy paragraph packing; paragraphs over budget are split into
    /// overlapping word windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_tokens = 0usize;
        for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let tokens = self.count_tokens(paragraph);
            if tokens > self.config.max_tokens {
                flush(&mut chunks, &mut current, &mut current_tokens);
                chunks.extend(self.split_paragraph_with_overlap(paragraph));
                continue;
            }
            if current_tokens + tokens > self.config.max_tokens {
                flush(&mut chunks, &mut current, &mut current_tokens);
            }
            current.push(paragraph);
            current_tokens += tokens;
        }
        flush(&mut chunks, &mut current, &mut current_tokens);
        chunks
    }

    fn count_tokens(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f32 / 0.75) as usize
    }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = ((self.config.max_tokens as f32 * 0.75) as usize).max(1);
        let overlap_words = ((self.config.overlap_tokens as f32 * 0.75) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            start = end - overlap_words;
        }
        chunks
    }
}

fn flush(chunks: &mut Vec<String>, current: &mut Vec<&str>, tokens: &mut usize) {
    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
        current.clear();
    }
    *tokens = 0;
}
