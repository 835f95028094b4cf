//! Document chunking strategies.
//!
//! All strategies copy the document's metadata onto every chunk and add a
//! `document_id` entry; empty text yields zero chunks.

use secondbrain_common::{BrainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A bounded fragment of a document selected for embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    /// 0-based position within the document.
    pub index: usize,
    pub metadata: HashMap<String, String>,
}

/// Chunking strategy selector. Unknown names fall back to fixed-size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    #[default]
    Fixed,
    Sentence,
    SectionHeader,
}

impl ChunkingStrategy {
    pub fn from_name(name: &str) -> Self {
        match name {
            "sentence" => Self::Sentence,
            "section_header" | "section" => Self::SectionHeader,
            _ => Self::Fixed,
        }
    }
}

/// Chunking behavior.
pub trait Strategy: Send + Sync {
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        metadata: &HashMap<String, String>,
    ) -> Vec<Chunk>;
}

/// Build the strategy for the given selector and parameters.
///
/// Rejects `overlap >= chunk_size` (the fixed window must advance) and a
/// zero chunk size at configuration time.
pub fn strategy_for(
    strategy: ChunkingStrategy,
    chunk_size: usize,
    overlap: usize,
) -> Result<Box<dyn Strategy>> {
    Ok(match strategy {
        ChunkingStrategy::Fixed => Box::new(FixedSizeChunker::new(chunk_size, overlap)?),
        ChunkingStrategy::Sentence => Box::new(SentenceChunker::new(chunk_size)?),
        ChunkingStrategy::SectionHeader => Box::new(SectionChunker::new(chunk_size)?),
    })
}

fn make_chunk(
    document_id: &str,
    content: String,
    index: usize,
    metadata: &HashMap<String, String>,
) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        content,
        index,
        metadata: metadata.clone(),
    }
}

/// Splits text into windows of `chunk_size` whitespace tokens, each
/// repeating the last `overlap` tokens of its predecessor.
pub struct FixedSizeChunker {
    chunk_size: usize,
    overlap: usize,
}

impl FixedSizeChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(BrainError::Config("chunk_size must be positive".into()));
        }
        if overlap >= chunk_size {
            return Err(BrainError::Config(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

impl Strategy for FixedSizeChunker {
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        metadata: &HashMap<String, String>,
    ) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0;
        loop {
            let end = (start + self.chunk_size).min(words.len());
            chunks.push(make_chunk(
                document_id,
                words[start..end].join(" "),
                index,
                metadata,
            ));
            if end == words.len() {
                break;
            }
            start += step;
            index += 1;
        }
        chunks
    }
}

/// Splits on sentence terminators and greedily packs sentences so no chunk
/// exceeds `max_chunk_size` tokens unless a single sentence does.
pub struct SentenceChunker {
    max_chunk_size: usize,
}

impl SentenceChunker {
    pub fn new(max_chunk_size: usize) -> Result<Self> {
        if max_chunk_size == 0 {
            return Err(BrainError::Config("max_chunk_size must be positive".into()));
        }
        Ok(Self { max_chunk_size })
    }
}

impl Strategy for SentenceChunker {
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        metadata: &HashMap<String, String>,
    ) -> Vec<Chunk> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_size = 0;
        let mut index = 0;

        for sentence in sentences {
            let sentence_words = sentence.split_whitespace().count();

            if current_size + sentence_words > self.max_chunk_size && !current.is_empty() {
                chunks.push(make_chunk(document_id, current.join(" "), index, metadata));
                current.clear();
                current_size = 0;
                index += 1;
            }

            current.push(sentence);
            current_size += sentence_words;
        }

        if !current.is_empty() {
            chunks.push(make_chunk(document_id, current.join(" "), index, metadata));
        }

        chunks
    }
}

/// Splits at section headers, falling back to sentence chunking inside
/// sections that exceed `max_chunk_size`. Chunk indexes are monotonically
/// increasing across the whole document.
pub struct SectionChunker {
    max_chunk_size: usize,
}

impl SectionChunker {
    pub fn new(max_chunk_size: usize) -> Result<Self> {
        if max_chunk_size == 0 {
            return Err(BrainError::Config("max_chunk_size must be positive".into()));
        }
        Ok(Self { max_chunk_size })
    }
}

impl Strategy for SectionChunker {
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        metadata: &HashMap<String, String>,
    ) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut index = 0;

        for section in split_sections(text) {
            let section = section.trim();
            if section.is_empty() {
                continue;
            }

            let word_count = section.split_whitespace().count();
            if word_count <= self.max_chunk_size {
                chunks.push(make_chunk(document_id, section.to_string(), index, metadata));
                index += 1;
            } else {
                let sub = SentenceChunker {
                    max_chunk_size: self.max_chunk_size,
                };
                for mut chunk in sub.chunk(document_id, section, metadata) {
                    chunk.index = index;
                    chunks.push(chunk);
                    index += 1;
                }
            }
        }

        chunks
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

/// A section starts at a line beginning with `#` or whose trimmed content
/// is longer than 3 characters and equal to its own uppercasing.
fn is_section_header(trimmed: &str) -> bool {
    trimmed.starts_with('#')
        || (trimmed.chars().count() > 3 && trimmed == trimmed.to_uppercase())
}

fn split_sections(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if is_section_header(line.trim()) && !current.is_empty() {
            sections.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }

    if !current.is_empty() {
        sections.push(current.join("\n"));
    }

    sections
}
