use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;
use tracing::debug;

use crate::error::{Result, TenkError};

static TOKENIZER: Lazy<CoreBPE> = Lazy::new(|| tiktoken_rs::cl100k_base().expect("tokenizer"));

/// Token count for a piece of text under the chunking tokenizer.
pub fn count_tokens(text: &str) -> usize {
    TOKENIZER.encode_ordinary(text).len()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkerConfig {
    /// Validates the window geometry. An overlap at or above the chunk size
    /// would never advance the window, so it is rejected here instead of
    /// looping at chunk time.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(TenkError::Config("chunk_size must be positive".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(TenkError::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// One fixed-token-length slice of a section, the unit of embedding and
/// retrieval. Field-for-field this is the persisted wire record shared by
/// the preprocessor, the embedding client, and the vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub section_id: String,
    pub text: String,
    pub token_count: usize,
    pub char_count: usize,
    pub start_page: u32,
    pub chunk_index: usize,
}

#[derive(Debug)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Splits `text` into overlapping token windows. Chunk ids are
    /// `{section_id}_chunk_{index}` with a dense 0-based index. Empty or
    /// whitespace-only text yields no chunks.
    pub fn chunk(&self, text: &str, section_id: &str, start_page: u32) -> Result<Vec<Chunk>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let tokens = TOKENIZER.encode_ordinary(text);
        let bounds = window_bounds(tokens.len(), self.config.chunk_size, self.config.overlap);
        let mut chunks = Vec::with_capacity(bounds.len());
        for (chunk_index, (start, end)) in bounds.into_iter().enumerate() {
            let slice = tokens[start..end].to_vec();
            let token_count = slice.len();
            let chunk_text = TOKENIZER
                .decode(slice)
                .map_err(|e| TenkError::Tokenizer(e.to_string()))?;
            chunks.push(Chunk {
                chunk_id: format!("{section_id}_chunk_{chunk_index}"),
                section_id: section_id.to_string(),
                char_count: chunk_text.len(),
                text: chunk_text,
                token_count,
                start_page,
                chunk_index,
            });
        }
        debug!(
            section_id,
            chunks = chunks.len(),
            "chunked section into token windows"
        );
        Ok(chunks)
    }
}

/// Window boundaries over a token stream of `total` tokens. Window `i`
/// covers `[start, start + chunk_size)` clamped to `total`; the next window
/// starts `chunk_size - overlap` later. A window that reaches the end of
/// the stream is the last one, so a short tail is never re-covered by a
/// pure-overlap runt window. Geometry that can never advance the window
/// (`chunk_size == 0` or `overlap >= chunk_size`) yields no windows.
pub fn window_bounds(total: usize, chunk_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Vec::new();
    }
    let mut bounds = Vec::new();
    let mut start = 0usize;
    while start < total {
        let end = (start + chunk_size).min(total);
        bounds.push((start, end));
        if end == total {
            break;
        }
        start += chunk_size - overlap;
    }
    bounds
}
