use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;

/// Per-section bookkeeping kept alongside the processed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionMeta {
    pub title: String,
    pub num_chunks: usize,
    pub word_count: usize,
    pub char_count: usize,
    pub start_page: u32,
}

/// A fully processed filing: ordered chunks plus section metadata. Created
/// once per (ticker, fiscal_year) run and immutable after persistence;
/// re-processing the same key produces a new document that replaces the old
/// one in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub ticker: String,
    pub fiscal_year: i32,
    pub filing_type: String,
    pub total_chunks: usize,
    pub sections: BTreeMap<String, SectionMeta>,
    pub chunks: Vec<Chunk>,
}

impl Document {
    pub fn new(doc_id: String, ticker: String, fiscal_year: i32, filing_type: String) -> Self {
        Self {
            doc_id,
            ticker,
            fiscal_year,
            filing_type,
            total_chunks: 0,
            sections: BTreeMap::new(),
            chunks: Vec::new(),
        }
    }

    pub fn push_section(&mut self, section_id: &str, meta: SectionMeta, chunks: Vec<Chunk>) {
        self.sections.insert(section_id.to_string(), meta);
        self.chunks.extend(chunks);
        self.total_chunks = self.chunks.len();
    }
}
