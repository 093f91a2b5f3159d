use std::collections::HashMap;

use tracing::debug;

use tenk_core::Result;

use crate::embedding::EmbeddingClient;
use crate::store::{RetrievalResult, SearchFilters, VectorStore};

/// Multi-query retrieval over the vector index. Every (query, section) pair
/// fans out to its own search; hits are deduplicated by chunk_id keeping the
/// best score, then re-ranked globally.
pub struct Retriever {
    store: VectorStore,
    embedder: EmbeddingClient,
}

impl Retriever {
    pub fn new(store: VectorStore, embedder: EmbeddingClient) -> Self {
        Self { store, embedder }
    }

    /// Runs the fan-out and returns the merged hits, best first. The merged
    /// list is capped at `top_k * queries.len()`.
    pub fn retrieve(
        &self,
        queries: &[String],
        ticker: &str,
        fiscal_year: i32,
        sections: &[String],
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let top_k = top_k.max(1);
        let mut best: HashMap<String, RetrievalResult> = HashMap::new();
        let mut arrival: Vec<String> = Vec::new();
        for query in queries {
            let vector = self.embedder.embed(query)?;
            for filters in self.filter_sets(ticker, fiscal_year, sections) {
                let hits = self.store.search(&vector, top_k, &filters)?;
                for hit in hits {
                    match best.get_mut(&hit.chunk_id) {
                        Some(existing) => {
                            if hit.score > existing.score {
                                existing.score = hit.score;
                            }
                        }
                        None => {
                            arrival.push(hit.chunk_id.clone());
                            best.insert(hit.chunk_id.clone(), hit);
                        }
                    }
                }
            }
        }
        // Rebuild in first-arrival order so the descending sort breaks score
        // ties deterministically.
        let mut merged: Vec<RetrievalResult> = arrival
            .into_iter()
            .filter_map(|id| best.remove(&id))
            .collect();
        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        merged.truncate(top_k * queries.len());
        debug!(
            queries = queries.len(),
            sections = sections.len(),
            hits = merged.len(),
            "retrieval fan-out complete"
        );
        Ok(merged)
    }

    /// Retrieves and renders the context block fed to generation prompts.
    /// Empty queries yield an empty string, never an error.
    pub fn retrieve_context(
        &self,
        queries: &[String],
        ticker: &str,
        fiscal_year: i32,
        sections: &[String],
        top_k: usize,
    ) -> Result<String> {
        let hits = self.retrieve(queries, ticker, fiscal_year, sections, top_k)?;
        Ok(render_context(&hits))
    }

    fn filter_sets(
        &self,
        ticker: &str,
        fiscal_year: i32,
        sections: &[String],
    ) -> Vec<SearchFilters> {
        let base = SearchFilters {
            ticker: Some(ticker.to_string()),
            fiscal_year: Some(fiscal_year),
            section_id: None,
        };
        if sections.is_empty() {
            return vec![base];
        }
        sections
            .iter()
            .map(|section_id| SearchFilters {
                section_id: Some(section_id.clone()),
                ..base.clone()
            })
            .collect()
    }
}

/// `[{section_id} - Page {start_page}]` headers with `---` separators.
pub fn render_context(hits: &[RetrievalResult]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "[{} - Page {}]\n{}",
                hit.section_id, hit.start_page, hit.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(chunk_id: &str, section_id: &str, page: u32, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk_id: chunk_id.to_string(),
            doc_id: "TST_2024_10K".to_string(),
            ticker: "TST".to_string(),
            fiscal_year: 2024,
            section_id: section_id.to_string(),
            chunk_index: 0,
            start_page: page,
            text: format!("body of {chunk_id}"),
            score,
        }
    }

    #[test]
    fn context_renders_headers_and_separators() {
        let rendered = render_context(&[
            hit("a_chunk_0", "ITEM_1", 3, 0.9),
            hit("b_chunk_0", "ITEM_7", 41, 0.8),
        ]);
        assert_eq!(
            rendered,
            "[ITEM_1 - Page 3]\nbody of a_chunk_0\n\n---\n\n[ITEM_7 - Page 41]\nbody of b_chunk_0"
        );
    }

    #[test]
    fn empty_hits_render_empty_string() {
        assert_eq!(render_context(&[]), "");
    }
}
