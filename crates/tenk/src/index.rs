use std::path::Path;

use anyhow::{bail, Result};

use tenk_core::{save_document, CancelToken, Chunker, Document, Filing, SectionMeta};
use tenk_rag::{EmbeddingClient, IndexedRecord, VectorStore};

use crate::config::TenkConfig;
use crate::logging;

const EMBED_BATCH: usize = 64;

/// Full indexing run: chunk each section, persist the document, then embed
/// and index the chunks, replacing any prior generation of the same doc_id.
pub fn run(config: &TenkConfig, filing_path: &str, cancel: &CancelToken) -> Result<()> {
    let filing = Filing::load(Path::new(filing_path))?;
    let doc_id = filing.doc_id();
    logging::stage("index", format!("processing {doc_id}"));

    let chunker = Chunker::new(config.chunker)?;
    let sections = filing.resolve_sections()?;
    let mut document = Document::new(
        doc_id.clone(),
        filing.ticker.clone(),
        filing.fiscal_year,
        filing.filing_type.clone(),
    );
    for section in &sections {
        cancel.check()?;
        let chunks = chunker.chunk(&section.text, &section.section_id, section.start_page)?;
        logging::stage(
            "chunk",
            format!("{}: {} chunks", section.section_id, chunks.len()),
        );
        document.push_section(
            &section.section_id,
            SectionMeta {
                title: section.title.clone(),
                num_chunks: chunks.len(),
                word_count: section.word_count,
                char_count: section.char_count,
                start_page: section.start_page,
            },
            chunks,
        );
    }
    if document.total_chunks == 0 {
        bail!("filing produced no chunks");
    }
    save_document(&config.data_dir, &document)?;

    let embedder = EmbeddingClient::new(config.embedding.clone())?;
    let store = VectorStore::open(&config.index_path)?;
    match store.dimension()? {
        None => store.create(embedder.dimension())?,
        Some(dim) if dim != embedder.dimension() => {
            bail!(
                "index dimension {dim} does not match embedding backend dimension {}",
                embedder.dimension()
            );
        }
        Some(_) => {}
    }
    // Replace the prior generation so reprocessing stays idempotent.
    let removed = store.delete_by_doc_id(&doc_id)?;
    if removed > 0 {
        logging::stage("index", format!("removed {removed} stale records"));
    }

    let mut indexed = 0usize;
    for batch in document.chunks.chunks(EMBED_BATCH) {
        cancel.check()?;
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        let records: Vec<IndexedRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| {
                IndexedRecord::from_chunk(
                    chunk,
                    &doc_id,
                    &filing.ticker,
                    filing.fiscal_year,
                    embedding,
                )
            })
            .collect();
        indexed += store.upsert(&records)?;
        logging::stage("embed", format!("indexed {indexed}/{}", document.total_chunks));
    }
    logging::stage(
        "index",
        format!("{doc_id}: {indexed} chunks indexed across {} sections", sections.len()),
    );
    Ok(())
}
