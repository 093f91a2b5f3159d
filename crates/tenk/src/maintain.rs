use anyhow::Result;

use tenk_rag::VectorStore;

use crate::config::TenkConfig;
use crate::logging;

pub fn delete(config: &TenkConfig, doc_id: &str) -> Result<()> {
    let store = VectorStore::open(&config.index_path)?;
    let removed = store.delete_by_doc_id(doc_id)?;
    logging::stage("delete", format!("{doc_id}: {removed} records removed"));
    Ok(())
}

pub fn stats(config: &TenkConfig) -> Result<()> {
    let store = VectorStore::open(&config.index_path)?;
    let stats = store.stats()?;
    println!("index: {}", config.index_path.display());
    println!("records: {}", stats.count);
    match stats.dimension {
        Some(dim) => println!("dimension: {dim}"),
        None => println!("dimension: not set"),
    }
    Ok(())
}
