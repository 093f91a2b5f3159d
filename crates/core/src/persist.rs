use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::chunk::Chunk;
use crate::document::Document;
use crate::error::{Result, TenkError};

pub struct JsonlWriter<W> {
    writer: W,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let mut buf = serde_json::to_vec(record)?;
        buf.push(b'\n');
        self.writer.write_all(&buf)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn doc_path(root: &Path, doc_id: &str) -> PathBuf {
    root.join(format!("{doc_id}.json"))
}

fn chunks_path(root: &Path, doc_id: &str) -> PathBuf {
    root.join(format!("{doc_id}_chunks.jsonl"))
}

/// Writes the processed document as JSON plus its chunks as JSONL, the wire
/// form the embedding step reads back.
pub fn save_document(root: &Path, document: &Document) -> Result<()> {
    fs::create_dir_all(root)?;
    let path = doc_path(root, &document.doc_id);
    fs::write(&path, serde_json::to_vec_pretty(document)?)?;
    let file = File::create(chunks_path(root, &document.doc_id))?;
    let mut writer = JsonlWriter::new(BufWriter::new(file));
    for chunk in &document.chunks {
        writer.write_record(chunk)?;
    }
    writer.into_inner().flush()?;
    info!(doc_id = %document.doc_id, path = %path.display(), "saved processed document");
    Ok(())
}

pub fn load_document(root: &Path, doc_id: &str) -> Result<Document> {
    let path = doc_path(root, doc_id);
    let raw = fs::read_to_string(&path)
        .map_err(|_| TenkError::NotFound(format!("document {doc_id} at {}", path.display())))?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn load_chunks(root: &Path, doc_id: &str) -> Result<Vec<Chunk>> {
    let path = chunks_path(root, doc_id);
    let file = File::open(&path)
        .map_err(|_| TenkError::NotFound(format!("chunks for {doc_id} at {}", path.display())))?;
    let mut chunks = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        chunks.push(serde_json::from_str(&line)?);
    }
    Ok(chunks)
}
