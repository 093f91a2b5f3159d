use std::path::{Path, PathBuf};

use bytemuck::{cast_slice, try_cast_slice};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tenk_core::{Chunk, Result, TenkError};

/// A chunk record as held by the vector index: chunk fields plus document
/// identity and the embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub chunk_id: String,
    pub doc_id: String,
    pub ticker: String,
    pub fiscal_year: i32,
    pub section_id: String,
    pub chunk_index: usize,
    pub start_page: u32,
    pub token_count: usize,
    pub char_count: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl IndexedRecord {
    pub fn from_chunk(
        chunk: &Chunk,
        doc_id: &str,
        ticker: &str,
        fiscal_year: i32,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            doc_id: doc_id.to_string(),
            ticker: ticker.to_string(),
            fiscal_year,
            section_id: chunk.section_id.clone(),
            chunk_index: chunk.chunk_index,
            start_page: chunk.start_page,
            token_count: chunk.token_count,
            char_count: chunk.char_count,
            text: chunk.text.clone(),
            embedding,
        }
    }
}

/// One nearest-neighbor hit; ephemeral, produced per query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub doc_id: String,
    pub ticker: String,
    pub fiscal_year: i32,
    pub section_id: String,
    pub chunk_index: usize,
    pub start_page: u32,
    pub text: String,
    pub score: f32,
}

/// Conjunctive equality filters for `search`.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub ticker: Option<String>,
    pub section_id: Option<String>,
    pub fiscal_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub count: u64,
    pub dimension: Option<usize>,
}

/// SQLite-backed vector index. Embeddings live as f32 little-endian BLOBs;
/// search is brute-force cosine over the filtered rows. Each call opens its
/// own connection, so concurrent writers only contend inside SQLite (WAL).
#[derive(Clone)]
pub struct VectorStore {
    path: PathBuf,
}

impl VectorStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.init()?;
        Ok(store)
    }

    fn connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .map_err(|e| TenkError::Store(format!("open {}: {e}", self.path.display())))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(store_err)?;
        Ok(conn)
    }

    fn init(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                ticker TEXT NOT NULL,
                fiscal_year INTEGER NOT NULL,
                section_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                start_page INTEGER NOT NULL,
                token_count INTEGER NOT NULL,
                char_count INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_ticker ON chunks(ticker);
            "#,
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Drops and recreates the chunk table for the given dimension.
    /// Idempotent by replacement: creating over an existing index destroys
    /// its contents.
    pub fn create(&self, dimension: usize) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch("DROP TABLE IF EXISTS chunks;")
            .map_err(store_err)?;
        drop(conn);
        self.init()?;
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('dimension', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![dimension.to_string()],
        )
        .map_err(store_err)?;
        info!(dimension, "created vector index");
        Ok(())
    }

    pub fn dimension(&self) -> Result<Option<usize>> {
        let conn = self.connection()?;
        let value: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'dimension'", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(store_err)?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    /// Appends records. Deliberately does not deduplicate by chunk_id:
    /// re-indexing a document without `delete_by_doc_id` first leaves both
    /// generations retrievable. Idempotent reprocessing is the caller's job.
    pub fn upsert(&self, records: &[IndexedRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let expected = self.dimension()?;
        if let Some(dim) = expected {
            if let Some(bad) = records.iter().find(|r| r.embedding.len() != dim) {
                return Err(TenkError::Store(format!(
                    "record {} has dimension {}, index expects {dim}",
                    bad.chunk_id,
                    bad.embedding.len()
                )));
            }
        }
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(store_err)?;
        for record in records {
            let blob = cast_slice::<f32, u8>(&record.embedding);
            tx.execute(
                "INSERT INTO chunks (doc_id, chunk_id, ticker, fiscal_year, section_id,
                    chunk_index, start_page, token_count, char_count, text, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.doc_id,
                    record.chunk_id,
                    record.ticker,
                    record.fiscal_year,
                    record.section_id,
                    record.chunk_index as i64,
                    record.start_page as i64,
                    record.token_count as i64,
                    record.char_count as i64,
                    record.text,
                    blob,
                ],
            )
            .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        debug!(records = records.len(), "upserted records");
        Ok(records.len())
    }

    /// Filtered brute-force cosine search, descending by score. Rows are
    /// scanned in insertion order and the sort is stable, so score ties keep
    /// insertion order.
    pub fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<RetrievalResult>> {
        if let Some(dim) = self.dimension()? {
            if query_vector.len() != dim {
                return Err(TenkError::Store(format!(
                    "query has dimension {}, index expects {dim}",
                    query_vector.len()
                )));
            }
        }
        let mut sql = String::from(
            "SELECT doc_id, chunk_id, ticker, fiscal_year, section_id, chunk_index,
                    start_page, text, embedding
             FROM chunks WHERE 1=1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(ticker) = &filters.ticker {
            sql.push_str(&format!(" AND ticker = ?{}", args.len() + 1));
            args.push(Box::new(ticker.clone()));
        }
        if let Some(section_id) = &filters.section_id {
            sql.push_str(&format!(" AND section_id = ?{}", args.len() + 1));
            args.push(Box::new(section_id.clone()));
        }
        if let Some(fiscal_year) = filters.fiscal_year {
            sql.push_str(&format!(" AND fiscal_year = ?{}", args.len() + 1));
            args.push(Box::new(fiscal_year));
        }
        sql.push_str(" ORDER BY id");

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&sql).map_err(store_err)?;
        let params = rusqlite::params_from_iter(args.iter().map(|a| a.as_ref()));
        let mut rows = stmt.query(params).map_err(store_err)?;
        let mut hits: Vec<RetrievalResult> = Vec::new();
        while let Some(row) = rows.next().map_err(store_err)? {
            let blob: Vec<u8> = row.get(8).map_err(store_err)?;
            let embedding: &[f32] = try_cast_slice(&blob)
                .map_err(|_| TenkError::Store("invalid embedding blob".into()))?;
            let score = cosine_similarity(query_vector, embedding);
            hits.push(RetrievalResult {
                doc_id: row.get(0).map_err(store_err)?,
                chunk_id: row.get(1).map_err(store_err)?,
                ticker: row.get(2).map_err(store_err)?,
                fiscal_year: row.get(3).map_err(store_err)?,
                section_id: row.get(4).map_err(store_err)?,
                chunk_index: row.get::<_, i64>(5).map_err(store_err)? as usize,
                start_page: row.get::<_, i64>(6).map_err(store_err)? as u32,
                text: row.get(7).map_err(store_err)?,
                score,
            });
        }
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Removes every record for a document; a no-op when the document is
    /// absent.
    pub fn delete_by_doc_id(&self, doc_id: &str) -> Result<usize> {
        let conn = self.connection()?;
        let removed = conn
            .execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id])
            .map_err(store_err)?;
        debug!(doc_id, removed, "deleted document records");
        Ok(removed)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(store_err)?;
        Ok(StoreStats {
            count: count as u64,
            dimension: self.dimension()?,
        })
    }
}

fn store_err(e: rusqlite::Error) -> TenkError {
    TenkError::Store(e.to_string())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut a_norm = 0.0f32;
    let mut b_norm = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}
