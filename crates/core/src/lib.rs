mod cancel;
mod chunk;
mod document;
mod error;
mod filing;
mod persist;

pub use cancel::CancelToken;
pub use chunk::{count_tokens, window_bounds, Chunk, Chunker, ChunkerConfig};
pub use document::{Document, SectionMeta};
pub use error::{Result, TenkError};
pub use filing::{identify_sections, Filing, Section, SectionInput};
pub use persist::{load_chunks, load_document, save_document, JsonlWriter};
