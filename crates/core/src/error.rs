use thiserror::Error;

#[derive(Error, Debug)]
pub enum TenkError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("transient service error: {0}")]
    Transient(String),
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("quota exhausted: {0}")]
    Quota(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TenkError>;

impl TenkError {
    /// True for failures that a bounded-backoff retry loop may attempt again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TenkError::Transient(_))
    }
}

impl From<anyhow::Error> for TenkError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}
