use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use tenk_core::ChunkerConfig;
use tenk_llm::{LlmConfig, LlmProvider};
use tenk_rag::{EmbeddingBackendKind, EmbeddingConfig};

const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 200;
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_HASH_DIMENSIONS: usize = 768;

/// Process configuration, read from the environment once at startup and
/// passed into constructors from there.
#[derive(Debug, Clone)]
pub struct TenkConfig {
    pub index_path: PathBuf,
    pub data_dir: PathBuf,
    pub chunker: ChunkerConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub temperature: f32,
}

impl TenkConfig {
    pub fn from_env() -> Result<Self> {
        let provider_name = env::var("TENK_PROVIDER").unwrap_or_else(|_| "local".to_string());
        let provider = LlmProvider::from_str(&provider_name)
            .ok_or_else(|| anyhow!("unknown LLM provider {provider_name}"))?;
        let model =
            env::var("TENK_MODEL").unwrap_or_else(|_| provider.default_model().to_string());
        let max_retries = env_parse("TENK_MAX_RETRIES", DEFAULT_MAX_RETRIES);

        let backend_name =
            env::var("TENK_EMBEDDING_BACKEND").unwrap_or_else(|_| "hash".to_string());
        let backend = EmbeddingBackendKind::from_str(&backend_name)
            .ok_or_else(|| anyhow!("unknown embedding backend {backend_name}"))?;
        let embedding_model = env::var("TENK_EMBEDDING_MODEL")
            .unwrap_or_else(|_| default_embedding_model(backend).to_string());

        Ok(Self {
            index_path: env::var("TENK_INDEX")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("tenk_index.db")),
            data_dir: env::var("TENK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/processed")),
            chunker: ChunkerConfig {
                chunk_size: env_parse("TENK_CHUNK_SIZE", DEFAULT_CHUNK_SIZE),
                overlap: env_parse("TENK_CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP),
            },
            llm: LlmConfig {
                provider,
                model,
                api_key: provider_key(provider),
                base_url: env::var("TENK_BASE_URL").ok(),
                max_retries,
            },
            embedding: EmbeddingConfig {
                backend,
                model: embedding_model,
                api_key: backend_key(backend),
                max_retries,
                hash_dimensions: env_parse("TENK_HASH_DIMENSIONS", DEFAULT_HASH_DIMENSIONS),
            },
            temperature: env_parse("TENK_TEMPERATURE", DEFAULT_TEMPERATURE),
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn provider_key(provider: LlmProvider) -> Option<String> {
    match provider {
        LlmProvider::OpenAi => env::var("OPENAI_API_KEY").ok(),
        LlmProvider::Gemini => env::var("GEMINI_API_KEY").ok(),
        LlmProvider::Local => None,
    }
}

fn backend_key(backend: EmbeddingBackendKind) -> Option<String> {
    match backend {
        EmbeddingBackendKind::OpenAi => env::var("OPENAI_API_KEY").ok(),
        EmbeddingBackendKind::Gemini => env::var("GEMINI_API_KEY").ok(),
        EmbeddingBackendKind::Hash => None,
    }
}

fn default_embedding_model(backend: EmbeddingBackendKind) -> &'static str {
    match backend {
        EmbeddingBackendKind::Hash => "hash",
        EmbeddingBackendKind::OpenAi => "text-embedding-3-large",
        EmbeddingBackendKind::Gemini => "text-embedding-004",
    }
}
