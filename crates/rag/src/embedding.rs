use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

use tenk_core::{Result, TenkError};

const OPENAI_DIMENSION: usize = 3072;
const GEMINI_DIMENSION: usize = 768;

/// Explicit adapter configuration; one backend is selected at construction
/// time, never by per-call branching.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackendKind,
    pub model: String,
    pub api_key: Option<String>,
    pub max_retries: u32,
    /// Output dimension for the hash backend; remote backends fix their own.
    pub hash_dimensions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackendKind {
    Hash,
    OpenAi,
    Gemini,
}

impl EmbeddingBackendKind {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "hash" => Some(Self::Hash),
            "openai" => Some(Self::OpenAi),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }
}

impl EmbeddingConfig {
    pub fn hash(dimensions: usize) -> Self {
        Self {
            backend: EmbeddingBackendKind::Hash,
            model: "hash".to_string(),
            api_key: None,
            max_retries: 3,
            hash_dimensions: dimensions,
        }
    }
}

#[derive(Clone)]
pub struct EmbeddingClient {
    backend: Backend,
    max_retries: u32,
}

#[derive(Clone)]
enum Backend {
    Hash(HashEmbedder),
    OpenAi {
        http: Client,
        model: String,
        api_key: String,
    },
    Gemini {
        http: Client,
        model: String,
        api_key: String,
    },
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let backend = match config.backend {
            EmbeddingBackendKind::Hash => Backend::Hash(HashEmbedder::new(config.hash_dimensions)),
            EmbeddingBackendKind::OpenAi => Backend::OpenAi {
                http: Client::new(),
                model: config.model.clone(),
                api_key: require_key(&config, "openai")?,
            },
            EmbeddingBackendKind::Gemini => Backend::Gemini {
                http: Client::new(),
                model: config.model.clone(),
                api_key: require_key(&config, "gemini")?,
            },
        };
        Ok(Self {
            backend,
            max_retries: config.max_retries,
        })
    }

    /// Fixed output dimension of the selected backend.
    pub fn dimension(&self) -> usize {
        match &self.backend {
            Backend::Hash(embedder) => embedder.dimensions,
            Backend::OpenAi { .. } => OPENAI_DIMENSION,
            Backend::Gemini { .. } => GEMINI_DIMENSION,
        }
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut output = self.embed_batch(&[text.to_string()])?;
        output
            .pop()
            .ok_or_else(|| TenkError::Embedding("empty embedding batch result".into()))
    }

    /// Order-preserving batch embedding; a single text embedded alone yields
    /// the same vector as inside a batch. After the retry budget is
    /// exhausted the whole batch fails; no partial result is returned.
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(bad) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(TenkError::Embedding(format!(
                "cannot embed empty text (batch position {bad})"
            )));
        }
        match &self.backend {
            Backend::Hash(embedder) => {
                Ok(texts.iter().map(|t| embedder.embed_text(t)).collect())
            }
            Backend::OpenAi {
                http,
                model,
                api_key,
            } => self.with_retries(|| openai_embed(http, model, api_key, texts)),
            Backend::Gemini {
                http,
                model,
                api_key,
            } => self.with_retries(|| gemini_embed(http, model, api_key, texts)),
        }
    }

    fn with_retries(&self, call: impl Fn() -> Result<Vec<Vec<f32>>>) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match call() {
                Ok(vectors) => return Ok(vectors),
                Err(err) if err.is_retryable() && attempt <= self.max_retries => {
                    warn!(attempt, %err, "embedding call failed, backing off");
                    thread::sleep(backoff_delay(attempt));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(500u64 << attempt.min(6))
}

fn require_key(config: &EmbeddingConfig, provider: &str) -> Result<String> {
    config
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| TenkError::Config(format!("{provider} embedding API key is not set")))
}

fn classify(status: StatusCode, provider: &str) -> Option<TenkError> {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            Some(TenkError::Transient(format!("{provider} rate limited")))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Some(TenkError::Auth(format!("{provider} rejected the API key")))
        }
        StatusCode::PAYMENT_REQUIRED => {
            Some(TenkError::Quota(format!("{provider} quota exhausted")))
        }
        status if status.is_server_error() => Some(TenkError::Transient(format!(
            "{provider} server error: {status}"
        ))),
        status if !status.is_success() => Some(TenkError::Embedding(format!(
            "{provider} embeddings request failed: {status}"
        ))),
        _ => None,
    }
}

fn openai_embed(
    http: &Client,
    model: &str,
    api_key: &str,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let payload = serde_json::json!({ "model": model, "input": texts });
    let response = http
        .post("https://api.openai.com/v1/embeddings")
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .map_err(|e| TenkError::Transient(format!("openai embeddings request failed: {e}")))?;
    if let Some(err) = classify(response.status(), "openai") {
        return Err(err);
    }
    let parsed: OpenAiEmbeddingResponse = response
        .json()
        .map_err(|e| TenkError::Embedding(format!("failed to decode openai embeddings: {e}")))?;
    if parsed.data.len() != texts.len() {
        return Err(TenkError::Embedding(format!(
            "openai returned {} embeddings for {} inputs",
            parsed.data.len(),
            texts.len()
        )));
    }
    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

fn gemini_embed(
    http: &Client,
    model: &str,
    api_key: &str,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let requests: Vec<_> = texts
        .iter()
        .map(|text| {
            serde_json::json!({
                "model": format!("models/{model}"),
                "content": { "parts": [ { "text": text } ] },
                "taskType": "RETRIEVAL_DOCUMENT",
            })
        })
        .collect();
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{model}:batchEmbedContents?key={api_key}"
    );
    let response = http
        .post(url)
        .json(&serde_json::json!({ "requests": requests }))
        .send()
        .map_err(|e| TenkError::Transient(format!("gemini embeddings request failed: {e}")))?;
    if let Some(err) = classify(response.status(), "gemini") {
        return Err(err);
    }
    let parsed: GeminiEmbeddingResponse = response
        .json()
        .map_err(|e| TenkError::Embedding(format!("failed to decode gemini embeddings: {e}")))?;
    if parsed.embeddings.len() != texts.len() {
        return Err(TenkError::Embedding(format!(
            "gemini returned {} embeddings for {} inputs",
            parsed.embeddings.len(),
            texts.len()
        )));
    }
    Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
}

/// Deterministic bag-of-buckets embedder for offline runs and tests.
#[derive(Clone)]
pub struct HashEmbedder {
    dimensions: usize,
    seed: u64,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            seed: 1337,
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        for token in text.split_whitespace() {
            let bucket = self.bucket_for(token);
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        vector
    }

    fn bucket_for(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        hasher.write_u64(self.seed);
        token.to_lowercase().hash(&mut hasher);
        (hasher.finish() as usize) % self.dimensions
    }
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct GeminiEmbeddingResponse {
    embeddings: Vec<GeminiEmbeddingValues>,
}

#[derive(Deserialize)]
struct GeminiEmbeddingValues {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_client() -> EmbeddingClient {
        EmbeddingClient::new(EmbeddingConfig::hash(64)).unwrap()
    }

    #[test]
    fn single_and_batched_embeddings_match() {
        let client = hash_client();
        let alone = client.embed("risk factors and competition").unwrap();
        let batch = client
            .embed_batch(&[
                "management discussion".to_string(),
                "risk factors and competition".to_string(),
            ])
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], alone);
    }

    #[test]
    fn empty_text_is_rejected() {
        let client = hash_client();
        assert!(matches!(client.embed(""), Err(TenkError::Embedding(_))));
        assert!(matches!(
            client.embed_batch(&["ok".to_string(), "  ".to_string()]),
            Err(TenkError::Embedding(_))
        ));
    }

    #[test]
    fn empty_batch_is_fine() {
        let client = hash_client();
        assert!(client.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn hash_vectors_are_unit_norm_and_fixed_dimension() {
        let client = hash_client();
        let vector = client.embed("revenue growth and margins").unwrap();
        assert_eq!(vector.len(), client.dimension());
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn remote_backend_without_key_is_a_config_error() {
        let config = EmbeddingConfig {
            backend: EmbeddingBackendKind::OpenAi,
            model: "text-embedding-3-large".into(),
            api_key: None,
            max_retries: 3,
            hash_dimensions: 64,
        };
        assert!(matches!(
            EmbeddingClient::new(config),
            Err(TenkError::Config(_))
        ));
    }
}
