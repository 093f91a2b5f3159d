use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use tokio::time::{sleep, Duration};
use tracing::warn;

use tenk_core::{Result, TenkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Gemini,
    Local,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Gemini => "gemini",
            LlmProvider::Local => "local",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "openai" => Some(LlmProvider::OpenAi),
            "gemini" => Some(LlmProvider::Gemini),
            "local" => Some(LlmProvider::Local),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::Gemini => "gemini-1.5-pro",
            LlmProvider::Local => "local",
        }
    }
}

/// Explicit adapter configuration; credentials are scoped to the client
/// instance rather than set process-wide.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn local() -> Self {
        Self {
            provider: LlmProvider::Local,
            model: "local".to_string(),
            api_key: None,
            base_url: None,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: Some(system.into()),
            user: user.into(),
            temperature,
            max_tokens: Some(4000),
        }
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    config: LlmConfig,
    provider: ProviderConfig,
}

#[derive(Clone)]
enum ProviderConfig {
    OpenAi { api_key: String, base_url: String },
    Gemini { api_key: String },
    Local,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let provider = match config.provider {
            LlmProvider::OpenAi => ProviderConfig::OpenAi {
                api_key: require_key(&config, "openai")?,
                base_url: config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            },
            LlmProvider::Gemini => ProviderConfig::Gemini {
                api_key: require_key(&config, "gemini")?,
            },
            LlmProvider::Local => ProviderConfig::Local,
        };
        Ok(Self {
            http: Client::new(),
            config,
            provider,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn generate(&self, req: &GenerationRequest) -> Result<String> {
        match &self.provider {
            ProviderConfig::OpenAi { api_key, base_url } => {
                self.generate_openai(api_key, base_url, req).await
            }
            ProviderConfig::Gemini { api_key } => self.generate_gemini(api_key, req).await,
            ProviderConfig::Local => Ok(synthesize_local_response(req)),
        }
    }

    /// Convenience for the synchronous pipeline: one blocking round-trip.
    pub fn generate_blocking(&self, req: &GenerationRequest) -> Result<String> {
        let rt = Runtime::new()
            .map_err(|e| TenkError::Config(format!("failed to create tokio runtime: {e}")))?;
        rt.block_on(self.generate(req))
    }

    async fn generate_openai(
        &self,
        api_key: &str,
        base_url: &str,
        req: &GenerationRequest,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": req.user}));
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": req.temperature,
        });
        if let Some(max_tokens) = req.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let response = match self
                .http
                .post(&url)
                .bearer_auth(api_key)
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt > self.config.max_retries {
                        return Err(TenkError::Transient(format!("openai request failed: {err}")));
                    }
                    warn!(attempt, "openai request failed, backing off");
                    sleep(backoff_delay(attempt, None)).await;
                    continue;
                }
            };
            let status = response.status();
            match classify_status(status) {
                StatusClass::RateLimited | StatusClass::ServerError => {
                    if attempt > self.config.max_retries {
                        return Err(TenkError::Transient(format!(
                            "openai returned {status} after {} retries",
                            self.config.max_retries
                        )));
                    }
                    let wait = backoff_delay(attempt, response.headers().get("retry-after"));
                    warn!(attempt, %status, "openai returned a retryable status, backing off");
                    sleep(wait).await;
                    continue;
                }
                StatusClass::Auth => {
                    return Err(TenkError::Auth("openai rejected the API key".into()))
                }
                StatusClass::Quota => {
                    return Err(TenkError::Quota("openai quota exhausted".into()))
                }
                StatusClass::Ok => {}
            }
            let value = decode_body(response, "openai").await?;
            return extract_chat_text(&value)
                .ok_or_else(|| TenkError::Generation("missing text in OpenAI response".into()));
        }
    }

    async fn generate_gemini(&self, api_key: &str, req: &GenerationRequest) -> Result<String> {
        // Gemini has no separate system role here; the system prompt is
        // folded in front of the user prompt.
        let mut prompt = String::new();
        if let Some(system) = &req.system {
            prompt.push_str(system.trim());
            prompt.push_str("\n\n");
        }
        prompt.push_str(&req.user);
        let mut generation_config = json!({ "temperature": req.temperature });
        if let Some(max_tokens) = req.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }
        let payload = json!({
            "contents": [ { "parts": [ { "text": prompt } ] } ],
            "generationConfig": generation_config,
        });
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.config.model, api_key
        );
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let response = match self.http.post(&url).json(&payload).send().await {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt > self.config.max_retries {
                        return Err(TenkError::Transient(format!("gemini request failed: {err}")));
                    }
                    warn!(attempt, "gemini request failed, backing off");
                    sleep(backoff_delay(attempt, None)).await;
                    continue;
                }
            };
            let status = response.status();
            match classify_status(status) {
                StatusClass::RateLimited | StatusClass::ServerError => {
                    if attempt > self.config.max_retries {
                        return Err(TenkError::Transient(format!(
                            "gemini returned {status} after {} retries",
                            self.config.max_retries
                        )));
                    }
                    let wait = backoff_delay(attempt, response.headers().get("retry-after"));
                    warn!(attempt, %status, "gemini returned a retryable status, backing off");
                    sleep(wait).await;
                    continue;
                }
                StatusClass::Auth => {
                    return Err(TenkError::Auth("gemini rejected the API key".into()))
                }
                StatusClass::Quota => {
                    return Err(TenkError::Quota("gemini quota exhausted".into()))
                }
                StatusClass::Ok => {}
            }
            let body = response
                .json::<GeminiResponse>()
                .await
                .map_err(|e| TenkError::Generation(format!("failed to decode gemini response: {e}")))?;
            return body
                .candidates
                .and_then(|mut c| c.pop())
                .and_then(|candidate| candidate.content.parts.into_iter().find_map(|p| p.text))
                .ok_or_else(|| TenkError::Generation("missing text in Gemini response".into()));
        }
    }
}

enum StatusClass {
    Ok,
    RateLimited,
    ServerError,
    Auth,
    Quota,
}

fn classify_status(status: StatusCode) -> StatusClass {
    match status {
        StatusCode::TOO_MANY_REQUESTS => StatusClass::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StatusClass::Auth,
        StatusCode::PAYMENT_REQUIRED => StatusClass::Quota,
        status if status.is_server_error() => StatusClass::ServerError,
        _ => StatusClass::Ok,
    }
}

fn require_key(config: &LlmConfig, provider: &str) -> Result<String> {
    config
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| TenkError::Config(format!("{provider} API key is not set")))
}

fn backoff_delay(attempt: u32, retry_after: Option<&HeaderValue>) -> Duration {
    if let Some(value) = retry_after {
        if let Ok(text) = value.to_str() {
            if let Ok(secs) = text.parse::<u64>() {
                return Duration::from_secs(secs.max(1));
            }
        }
    }
    let capped = attempt.min(6);
    Duration::from_secs(1u64 << capped)
}

async fn decode_body(response: reqwest::Response, provider: &str) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(TenkError::Generation(format!(
            "{provider} returned error (status {status}): {body}"
        )));
    }
    serde_json::from_str(&body)
        .map_err(|e| TenkError::Generation(format!("failed to decode {provider} response: {e}")))
}

fn extract_chat_text(value: &Value) -> Option<String> {
    let choices = value.get("choices")?.as_array()?;
    let message = choices.first()?.get("message")?;
    message.get("content")?.as_str().map(|s| s.to_string())
}

/// Deterministic offline responder. Echoes a bounded extract of the prompt so
/// the pipeline stays runnable (and testable) without credentials.
fn synthesize_local_response(req: &GenerationRequest) -> String {
    let cleaned = req
        .user
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join(" ");
    cleaned
        .split_whitespace()
        .take(120)
        .collect::<Vec<&str>>()
        .join(" ")
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_provider_needs_no_key() {
        let client = LlmClient::new(LlmConfig::local()).unwrap();
        let req = GenerationRequest::new("system", "Summarize:\n  revenue grew\n", 0.1);
        let text = client.generate_blocking(&req).unwrap();
        assert!(text.contains("revenue grew"));
    }

    #[test]
    fn remote_provider_without_key_is_a_config_error() {
        let config = LlmConfig {
            provider: LlmProvider::OpenAi,
            model: "gpt-4o-mini".into(),
            api_key: None,
            base_url: None,
            max_retries: 3,
        };
        assert!(matches!(
            LlmClient::new(config),
            Err(TenkError::Config(_))
        ));
    }

    #[test]
    fn backoff_honors_retry_after_header() {
        let header = HeaderValue::from_static("7");
        assert_eq!(backoff_delay(1, Some(&header)), Duration::from_secs(7));
        assert_eq!(backoff_delay(2, None), Duration::from_secs(4));
    }

    #[test]
    fn server_errors_classify_as_retryable() {
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            StatusClass::ServerError
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            StatusClass::ServerError
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            StatusClass::RateLimited
        ));
        assert!(matches!(classify_status(StatusCode::OK), StatusClass::Ok));
    }

    #[test]
    fn chat_text_extraction() {
        let value = json!({
            "choices": [ { "message": { "content": "HOLD with MEDIUM confidence" } } ]
        });
        assert_eq!(
            extract_chat_text(&value).unwrap(),
            "HOLD with MEDIUM confidence"
        );
    }
}
