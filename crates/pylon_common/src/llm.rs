//! LLM Backend - chat completions and embeddings
//!
//! One trait covers both endpoints the pipeline needs. The HTTP backend
//! speaks the OpenAI-compatible API with a blocking client; the fake backend
//! replays scripted results so the fallback tiers can be driven in tests.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

use crate::settings::LlmSettings;

/// A single turn in a chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant"
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Fixed sampling configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 1.0,
            max_tokens: 1000,
        }
    }
}

/// Chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
}

/// Chat completion response
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    /// Content of the first choice; None when the provider sent none
    pub text: Option<String>,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn empty() -> Self {
        Self { text: None }
    }

    /// Trimmed content, or None when absent or blank
    pub fn trimmed(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// LLM errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("LLM backend is disabled")]
    Disabled,

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Model API backend
pub trait LlmBackend: Send + Sync {
    /// Send a chat request and return the first choice
    fn chat(&self, request: &ChatRequest) -> Result<LlmResponse, LlmError>;

    /// Embed a single input text
    fn embed(&self, input: &str) -> Result<Vec<f32>, LlmError>;
}

/// HTTP OpenAI-compatible backend
pub struct HttpOpenAiBackend {
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl HttpOpenAiBackend {
    /// Create a backend from settings; the API token must be present
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let api_key = settings.api_key().ok_or_else(|| {
            LlmError::ConfigError(format!("API key env var {} not set", settings.api_key_env))
        })?;
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(settings: &LlmSettings, api_key: impl Into<String>) -> Result<Self, LlmError> {
        if settings.endpoint.trim().is_empty() {
            return Err(LlmError::ConfigError("endpoint is required".to_string()));
        }
        if settings.model.trim().is_empty() {
            return Err(LlmError::ConfigError("model is required".to_string()));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: settings.model.clone(),
            embedding_model: settings.embedding_model.clone(),
            timeout_secs: settings.timeout_secs,
            client,
        })
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value, LlmError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::HttpError(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(LlmError::HttpError(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

impl LlmBackend for HttpOpenAiBackend {
    fn chat(&self, request: &ChatRequest) -> Result<LlmResponse, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.sampling.temperature,
            "top_p": request.sampling.top_p,
            "max_tokens": request.sampling.max_tokens,
        });

        let response_json = self.post("chat/completions", &body)?;
        parse_chat_response(&response_json)
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, LlmError> {
        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": input,
        });

        let response_json = self.post("embeddings", &body)?;
        parse_embedding_response(&response_json)
    }
}

/// Extract choices[0].message.content; a missing choice is malformed, a
/// missing or null content is an empty response
fn parse_chat_response(json: &serde_json::Value) -> Result<LlmResponse, LlmError> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

    let text = message
        .get("content")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(LlmResponse { text })
}

fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>, LlmError> {
    let values = json["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidResponse("No embedding in response".to_string()))?;

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| LlmError::InvalidResponse("Non-numeric embedding value".to_string()))
        })
        .collect()
}

/// Scripted backend for tests and offline runs
///
/// Each queue pops one result per call; the last entry repeats once the
/// queue is down to one. An empty queue answers `Disabled`.
pub struct FakeLlmBackend {
    chat_results: Mutex<Vec<Result<LlmResponse, LlmError>>>,
    embed_results: Mutex<Vec<Result<Vec<f32>, LlmError>>>,
    chat_calls: Mutex<Vec<ChatRequest>>,
    embed_calls: Mutex<Vec<String>>,
}

impl FakeLlmBackend {
    pub fn new(
        chat_results: Vec<Result<LlmResponse, LlmError>>,
        embed_results: Vec<Result<Vec<f32>, LlmError>>,
    ) -> Self {
        Self {
            chat_results: Mutex::new(chat_results),
            embed_results: Mutex::new(embed_results),
            chat_calls: Mutex::new(Vec::new()),
            embed_calls: Mutex::new(Vec::new()),
        }
    }

    /// Every chat call answers with `text`
    pub fn always_reply(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(LlmResponse::text(text))], Vec::new())
    }

    /// Every chat and embedding call fails with `error`
    pub fn always_error(error: LlmError) -> Self {
        Self::new(vec![Err(error.clone())], vec![Err(error)])
    }

    /// Chat replies in order, then the last one repeats
    pub fn replies(chat_results: Vec<Result<LlmResponse, LlmError>>) -> Self {
        Self::new(chat_results, Vec::new())
    }

    /// Every embedding call returns `vector`
    pub fn always_embed(vector: Vec<f32>) -> Self {
        Self::new(Vec::new(), vec![Ok(vector)])
    }

    pub fn with_embeddings(mut self, embed_results: Vec<Result<Vec<f32>, LlmError>>) -> Self {
        self.embed_results = Mutex::new(embed_results);
        self
    }

    pub fn chat_calls(&self) -> Vec<ChatRequest> {
        lock(&self.chat_calls).clone()
    }

    pub fn embed_calls(&self) -> Vec<String> {
        lock(&self.embed_calls).clone()
    }
}

impl LlmBackend for FakeLlmBackend {
    fn chat(&self, request: &ChatRequest) -> Result<LlmResponse, LlmError> {
        lock(&self.chat_calls).push(request.clone());
        next_scripted(&self.chat_results)
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, LlmError> {
        lock(&self.embed_calls).push(input.to_string());
        next_scripted(&self.embed_results)
    }
}

fn next_scripted<T: Clone>(queue: &Mutex<Vec<Result<T, LlmError>>>) -> Result<T, LlmError> {
    let mut queue = lock(queue);
    match queue.len() {
        0 => Err(LlmError::Disabled),
        1 => queue[0].clone(),
        _ => queue.remove(0),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response_content() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "refund_request"}}]
        });
        let response = parse_chat_response(&json).unwrap();
        assert_eq!(response.text.as_deref(), Some("refund_request"));
    }

    #[test]
    fn test_parse_chat_response_null_content_is_empty() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        });
        let response = parse_chat_response(&json).unwrap();
        assert!(response.text.is_none());
        assert!(response.trimmed().is_none());
    }

    #[test]
    fn test_parse_chat_response_without_choices_is_invalid() {
        let json = serde_json::json!({"choices": []});
        assert!(matches!(parse_chat_response(&json), Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_embedding_response() {
        let json = serde_json::json!({"data": [{"embedding": [0.5, -1.0, 2.0]}]});
        assert_eq!(parse_embedding_response(&json).unwrap(), vec![0.5, -1.0, 2.0]);

        let bad = serde_json::json!({"data": [{"embedding": ["x"]}]});
        assert!(parse_embedding_response(&bad).is_err());

        let missing = serde_json::json!({"data": []});
        assert!(parse_embedding_response(&missing).is_err());
    }

    #[test]
    fn test_trimmed_ignores_whitespace_only() {
        assert!(LlmResponse::text("  \n ").trimmed().is_none());
        assert_eq!(LlmResponse::text("  ok ").trimmed(), Some("ok"));
    }

    #[test]
    fn test_http_backend_requires_model() {
        let settings = LlmSettings {
            model: String::new(),
            ..Default::default()
        };
        let result = HttpOpenAiBackend::with_api_key(&settings, "token");
        assert!(matches!(result, Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn test_http_backend_requires_api_key() {
        let settings = LlmSettings {
            api_key_env: "PYLON_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        let result = HttpOpenAiBackend::new(&settings);
        assert!(matches!(result, Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn test_fake_backend_sequence_then_repeat() {
        let backend = FakeLlmBackend::replies(vec![
            Err(LlmError::Timeout(30)),
            Ok(LlmResponse::text("second")),
        ]);
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            sampling: SamplingParams::default(),
        };

        assert!(backend.chat(&request).is_err());
        assert_eq!(backend.chat(&request).unwrap().text.as_deref(), Some("second"));
        assert_eq!(backend.chat(&request).unwrap().text.as_deref(), Some("second"));
        assert_eq!(backend.chat_calls().len(), 3);
    }

    #[test]
    fn test_fake_backend_empty_queue_is_disabled() {
        let backend = FakeLlmBackend::always_reply("x");
        assert_eq!(backend.embed("query"), Err(LlmError::Disabled));
        assert_eq!(backend.embed_calls(), vec!["query".to_string()]);
    }
}
