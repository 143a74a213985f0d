use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::kernel::error::CallError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Network-level backstop. The controller enforces its own per-call timeouts.
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 1024,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("CONCIERGE_LLM_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("CONCIERGE_LLM_MODEL") {
            config.model = model;
        }
        config.api_key = std::env::var("CONCIERGE_LLM_API_KEY").ok().filter(|k| !k.is_empty());
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("LLM server error: {0}")]
    Status(u16),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid JSON in model output: {0}")]
    InvalidJson(String),

    #[error("model returned an empty response")]
    EmptyResponse,
}

impl From<LlmError> for CallError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::InvalidJson(_) | LlmError::EmptyResponse => CallError::Schema(err.to_string()),
            LlmError::Timeout(after) => CallError::Timeout(after),
            LlmError::Http(_) | LlmError::Status(_) => CallError::Backend(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client in JSON mode.
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(config.request_timeout)
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// One-shot call. The model must answer with a single JSON object.
    pub async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<Value, LlmError> {
        let request_body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: user_prompt },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let mut request = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.endpoint.trim_end_matches('/')))
            .json(&request_body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.config.request_timeout)
            } else {
                LlmError::Http(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(LlmError::Status(response.status().as_u16()));
        }

        let body: ChatResponse = response.json().await.map_err(|e| LlmError::Http(e.to_string()))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        parse_json_content(&content)
    }
}

/// Models sometimes wrap JSON in a markdown fence. Strip it before parsing.
pub fn parse_json_content(content: &str) -> Result<Value, LlmError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: Value = serde_json::from_str(unfenced).map_err(|e| LlmError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(LlmError::InvalidJson("expected a JSON object".to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_json() {
        let v = parse_json_content("```json\n{\"intent\": \"greet\"}\n```").unwrap();
        assert_eq!(v["intent"], "greet");
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(matches!(parse_json_content("[1, 2]"), Err(LlmError::InvalidJson(_))));
        assert!(matches!(parse_json_content("   "), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(CallError::from(LlmError::EmptyResponse), CallError::Schema(_)));
        assert!(matches!(CallError::from(LlmError::Status(503)), CallError::Backend(_)));
    }
}
