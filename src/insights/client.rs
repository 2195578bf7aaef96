//! Text-generation service clients.
//!
//! Provides a small async trait over the hosted Gemini API and a local
//! Ollama server. Both send one system + user prompt and return the raw
//! response text; interpreting it is the job of [`super::schema`].

use crate::config::{LlmConfig, LlmProvider};
use crate::error::ServiceError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A prompt-in, text-out generation backend.
#[async_trait]
pub trait TextService: Send + Sync {
    /// Model identifier shown in the report metadata.
    fn model_name(&self) -> &str;

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ServiceError>;
}

/// Build the configured service.
pub fn build_service(config: &LlmConfig) -> Result<Arc<dyn TextService>> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()
        .context("Failed to create HTTP client")?;

    let service: Arc<dyn TextService> = match config.provider {
        LlmProvider::Gemini => {
            let api_key = config
                .api_key
                .clone()
                .context("GEMINI_API_KEY is not set")?;
            Arc::new(GeminiService::new(http_client, config, api_key))
        }
        LlmProvider::Ollama => Arc::new(OllamaService::new(http_client, config)),
    };

    info!(
        "Using {:?} text service with model {}",
        config.provider,
        service.model_name()
    );
    Ok(service)
}

fn map_send_error(e: reqwest::Error, timeout_seconds: u64, endpoint: &str) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout(timeout_seconds)
    } else if e.is_connect() {
        ServiceError::Connect(endpoint.to_string())
    } else {
        ServiceError::Request(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Gemini

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

/// Google Gemini `generateContent` client.
pub struct GeminiService {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    timeout_seconds: u64,
}

impl GeminiService {
    pub fn new(http_client: reqwest::Client, config: &LlmConfig, api_key: String) -> Self {
        Self {
            http_client,
            base_url: config.gemini_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn request_body(&self, system: &str, prompt: &str) -> GeminiRequest {
        GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: system.to_string(),
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                response_mime_type: "application/json",
            },
        }
    }
}

#[async_trait]
impl TextService for GeminiService {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ServiceError> {
        let url = self.endpoint();
        debug!("Sending {} prompt chars to Gemini", prompt.len());

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(system, prompt))
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_seconds, &self.base_url))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api { status, body });
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        gemini_text(parsed)
    }
}

fn gemini_text(response: GeminiResponse) -> Result<String, ServiceError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ServiceError::EmptyResponse);
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Ollama

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Local Ollama `/api/chat` client.
pub struct OllamaService {
    http_client: reqwest::Client,
    ollama_url: String,
    model: String,
    temperature: f32,
    timeout_seconds: u64,
}

impl OllamaService {
    pub fn new(http_client: reqwest::Client, config: &LlmConfig) -> Self {
        Self {
            http_client,
            ollama_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        }
    }
}

#[async_trait]
impl TextService for OllamaService {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ServiceError> {
        let url = format!("{}/api/chat", self.ollama_url);

        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_seconds, &self.ollama_url))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        if chat_response.message.content.trim().is_empty() {
            return Err(ServiceError::EmptyResponse);
        }
        Ok(chat_response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_request_shape() {
        let config = LlmConfig::default();
        let service = GeminiService::new(reqwest::Client::new(), &config, "k".to_string());
        let body = serde_json::to_value(service.request_body("sys", "hello")).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(
            service.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_gemini_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"[1,"},{"text":"2]"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(gemini_text(response).unwrap(), "[1,2]");
    }

    #[test]
    fn test_gemini_text_empty_is_error() {
        let response: GeminiResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(gemini_text(response), Err(ServiceError::EmptyResponse));

        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(gemini_text(response), Err(ServiceError::EmptyResponse));
    }

    #[test]
    fn test_build_service_requires_gemini_key() {
        let config = LlmConfig::default();
        assert!(build_service(&config).is_err());

        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            model: "llama3.2".to_string(),
            ..LlmConfig::default()
        };
        let service = build_service(&config).unwrap();
        assert_eq!(service.model_name(), "llama3.2");
    }
}
