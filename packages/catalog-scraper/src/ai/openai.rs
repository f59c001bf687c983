//! OpenAI-compatible chat completion client.
//!
//! Works against any endpoint that speaks the `/chat/completions` protocol.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::{Config, SecretString};
use crate::error::{AiError, AiResult};
use crate::traits::ai::TextGenerator;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`TextGenerator`] backed by a chat completion endpoint.
#[derive(Clone)]
pub struct OpenAiTextGenerator {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    temperature: Option<f32>,
}

impl OpenAiTextGenerator {
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
        }
    }

    /// Build from loaded configuration. Fails when no API key is set.
    pub fn from_config(config: &Config) -> AiResult<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| AiError::NotConfigured("OPENAI_API_KEY is not set".into()))?;
        Ok(Self::new(api_key).with_model(config.summary_model.clone()))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at another OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        }
    }
}

/// First choice's content, or an error when the reply has none.
fn first_choice(body: &str) -> AiResult<String> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| AiError::Parse(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| AiError::Api("No response from model".into()))
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    async fn generate(&self, prompt: &str) -> AiResult<String> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Chat completion request failed");
                if e.is_timeout() {
                    AiError::Timeout
                } else {
                    AiError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;
        if !status.is_success() {
            warn!(status = %status, error = %body, "Chat completion API error");
            return Err(AiError::Api(format!("{status}: {body}")));
        }

        let content = first_choice(&body)?;
        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis(),
            "Chat completion"
        );
        Ok(content)
    }
}
