//! LLM insight client supporting Anthropic and OpenAI backends
//!
//! Uses ureq (sync HTTP); the orchestrator runs it on a worker thread.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::prompt::{SYSTEM_PROMPT, build_prompt, parse_reply};
use super::{Insight, InsightError, InsightProvider, InsightRequest, InsightResult};
use crate::config::InsightConfig;

/// Supported LLM backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
}

impl LlmBackend {
    pub fn env_key(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
            LlmBackend::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "claude-sonnet-4-20250514",
            LlmBackend::OpenAi => "gpt-4o",
        }
    }

    pub fn api_url(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "https://api.anthropic.com/v1/messages",
            LlmBackend::OpenAi => "https://api.openai.com/v1/chat/completions",
        }
    }
}

/// Insight provider backed by a hosted chat model
pub struct LlmInsightProvider {
    backend: LlmBackend,
    model: String,
    max_tokens: u32,
    api_key: String,
    agent: ureq::Agent,
}

fn make_agent(timeout: Duration) -> ureq::Agent {
    ureq::config::Config::builder()
        .http_status_as_error(false) // status codes are mapped to InsightError::Api below
        .timeout_global(Some(timeout))
        .build()
        .new_agent()
}

impl LlmInsightProvider {
    pub fn new(config: &InsightConfig, api_key: impl Into<String>) -> Self {
        Self {
            backend: config.backend,
            model: config.model().to_string(),
            max_tokens: config.max_tokens,
            api_key: api_key.into(),
            agent: make_agent(config.timeout()),
        }
    }

    pub fn from_env(config: &InsightConfig) -> InsightResult<Self> {
        let env_key = config.backend.env_key();
        let api_key = env::var(env_key)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| InsightError::MissingApiKey {
                env_var: env_key.to_string(),
            })?;
        Ok(Self::new(config, api_key))
    }

    fn complete(&self, prompt: String) -> InsightResult<String> {
        match self.backend {
            LlmBackend::OpenAi => self.complete_openai(prompt),
            LlmBackend::Anthropic => self.complete_anthropic(prompt),
        }
    }

    fn complete_openai(&self, prompt: String) -> InsightResult<String> {
        let body = OpenAiRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: 0.2,
        };

        let response = self
            .agent
            .post(self.backend.api_url())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&body)
            .map_err(|e| InsightError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.into_body().read_to_string().unwrap_or_default();
            return Err(InsightError::Api { status, message });
        }

        let resp: OpenAiResponse = response
            .into_body()
            .read_json()
            .map_err(|e| InsightError::Parse(e.to_string()))?;

        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| InsightError::Parse("No response choices".to_string()))
    }

    fn complete_anthropic(&self, prompt: String) -> InsightResult<String> {
        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.2,
        };

        let response = self
            .agent
            .post(self.backend.api_url())
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .send_json(&body)
            .map_err(|e| InsightError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.into_body().read_to_string().unwrap_or_default();
            return Err(InsightError::Api { status, message });
        }

        let resp: AnthropicResponse = response
            .into_body()
            .read_json()
            .map_err(|e| InsightError::Parse(e.to_string()))?;

        resp.content
            .into_iter()
            .find(|c| c.content_type == "text")
            .map(|c| c.text)
            .ok_or_else(|| InsightError::Parse("No text content in response".to_string()))
    }
}

impl InsightProvider for LlmInsightProvider {
    fn generate(&self, request: &InsightRequest) -> InsightResult<Insight> {
        let reply = self.complete(build_prompt(request))?;
        parse_reply(&reply)
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

// OpenAI API types
#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

// Anthropic API types
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}
