//! **Dialogue adapter** - transcript in, assistant reply out.
//!
//! Wraps an OpenAI-shape chat completions API. The system directive is
//! supplied by the orchestrator; the adapter carries no reply policy of its
//! own (brevity limits and degraded fallbacks live upstream).

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Stage, VoiceError, VoiceResult};

const DEFAULT_LLM_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_LLM_MODEL: &str = "mixtral-8x7b-32768";
const LLM_TIMEOUT_SECS: u64 = 30;

/// Backend for generating one conversational reply.
#[async_trait]
pub trait DialogueBackend: Send + Sync {
    /// Generate a reply to `transcript` under the given system directive.
    async fn reply(&self, system: &str, transcript: &str) -> VoiceResult<String>;
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

/// Production dialogue backend: Groq chat completions (OpenAI wire shape).
#[derive(Debug, Clone)]
pub struct GroqChat {
    api_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GroqChat {
    /// Build from environment: GROQ_API_KEY (required), LLM_API_URL and
    /// LLM_MODEL (optional overrides).
    pub fn from_env() -> VoiceResult<Self> {
        let api_key = crate::telephony::require_env("GROQ_API_KEY")?;
        let api_url =
            std::env::var("LLM_API_URL").unwrap_or_else(|_| DEFAULT_LLM_URL.to_string());
        let model =
            std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string());
        Self::new(api_url, api_key, model)
    }

    /// Create with explicit config.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(LLM_TIMEOUT_SECS))
            .build()
            .map_err(|e| VoiceError::Config(e.to_string()))?;
        Ok(Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl DialogueBackend for GroqChat {
    async fn reply(&self, system: &str, transcript: &str) -> VoiceResult<String> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: transcript.to_string(),
                },
            ],
        };

        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::transport(Stage::Think, e))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(VoiceError::rejected(Stage::Think, status.as_u16(), text));
        }

        let value: serde_json::Value = res
            .json()
            .await
            .map_err(|e| VoiceError::transport(Stage::Think, e))?;
        Ok(extract_reply(&value))
    }
}

/// Pull the assistant message out of the completions envelope, defaulting
/// to empty when the shape is unexpected.
fn extract_reply(value: &serde_json::Value) -> String {
    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Placeholder dialogue backend for wiring the pipeline without an LLM.
#[derive(Debug, Default)]
pub struct PlaceholderChat {
    /// If set, always reply with this.
    pub response: Option<String>,
}

impl PlaceholderChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(s: impl Into<String>) -> Self {
        Self {
            response: Some(s.into()),
        }
    }
}

#[async_trait]
impl DialogueBackend for PlaceholderChat {
    async fn reply(&self, _system: &str, transcript: &str) -> VoiceResult<String> {
        if let Some(ref r) = self.response {
            return Ok(r.clone());
        }
        Ok(format!("I heard: {transcript}"))
    }
}
