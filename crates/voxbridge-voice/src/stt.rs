//! **Speech-to-Text adapter** - audio bytes in, best-effort transcript out.
//!
//! A single timeout-bounded call, no retry, no policy: deciding what an
//! empty or failed transcript means belongs to the orchestrator.

use async_trait::async_trait;

use crate::error::{Stage, VoiceError, VoiceResult};

const DEFAULT_STT_URL: &str = "https://api.deepgram.com/v1/listen";
const STT_TIMEOUT_SECS: u64 = 30;

/// Backend for converting recorded audio to text. An empty string is a
/// valid result (silence or noise), not an error.
#[async_trait]
pub trait TranscribeBackend: Send + Sync {
    /// Transcribe one utterance of raw WAV audio.
    async fn transcribe(&self, audio: &[u8]) -> VoiceResult<String>;
}

/// Production STT backend: Deepgram prerecorded listen API.
#[derive(Debug, Clone)]
pub struct DeepgramStt {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl DeepgramStt {
    /// Build from environment: DEEPGRAM_API_KEY (required), STT_API_URL (optional override).
    pub fn from_env() -> VoiceResult<Self> {
        let api_key = crate::telephony::require_env("DEEPGRAM_API_KEY")?;
        let api_url =
            std::env::var("STT_API_URL").unwrap_or_else(|_| DEFAULT_STT_URL.to_string());
        Self::new(api_url, api_key)
    }

    /// Create with explicit config.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(STT_TIMEOUT_SECS))
            .build()
            .map_err(|e| VoiceError::Config(e.to_string()))?;
        Ok(Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl TranscribeBackend for DeepgramStt {
    async fn transcribe(&self, audio: &[u8]) -> VoiceResult<String> {
        if audio.is_empty() {
            return Ok(String::new());
        }
        let res = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| VoiceError::transport(Stage::Transcribe, e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::rejected(
                Stage::Transcribe,
                status.as_u16(),
                body,
            ));
        }

        let value: serde_json::Value = res
            .json()
            .await
            .map_err(|e| VoiceError::transport(Stage::Transcribe, e))?;
        Ok(extract_transcript(&value))
    }
}

/// Pull the transcript out of the listen-API envelope, defaulting to empty
/// when any level of the nesting is absent or malformed.
fn extract_transcript(value: &serde_json::Value) -> String {
    value
        .get("results")
        .and_then(|r| r.get("channels"))
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("alternatives"))
        .and_then(|a| a.get(0))
        .and_then(|a| a.get("transcript"))
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Placeholder STT: returns a fixed transcript. Use for wiring the pipeline
/// without a speech backend.
#[derive(Debug, Default)]
pub struct PlaceholderStt {
    /// If set, return this instead of an empty transcript.
    pub response: Option<String>,
}

impl PlaceholderStt {
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
impl TranscribeBackend for PlaceholderStt {
    async fn transcribe(&self, _audio: &[u8]) -> VoiceResult<String> {
        Ok(self.response.clone().unwrap_or_default())
    }
}
