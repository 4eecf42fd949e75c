//! **Speech synthesis adapter** - reply text in, encoded audio out.
//!
//! Returns an [`AudioClip`]: the encoded bytes plus the codec descriptor the
//! artifact store and the telephony layer need to serve it back.

use async_trait::async_trait;

use crate::error::{Stage, VoiceError, VoiceResult};

const DEFAULT_TTS_URL: &str = "https://api.cartesia.ai/tts";
const DEFAULT_TTS_VOICE: &str = "sonic-english";
const TTS_TIMEOUT_SECS: u64 = 60;

/// Audio container for a synthesized clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    Mp3,
    Wav,
}

impl AudioContainer {
    pub fn content_type(&self) -> &'static str {
        match self {
            AudioContainer::Mp3 => "audio/mpeg",
            AudioContainer::Wav => "audio/wav",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioContainer::Mp3 => "mp3",
            AudioContainer::Wav => "wav",
        }
    }

    /// API-facing name of the output format.
    pub fn format_name(&self) -> &'static str {
        match self {
            AudioContainer::Mp3 => "mp3",
            AudioContainer::Wav => "wav",
        }
    }
}

/// Codec/sample-rate descriptor for a synthesized clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub container: AudioContainer,
    pub sample_rate: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            container: AudioContainer::Mp3,
            sample_rate: 44_100,
        }
    }
}

/// One synthesized utterance.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// Backend for turning reply text into audio.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Synthesize `text` into an encoded clip.
    async fn synthesize(&self, text: &str) -> VoiceResult<AudioClip>;
}

/// Production TTS backend: Cartesia synthesis API.
#[derive(Debug, Clone)]
pub struct CartesiaTts {
    api_url: String,
    api_key: String,
    voice: String,
    format: AudioFormat,
    client: reqwest::Client,
}

impl CartesiaTts {
    /// Build from environment: CARTESIA_API_KEY (required), TTS_API_URL and
    /// TTS_VOICE (optional overrides).
    pub fn from_env() -> VoiceResult<Self> {
        let api_key = crate::telephony::require_env("CARTESIA_API_KEY")?;
        let api_url =
            std::env::var("TTS_API_URL").unwrap_or_else(|_| DEFAULT_TTS_URL.to_string());
        let voice =
            std::env::var("TTS_VOICE").unwrap_or_else(|_| DEFAULT_TTS_VOICE.to_string());
        Self::new(api_url, api_key, voice)
    }

    /// Create with explicit config.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        voice: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(TTS_TIMEOUT_SECS))
            .build()
            .map_err(|e| VoiceError::Config(e.to_string()))?;
        Ok(Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            voice: voice.into(),
            format: AudioFormat::default(),
            client,
        })
    }

    /// Use a different output format than the default 44.1 kHz mp3.
    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }
}

#[async_trait]
impl SynthesisBackend for CartesiaTts {
    async fn synthesize(&self, text: &str) -> VoiceResult<AudioClip> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceError::EmptyResult(Stage::Synthesize));
        }
        let body = serde_json::json!({
            "text": text,
            "voice": self.voice,
            "output_format": self.format.container.format_name(),
            "sample_rate": self.format.sample_rate,
        });

        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::transport(Stage::Synthesize, e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::rejected(
                Stage::Synthesize,
                status.as_u16(),
                body,
            ));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| VoiceError::transport(Stage::Synthesize, e))?;
        if bytes.is_empty() {
            return Err(VoiceError::EmptyResult(Stage::Synthesize));
        }
        Ok(AudioClip {
            bytes: bytes.to_vec(),
            format: self.format,
        })
    }
}

/// Placeholder TTS: deterministic bytes derived from the input text, so the
/// pipeline can be exercised end to end without a synthesis backend.
#[derive(Debug, Default)]
pub struct PlaceholderTts;

#[async_trait]
impl SynthesisBackend for PlaceholderTts {
    async fn synthesize(&self, text: &str) -> VoiceResult<AudioClip> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceError::EmptyResult(Stage::Synthesize));
        }
        Ok(AudioClip {
            bytes: text.as_bytes().to_vec(),
            format: AudioFormat::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_descriptors() {
        assert_eq!(AudioContainer::Mp3.content_type(), "audio/mpeg");
        assert_eq!(AudioContainer::Mp3.extension(), "mp3");
        assert_eq!(AudioContainer::Wav.content_type(), "audio/wav");
        let format = AudioFormat::default();
        assert_eq!(format.sample_rate, 44_100);
    }

    #[tokio::test]
    async fn placeholder_rejects_empty_text() {
        let tts = PlaceholderTts;
        let err = tts.synthesize("   ").await.unwrap_err();
        assert!(matches!(err, VoiceError::EmptyResult(Stage::Synthesize)));
    }

    #[tokio::test]
    async fn placeholder_produces_bytes() {
        let tts = PlaceholderTts;
        let clip = tts.synthesize("hello").await.unwrap();
        assert_eq!(clip.bytes, b"hello");
        assert_eq!(clip.format.container, AudioContainer::Mp3);
    }
}
