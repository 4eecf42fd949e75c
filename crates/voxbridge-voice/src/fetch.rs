//! **Audio Fetcher** - retrieves the recorded utterance for a turn.
//!
//! The telephony layer hands out a short-lived recording URL on each
//! recording-ready event; the fetcher downloads it as raw audio bytes for
//! the transcriber. Failures here are fatal to the turn (see the
//! orchestrator's fallback policy).

use async_trait::async_trait;

use crate::error::{Stage, VoiceError, VoiceResult};

const FETCH_TIMEOUT_SECS: u64 = 10;

/// Downloads one recorded utterance. Implemented over HTTP in production
/// and by in-memory fakes in tests.
#[async_trait]
pub trait RecordingFetcher: Send + Sync {
    /// Fetch the utterance at `url` as raw audio bytes.
    async fn fetch(&self, url: &str) -> VoiceResult<Vec<u8>>;
}

/// HTTP fetcher with optional transport-layer credentials (the recording
/// host requires the telephony account's basic auth).
#[derive(Debug, Clone)]
pub struct HttpRecordingFetcher {
    credentials: Option<(String, String)>,
    client: reqwest::Client,
}

impl HttpRecordingFetcher {
    pub fn new(credentials: Option<(String, String)>) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| VoiceError::Config(e.to_string()))?;
        Ok(Self {
            credentials,
            client,
        })
    }

    /// Build from environment: TWILIO_ACCOUNT_SID / TWILIO_AUTH_TOKEN when
    /// present; anonymous otherwise.
    pub fn from_env() -> VoiceResult<Self> {
        let credentials = match (
            std::env::var("TWILIO_ACCOUNT_SID"),
            std::env::var("TWILIO_AUTH_TOKEN"),
        ) {
            (Ok(sid), Ok(token)) => Some((sid, token)),
            _ => None,
        };
        Self::new(credentials)
    }
}

#[async_trait]
impl RecordingFetcher for HttpRecordingFetcher {
    async fn fetch(&self, url: &str) -> VoiceResult<Vec<u8>> {
        let mut req = self.client.get(url);
        if let Some((user, pass)) = &self.credentials {
            req = req.basic_auth(user, Some(pass));
        }
        let res = req
            .send()
            .await
            .map_err(|e| VoiceError::transport(Stage::Fetch, e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::rejected(Stage::Fetch, status.as_u16(), body));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| VoiceError::transport(Stage::Fetch, e))?;
        Ok(bytes.to_vec())
    }
}
