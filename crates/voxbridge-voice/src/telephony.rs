//! **Telephony boundary** - webhook event types and the outbound call client.
//!
//! The telephony layer POSTs form-encoded webhook events (PascalCase field
//! names) and is driven back with TwiML. Outbound calls go through the
//! provider's REST API; placing a call is a single idempotent request that
//! does not wait for the call to be answered.

use serde::Deserialize;

use crate::error::{VoiceError, VoiceResult};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
const PLACE_CALL_TIMEOUT_SECS: u64 = 15;

/// Call-answered webhook event. Only the call identifier matters here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnsweredEvent {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
}

/// Recording-ready webhook event. `recording_url` is absent when the caller
/// produced no audio; the orchestrator treats that as silence, not failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingEvent {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    #[serde(rename = "RecordingUrl", default)]
    pub recording_url: Option<String>,
}

impl RecordingEvent {
    /// Concrete WAV download URL for the recording reference, if present.
    /// The provider serves the recording at `{RecordingUrl}.wav`.
    pub fn wav_url(&self) -> Option<String> {
        self.recording_url
            .as_deref()
            .map(|url| format!("{url}.wav"))
    }

    /// The WAV URL, or [`VoiceError::MissingInput`] when the event carries
    /// no recording reference.
    pub fn require_wav_url(&self) -> VoiceResult<String> {
        self.wav_url().ok_or(VoiceError::MissingInput)
    }
}

/// Result of an outbound call request.
#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub sid: String,
    pub status: String,
}

/// REST client for placing outbound calls.
#[derive(Debug, Clone)]
pub struct TwilioClient {
    account_sid: String,
    auth_token: String,
    from_number: String,
    api_base: String,
    client: reqwest::Client,
}

impl TwilioClient {
    /// Build from environment: TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, TWILIO_NUMBER.
    pub fn from_env() -> VoiceResult<Self> {
        let account_sid = require_env("TWILIO_ACCOUNT_SID")?;
        let auth_token = require_env("TWILIO_AUTH_TOKEN")?;
        let from_number = require_env("TWILIO_NUMBER")?;
        Self::new(account_sid, auth_token, from_number)
    }

    /// Create with explicit credentials (e.g. for tests or non-env wiring).
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(PLACE_CALL_TIMEOUT_SECS))
            .build()
            .map_err(|e| VoiceError::Config(e.to_string()))?;
        Ok(Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
            api_base: TWILIO_API_BASE.to_string(),
            client,
        })
    }

    /// Override the API base URL (e.g. a local stub).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Credentials for authenticated recording downloads.
    pub fn credentials(&self) -> (String, String) {
        (self.account_sid.clone(), self.auth_token.clone())
    }

    /// Request an outbound call to `to`. Once answered, the provider fetches
    /// `answer_url` for its first instruction document. A rejection is
    /// surfaced as [`VoiceError::DownstreamUnavailable`] and never retried.
    pub async fn place_call(&self, to: &str, answer_url: &str) -> VoiceResult<OutboundCall> {
        let url = format!(
            "{}/Accounts/{}/Calls.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        );
        let params = [
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Url", answer_url),
        ];
        let res = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| VoiceError::DownstreamUnavailable {
                status: 0,
                body: e.to_string(),
            })?;

        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(VoiceError::DownstreamUnavailable {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
        let sid = value
            .get("sid")
            .and_then(|s| s.as_str())
            .unwrap_or_default()
            .to_string();
        let call_status = value
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("queued")
            .to_string();
        Ok(OutboundCall {
            sid,
            status: call_status,
        })
    }
}

pub(crate) fn require_env(key: &str) -> VoiceResult<String> {
    std::env::var(key).map_err(|_| VoiceError::Config(format!("{key} not set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_url_appends_extension() {
        let event = RecordingEvent {
            call_sid: "CA123".to_string(),
            recording_url: Some("https://api.twilio.com/rec/RE1".to_string()),
        };
        assert_eq!(
            event.wav_url().as_deref(),
            Some("https://api.twilio.com/rec/RE1.wav")
        );
    }

    #[test]
    fn missing_recording_reference_is_none() {
        let event: RecordingEvent =
            serde_json::from_value(serde_json::json!({ "CallSid": "CA9" })).unwrap();
        assert_eq!(event.call_sid, "CA9");
        assert!(event.recording_url.is_none());
        assert!(event.wav_url().is_none());
        assert!(matches!(
            event.require_wav_url(),
            Err(VoiceError::MissingInput)
        ));
    }

    #[test]
    fn events_tolerate_empty_payloads() {
        let answered: AnsweredEvent = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(answered.call_sid.is_empty());

        let recording: RecordingEvent = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(recording.call_sid.is_empty());
        assert!(recording.recording_url.is_none());
    }
}
