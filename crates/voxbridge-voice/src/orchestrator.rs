//! **Turn Orchestrator** - sequences one conversational turn.
//!
//! Per turn the pipeline moves Fetching -> Transcribing -> Thinking ->
//! Synthesizing -> Done, strictly in order (each stage consumes the
//! previous stage's output). Any stage can abort into a fallback
//! instruction; the fallbacks are mutually exclusive per turn:
//!
//! - missing recording reference: redirect to a fresh turn
//! - fetch failure: spoken connection-error, terminal
//! - empty or failed transcript: re-record prompt, no LLM or TTS call
//! - dialogue failure: fixed degraded reply, pipeline continues
//! - synthesis or store failure: the reply is spoken natively instead of played
//!
//! The orchestrator is a pure function of the current webhook event; no
//! state survives between turns, so concurrent calls need no locking.

use std::sync::Arc;

use tracing::{info, warn};

use crate::artifact::ArtifactStore;
use crate::dialogue::DialogueBackend;
use crate::fetch::RecordingFetcher;
use crate::stt::TranscribeBackend;
use crate::telephony::RecordingEvent;
use crate::tts::SynthesisBackend;
use crate::twiml::{RecordTiming, TwimlResponse};

/// Fixed degraded-mode reply used when the dialogue backend fails.
pub const DEGRADED_REPLY: &str = "I am having trouble thinking right now";

const SYSTEM_DIRECTIVE: &str = "You are a helpful voice AI assistant on a phone call. \
Keep every reply short and conversational, at most two sentences, with no markup \
or lists: the reply will be spoken aloud.";

const REPROMPT_TEXT: &str = "Sorry, I didn't catch that. Please say it again after the beep.";
const CONNECTION_ERROR_TEXT: &str =
    "Sorry, there was a connection error on my end. Please call back later.";

const DEFAULT_REPLY_MAX_CHARS: usize = 320;

/// Per-turn policy: webhook paths, record timing, fixed texts, and the
/// reply brevity bound. Adapters carry none of this.
#[derive(Debug, Clone)]
pub struct TurnPolicy {
    /// Path the telephony layer redirects to for a fresh turn.
    pub answer_path: String,
    /// Path that receives the next recording-ready event.
    pub process_path: String,
    /// Timing for every record directive.
    pub record: RecordTiming,
    /// System directive sent with every dialogue request.
    pub system_directive: String,
    /// Upper bound on reply length before synthesis.
    pub reply_max_chars: usize,
    /// Spoken before re-recording when the transcript is empty.
    pub reprompt_text: String,
    /// Spoken when the recording cannot be fetched; the turn is terminal.
    pub connection_error_text: String,
    /// Substituted when the dialogue backend fails.
    pub degraded_reply: String,
}

impl Default for TurnPolicy {
    fn default() -> Self {
        Self {
            answer_path: "/voice".to_string(),
            process_path: "/process".to_string(),
            record: RecordTiming::default(),
            system_directive: SYSTEM_DIRECTIVE.to_string(),
            reply_max_chars: DEFAULT_REPLY_MAX_CHARS,
            reprompt_text: REPROMPT_TEXT.to_string(),
            connection_error_text: CONNECTION_ERROR_TEXT.to_string(),
            degraded_reply: DEGRADED_REPLY.to_string(),
        }
    }
}

/// Sequences the four external stages for one turn and decides the next
/// telephony instruction.
pub struct TurnOrchestrator {
    fetcher: Arc<dyn RecordingFetcher>,
    stt: Arc<dyn TranscribeBackend>,
    dialogue: Arc<dyn DialogueBackend>,
    tts: Arc<dyn SynthesisBackend>,
    store: Arc<ArtifactStore>,
    policy: TurnPolicy,
}

impl TurnOrchestrator {
    pub fn new(
        fetcher: Arc<dyn RecordingFetcher>,
        stt: Arc<dyn TranscribeBackend>,
        dialogue: Arc<dyn DialogueBackend>,
        tts: Arc<dyn SynthesisBackend>,
        store: Arc<ArtifactStore>,
        policy: TurnPolicy,
    ) -> Self {
        Self {
            fetcher,
            stt,
            dialogue,
            tts,
            store,
            policy,
        }
    }

    pub fn policy(&self) -> &TurnPolicy {
        &self.policy
    }

    /// Handle one recording-ready event. Total: every failure maps to an
    /// instruction, never an error, so the call is never dropped silently.
    pub async fn turn(&self, event: &RecordingEvent) -> TwimlResponse {
        let call = event.call_sid.as_str();

        // No recording reference: the caller said nothing. Record again.
        let wav_url = match event.require_wav_url() {
            Ok(url) => url,
            Err(e) => {
                info!("call {}: {}, redirecting", call, e);
                return TwimlResponse::new().redirect(&self.policy.answer_path);
            }
        };

        // Fetching. A failure here is fatal to the turn: without audio there
        // is no conversation to continue, and looping back into recording
        // would retry a broken call path forever.
        let audio = match self.fetcher.fetch(&wav_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("call {}: recording fetch failed: {}", call, e);
                return TwimlResponse::new().say(&self.policy.connection_error_text);
            }
        };
        info!("call {}: fetched {} bytes of audio", call, audio.len());

        // Transcribing. Backend failure and silence are indistinguishable to
        // the caller, so both collapse to an empty transcript.
        let transcript = match self.stt.transcribe(&audio).await {
            Ok(text) => text,
            Err(e) => {
                warn!("call {}: transcription failed, treating as silence: {}", call, e);
                String::new()
            }
        };

        if transcript.trim().is_empty() {
            info!("call {}: empty transcript, asking to repeat", call);
            return TwimlResponse::new()
                .say(&self.policy.reprompt_text)
                .record(&self.policy.process_path, self.policy.record);
        }
        info!("call {}: transcript {:?}", call, transcript);

        // Thinking. An empty or failed reply degrades to the fixed fallback;
        // the conversation continues either way.
        let reply = match self.dialogue.reply(&self.policy.system_directive, &transcript).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("call {}: dialogue backend returned an empty reply", call);
                self.policy.degraded_reply.clone()
            }
            Err(e) => {
                warn!("call {}: dialogue backend failed: {}", call, e);
                self.policy.degraded_reply.clone()
            }
        };
        let reply = truncate_reply(&reply, self.policy.reply_max_chars);
        info!("call {}: reply {:?}", call, reply);

        // Synthesizing + store. On failure the telephony layer speaks the
        // reply with its native voice instead of playing an artifact.
        let synthesized = self.synthesize_and_store(call, &reply).await;
        match synthesized {
            Ok(url) => TwimlResponse::new()
                .play(url)
                .record(&self.policy.process_path, self.policy.record),
            Err(e) => {
                warn!("call {}: synthesis failed, falling back to native speech: {}", call, e);
                TwimlResponse::new()
                    .say(reply)
                    .record(&self.policy.process_path, self.policy.record)
            }
        }
    }

    async fn synthesize_and_store(
        &self,
        call_ref: &str,
        reply: &str,
    ) -> crate::error::VoiceResult<String> {
        let clip = self.tts.synthesize(reply).await?;
        let artifact = self.store.store(call_ref, &clip).await?;
        Ok(artifact.public_url)
    }
}

/// Bound a reply for low-latency synthesis, cutting at the last sentence
/// end before the limit when there is one, else at the last word break.
fn truncate_reply(reply: &str, max_chars: usize) -> String {
    let reply = reply.trim();
    if reply.chars().count() <= max_chars {
        return reply.to_string();
    }
    let head: String = reply.chars().take(max_chars).collect();
    if let Some(end) = head.rfind(['.', '!', '?']) {
        return head[..=end].trim().to_string();
    }
    match head.rfind(char::is_whitespace) {
        Some(space) => head[..space].trim().to_string(),
        None => head,
    }
}
