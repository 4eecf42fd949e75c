//! **Call Controller** - the webhook boundary around the orchestrator.
//!
//! Three operations: place an outbound call, greet an answered call, and
//! run one turn. Whatever happens inside a turn, the telephony layer gets
//! back a well-formed instruction document; even a panic in the pipeline is
//! caught and mapped to an apology plus a redirect to a fresh turn.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info};

use crate::error::VoiceResult;
use crate::orchestrator::TurnOrchestrator;
use crate::telephony::{AnsweredEvent, OutboundCall, RecordingEvent, TwilioClient};
use crate::twiml::TwimlResponse;

const GREETING_TEXT: &str = "Hello! I am your AI assistant. How can I help you today?";
const APOLOGY_TEXT: &str = "Sorry, something went wrong on my end. Let's start over.";

pub struct CallController {
    orchestrator: Arc<TurnOrchestrator>,
    telephony: TwilioClient,
    greeting: String,
    apology: String,
}

impl CallController {
    pub fn new(orchestrator: Arc<TurnOrchestrator>, telephony: TwilioClient) -> Self {
        Self {
            orchestrator,
            telephony,
            greeting: GREETING_TEXT.to_string(),
            apology: APOLOGY_TEXT.to_string(),
        }
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Request an outbound call. Rejections surface to the caller of this
    /// operation; there is no retry.
    pub async fn initiate(&self, destination: &str, answer_url: &str) -> VoiceResult<OutboundCall> {
        let call = self.telephony.place_call(destination, answer_url).await?;
        info!("outbound call {} to {}: {}", call.sid, destination, call.status);
        Ok(call)
    }

    /// Instruction for a freshly answered call: speak the welcome phrase,
    /// then record the first utterance. Side-effect free.
    pub fn greet(&self, event: &AnsweredEvent) -> TwimlResponse {
        info!("call {}: answered, greeting", event.call_sid);
        let policy = self.orchestrator.policy();
        TwimlResponse::new()
            .say(&self.greeting)
            .record(&policy.process_path, policy.record)
    }

    /// Run one turn. Never lets a fault escape to the telephony layer: a
    /// panicking pipeline yields the apology instruction instead.
    pub async fn turn(&self, event: RecordingEvent) -> TwimlResponse {
        let result = AssertUnwindSafe(self.orchestrator.turn(&event))
            .catch_unwind()
            .await;
        match result {
            Ok(response) => response,
            Err(_) => {
                error!("call {}: turn pipeline panicked", event.call_sid);
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> TwimlResponse {
        let policy = self.orchestrator.policy();
        TwimlResponse::new()
            .say(&self.apology)
            .redirect(&policy.answer_path)
    }
}
