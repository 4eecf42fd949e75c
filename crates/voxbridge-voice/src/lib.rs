//! # voxbridge-voice - per-call turn-taking pipeline
//!
//! Drives one conversational turn of an AI phone call per webhook event:
//! fetch the caller's recording, transcribe it, generate a short reply,
//! synthesize it, store the audio artifact, and answer with a declarative
//! instruction document. Stateless between requests; the telephony layer's
//! event stream is the only call state.
//!
//! ```text
//! webhook event
//!      |
//!      v
//! +-----------------+     +-------------+     +-------------+
//! | Call Controller | --> | Turn        | --> | instruction |
//! |  (greet/turn)   |     | Orchestrator|     | (TwiML)     |
//! +-----------------+     +-------------+     +-------------+
//!                            |   |   |   |
//!                   fetch ---+   |   |   +--- synthesize + store
//!                     transcribe-+   +-- reply
//! ```
//!
//! Each backend dependency is a trait with one timeout-bounded operation
//! and a typed failure, so backends are swappable and testable with fakes.

pub mod artifact;
pub mod controller;
pub mod dialogue;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod stt;
pub mod telephony;
pub mod tts;
pub mod twiml;

pub use artifact::{ArtifactStore, StoredArtifact};
pub use controller::CallController;
pub use dialogue::{DialogueBackend, GroqChat, PlaceholderChat};
pub use error::{Stage, VoiceError, VoiceResult};
pub use fetch::{HttpRecordingFetcher, RecordingFetcher};
pub use orchestrator::{TurnOrchestrator, TurnPolicy, DEGRADED_REPLY};
pub use stt::{DeepgramStt, PlaceholderStt, TranscribeBackend};
pub use telephony::{AnsweredEvent, OutboundCall, RecordingEvent, TwilioClient};
pub use tts::{
    AudioClip, AudioContainer, AudioFormat, CartesiaTts, PlaceholderTts, SynthesisBackend,
};
pub use twiml::{Directive, RecordTiming, TwimlResponse};
