//! Error types for the voxbridge turn pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Pipeline stage that produced a failure. Labels transport and backend
/// errors so the orchestrator can apply its per-stage fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Transcribe,
    Think,
    Synthesize,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Transcribe => "transcribe",
            Stage::Think => "think",
            Stage::Synthesize => "synthesize",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while handling one conversational turn
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("webhook event carries no recording reference")]
    MissingInput,

    #[error("{stage} transport failure: {message}")]
    Transport { stage: Stage, message: String },

    #[error("{stage} backend rejected the request ({status}): {body}")]
    BackendRejected {
        stage: Stage,
        status: u16,
        body: String,
    },

    #[error("{0} returned an empty result")]
    EmptyResult(Stage),

    #[error("telephony layer rejected the request ({status}): {body}")]
    DownstreamUnavailable { status: u16, body: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("artifact store error: {0}")]
    Artifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    /// Wrap a transport-level failure (connect, TLS, timeout) for a stage.
    pub fn transport(stage: Stage, err: impl std::fmt::Display) -> Self {
        VoiceError::Transport {
            stage,
            message: err.to_string(),
        }
    }

    /// Wrap a non-success backend status for a stage.
    pub fn rejected(stage: Stage, status: u16, body: impl Into<String>) -> Self {
        VoiceError::BackendRejected {
            stage,
            status,
            body: body.into(),
        }
    }
}
