//! End-to-end turn tests with fake stage backends.
//!
//! Each fake counts its invocations so the tests can assert which stages
//! ran, not just what instruction came back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use voxbridge_voice::{
    ArtifactStore, AudioClip, AudioFormat, CallController, DialogueBackend, Directive,
    RecordingEvent, RecordingFetcher, Stage, SynthesisBackend, TranscribeBackend,
    TurnOrchestrator, TurnPolicy, TwilioClient, VoiceError, VoiceResult, DEGRADED_REPLY,
};

struct FakeFetcher {
    fail: bool,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordingFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str) -> VoiceResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VoiceError::transport(Stage::Fetch, "timed out"));
        }
        // Five seconds of 16 kHz 16-bit mono.
        Ok(vec![0u8; 16_000 * 2 * 5])
    }
}

struct FakeStt {
    /// None means the backend fails outright.
    transcript: Option<String>,
    calls: AtomicUsize,
}

impl FakeStt {
    fn returning(text: &str) -> Self {
        Self {
            transcript: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            transcript: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TranscribeBackend for FakeStt {
    async fn transcribe(&self, _audio: &[u8]) -> VoiceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.transcript {
            Some(text) => Ok(text.clone()),
            None => Err(VoiceError::rejected(Stage::Transcribe, 503, "unavailable")),
        }
    }
}

struct FakeChat {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl FakeChat {
    fn returning(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DialogueBackend for FakeChat {
    async fn reply(&self, _system: &str, _transcript: &str) -> VoiceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(VoiceError::rejected(Stage::Think, 500, "model error")),
        }
    }
}

struct FakeTts {
    fail: bool,
    calls: AtomicUsize,
    last_input: Mutex<String>,
}

impl FakeTts {
    fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(String::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(String::new()),
        }
    }
}

#[async_trait]
impl SynthesisBackend for FakeTts {
    async fn synthesize(&self, text: &str) -> VoiceResult<AudioClip> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = text.to_string();
        if self.fail {
            return Err(VoiceError::rejected(Stage::Synthesize, 500, "no voice"));
        }
        Ok(AudioClip {
            bytes: text.as_bytes().to_vec(),
            format: AudioFormat::default(),
        })
    }
}

struct Rig {
    fetcher: Arc<FakeFetcher>,
    stt: Arc<FakeStt>,
    chat: Arc<FakeChat>,
    tts: Arc<FakeTts>,
    store_dir: tempfile::TempDir,
    orchestrator: TurnOrchestrator,
}

fn rig(fetcher: FakeFetcher, stt: FakeStt, chat: FakeChat, tts: FakeTts) -> Rig {
    let fetcher = Arc::new(fetcher);
    let stt = Arc::new(stt);
    let chat = Arc::new(chat);
    let tts = Arc::new(tts);
    let store_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::new(
        store_dir.path(),
        "https://agent.example.com",
    ));
    let orchestrator = TurnOrchestrator::new(
        fetcher.clone(),
        stt.clone(),
        chat.clone(),
        tts.clone(),
        store,
        TurnPolicy::default(),
    );
    Rig {
        fetcher,
        stt,
        chat,
        tts,
        store_dir,
        orchestrator,
    }
}

fn recording_event() -> RecordingEvent {
    RecordingEvent {
        call_sid: "CA100".to_string(),
        recording_url: Some("https://telephony.example.com/rec/RE1".to_string()),
    }
}

fn stored_artifact_count(dir: &tempfile::TempDir) -> usize {
    std::fs::read_dir(dir.path())
        .map(|entries| entries.count())
        .unwrap_or(0)
}

// Scenario A: every stage succeeds; the caller hears the artifact and the
// conversation keeps going.
#[tokio::test]
async fn successful_turn_plays_artifact_then_records() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let rig = rig(
        FakeFetcher::ok(),
        FakeStt::returning("what time is it"),
        FakeChat::returning("It's three PM."),
        FakeTts::ok(),
    );

    let response = rig.orchestrator.turn(&recording_event()).await;
    let directives = response.directives();
    assert_eq!(directives.len(), 2);
    match &directives[0] {
        Directive::Play { url } => {
            assert!(url.starts_with("https://agent.example.com/audio/CA100-"));
            assert!(url.ends_with(".mp3"));
        }
        other => panic!("expected play, got {other:?}"),
    }
    match &directives[1] {
        Directive::Record { action, .. } => assert_eq!(action, "/process"),
        other => panic!("expected record, got {other:?}"),
    }
    assert_eq!(stored_artifact_count(&rig.store_dir), 1);
}

// Missing recording reference: silence, not failure. Redirect with zero
// backend invocations.
#[tokio::test]
async fn missing_reference_redirects_without_backend_calls() {
    let rig = rig(
        FakeFetcher::ok(),
        FakeStt::returning("unused"),
        FakeChat::returning("unused"),
        FakeTts::ok(),
    );

    let event = RecordingEvent {
        call_sid: "CA100".to_string(),
        recording_url: None,
    };
    let response = rig.orchestrator.turn(&event).await;
    assert_eq!(
        response.directives(),
        &[Directive::Redirect {
            url: "/voice".to_string()
        }]
    );
    assert_eq!(rig.fetcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(rig.stt.calls.load(Ordering::SeqCst), 0);
    assert_eq!(rig.chat.calls.load(Ordering::SeqCst), 0);
    assert_eq!(rig.tts.calls.load(Ordering::SeqCst), 0);
}

// Scenario B: empty transcript skips the dialogue and synthesis stages and
// asks the caller to repeat.
#[tokio::test]
async fn empty_transcript_rerecords_without_llm() {
    let rig = rig(
        FakeFetcher::ok(),
        FakeStt::returning(""),
        FakeChat::returning("unused"),
        FakeTts::ok(),
    );

    let response = rig.orchestrator.turn(&recording_event()).await;
    let directives = response.directives();
    assert_eq!(directives.len(), 2);
    assert!(matches!(&directives[0], Directive::Say { .. }));
    assert!(matches!(&directives[1], Directive::Record { .. }));
    assert_eq!(rig.chat.calls.load(Ordering::SeqCst), 0);
    assert_eq!(rig.tts.calls.load(Ordering::SeqCst), 0);
}

// STT backend failure degrades to the same path as silence.
#[tokio::test]
async fn stt_failure_is_treated_as_silence() {
    let rig = rig(
        FakeFetcher::ok(),
        FakeStt::failing(),
        FakeChat::returning("unused"),
        FakeTts::ok(),
    );

    let response = rig.orchestrator.turn(&recording_event()).await;
    assert!(matches!(
        response.directives(),
        [Directive::Say { .. }, Directive::Record { .. }]
    ));
    assert_eq!(rig.chat.calls.load(Ordering::SeqCst), 0);
}

// Scenario C: fetch timeout is fatal for the turn; no record directive, so
// the broken call path does not loop.
#[tokio::test]
async fn fetch_failure_is_terminal() {
    let rig = rig(
        FakeFetcher::failing(),
        FakeStt::returning("unused"),
        FakeChat::returning("unused"),
        FakeTts::ok(),
    );

    let response = rig.orchestrator.turn(&recording_event()).await;
    let directives = response.directives();
    assert_eq!(directives.len(), 1);
    match &directives[0] {
        Directive::Say { text } => assert!(text.contains("connection error")),
        other => panic!("expected say, got {other:?}"),
    }
    assert_eq!(rig.stt.calls.load(Ordering::SeqCst), 0);
}

// Scenario D: dialogue failure substitutes the fixed degraded reply, and
// the synthesizer still runs on that reply.
#[tokio::test]
async fn dialogue_failure_synthesizes_degraded_reply() {
    let rig = rig(
        FakeFetcher::ok(),
        FakeStt::returning("tell me a story"),
        FakeChat::failing(),
        FakeTts::ok(),
    );

    let response = rig.orchestrator.turn(&recording_event()).await;
    assert!(matches!(
        response.directives(),
        [Directive::Play { .. }, Directive::Record { .. }]
    ));
    assert_eq!(rig.tts.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*rig.tts.last_input.lock().unwrap(), DEGRADED_REPLY);
}

// An empty dialogue reply degrades the same way as a failed one.
#[tokio::test]
async fn empty_dialogue_reply_degrades() {
    let rig = rig(
        FakeFetcher::ok(),
        FakeStt::returning("hello"),
        FakeChat::returning("   "),
        FakeTts::ok(),
    );

    rig.orchestrator.turn(&recording_event()).await;
    assert_eq!(*rig.tts.last_input.lock().unwrap(), DEGRADED_REPLY);
}

// Scenario E: synthesis failure falls back to native speech of the reply;
// no artifact is stored.
#[tokio::test]
async fn synthesis_failure_speaks_reply_directly() {
    let rig = rig(
        FakeFetcher::ok(),
        FakeStt::returning("what time is it"),
        FakeChat::returning("It's three PM."),
        FakeTts::failing(),
    );

    let response = rig.orchestrator.turn(&recording_event()).await;
    let directives = response.directives();
    assert_eq!(directives.len(), 2);
    match &directives[0] {
        Directive::Say { text } => assert_eq!(text, "It's three PM."),
        other => panic!("expected say, got {other:?}"),
    }
    assert!(matches!(&directives[1], Directive::Record { .. }));
    assert_eq!(stored_artifact_count(&rig.store_dir), 0);
}

// Two turns for the same call produce distinct artifact URLs.
#[tokio::test]
async fn repeated_turns_never_reuse_artifact_names() {
    let rig = rig(
        FakeFetcher::ok(),
        FakeStt::returning("again"),
        FakeChat::returning("Sure."),
        FakeTts::ok(),
    );

    let first = rig.orchestrator.turn(&recording_event()).await;
    let second = rig.orchestrator.turn(&recording_event()).await;

    let url_of = |resp: &voxbridge_voice::TwimlResponse| match &resp.directives()[0] {
        Directive::Play { url } => url.clone(),
        other => panic!("expected play, got {other:?}"),
    };
    assert_ne!(url_of(&first), url_of(&second));
    assert_eq!(stored_artifact_count(&rig.store_dir), 2);
}

// The controller greets with the welcome phrase and a record directive.
#[tokio::test]
async fn controller_greets_with_welcome_and_record() {
    let rig = rig(
        FakeFetcher::ok(),
        FakeStt::returning(""),
        FakeChat::returning(""),
        FakeTts::ok(),
    );
    let controller = CallController::new(
        Arc::new(rig.orchestrator),
        TwilioClient::new("AC0", "token", "+15550100").unwrap(),
    )
    .with_greeting("Welcome aboard.");

    let response = controller.greet(&voxbridge_voice::AnsweredEvent {
        call_sid: "CA7".to_string(),
    });
    let directives = response.directives();
    assert_eq!(directives.len(), 2);
    match &directives[0] {
        Directive::Say { text } => assert_eq!(text, "Welcome aboard."),
        other => panic!("expected say, got {other:?}"),
    }
    match &directives[1] {
        Directive::Record { action, timing } => {
            assert_eq!(action, "/process");
            assert_eq!(timing.max_length_secs, 12);
            assert_eq!(timing.timeout_secs, 2);
            assert!(timing.play_beep);
        }
        other => panic!("expected record, got {other:?}"),
    }
}

struct PanickingFetcher;

#[async_trait]
impl RecordingFetcher for PanickingFetcher {
    async fn fetch(&self, _url: &str) -> VoiceResult<Vec<u8>> {
        panic!("fetcher blew up");
    }
}

// A panicking pipeline never reaches the telephony layer as a fault: the
// controller answers with the apology and a redirect.
#[tokio::test]
async fn controller_maps_panic_to_apology() {
    let store_dir = tempfile::tempdir().unwrap();
    let orchestrator = TurnOrchestrator::new(
        Arc::new(PanickingFetcher),
        Arc::new(FakeStt::returning("unused")),
        Arc::new(FakeChat::returning("unused")),
        Arc::new(FakeTts::ok()),
        Arc::new(ArtifactStore::new(store_dir.path(), "https://x.example")),
        TurnPolicy::default(),
    );
    let controller = CallController::new(
        Arc::new(orchestrator),
        TwilioClient::new("AC0", "token", "+15550100").unwrap(),
    );

    let response = controller.turn(recording_event()).await;
    let directives = response.directives();
    assert_eq!(directives.len(), 2);
    assert!(matches!(&directives[0], Directive::Say { .. }));
    assert_eq!(
        directives[1],
        Directive::Redirect {
            url: "/voice".to_string()
        }
    );
}
