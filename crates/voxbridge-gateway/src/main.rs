//! voxbridge gateway - telephony webhook entry point.
//!
//! Routes: outbound call trigger, call-answered greeting, per-turn
//! processing, and artifact retrieval. All pipeline decisions live in
//! voxbridge-voice; this binary only wires HTTP to the controller.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voxbridge_voice::{
    AnsweredEvent, ArtifactStore, CallController, CartesiaTts, DeepgramStt, GroqChat,
    HttpRecordingFetcher, RecordingEvent, TurnOrchestrator, TurnPolicy, TwilioClient,
    TwimlResponse, VoiceResult,
};

#[derive(Clone)]
struct AppState {
    controller: Arc<CallController>,
    store: Arc<ArtifactStore>,
    /// Absolute URL the telephony layer fetches when a call is answered.
    answer_url: String,
}

#[derive(Deserialize)]
struct CallParams {
    phone: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let state = match build_state() {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/call", get(trigger_call))
        .route("/voice", post(voice))
        .route("/process", post(process))
        .route("/audio/:name", get(audio))
        .with_state(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    tracing::info!("voxbridge gateway listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("bind failed");
    axum::serve(listener, app).await.expect("server failed");
}

/// Assemble the pipeline from environment configuration. Missing required
/// keys fail here, at startup, not mid-call.
fn build_state() -> VoiceResult<AppState> {
    let telephony = TwilioClient::from_env()?;
    let store = Arc::new(ArtifactStore::from_env()?);
    let policy = TurnPolicy::default();
    let answer_url = format!(
        "{}{}",
        store.public_base_url().trim_end_matches('/'),
        policy.answer_path
    );

    let orchestrator = TurnOrchestrator::new(
        Arc::new(HttpRecordingFetcher::from_env()?),
        Arc::new(DeepgramStt::from_env()?),
        Arc::new(GroqChat::from_env()?),
        Arc::new(CartesiaTts::from_env()?),
        store.clone(),
        policy,
    );
    let controller = Arc::new(CallController::new(Arc::new(orchestrator), telephony));

    Ok(AppState {
        controller,
        store,
        answer_url,
    })
}

async fn health() -> &'static str {
    "OK"
}

/// GET /call?phone=...: request an outbound call. Does not block on the
/// call being answered.
async fn trigger_call(
    State(state): State<AppState>,
    Query(params): Query<CallParams>,
) -> Response {
    match state
        .controller
        .initiate(&params.phone, &state.answer_url)
        .await
    {
        Ok(call) => Json(serde_json::json!({
            "status": call.status,
            "sid": call.sid,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("outbound call to {} failed: {}", params.phone, e);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// POST /voice: call answered. Greet and record the first utterance.
async fn voice(State(state): State<AppState>, Form(event): Form<AnsweredEvent>) -> Response {
    twiml(state.controller.greet(&event))
}

/// POST /process: a recorded utterance is ready. Run one turn.
async fn process(State(state): State<AppState>, Form(event): Form<RecordingEvent>) -> Response {
    twiml(state.controller.turn(event).await)
}

/// GET /audio/:name: serve a stored artifact to the telephony layer.
async fn audio(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.store.fetch(&name).await {
        Ok((bytes, content_type)) => {
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

fn twiml(response: TwimlResponse) -> Response {
    (
        [(header::CONTENT_TYPE, "text/xml")],
        response.to_xml(),
    )
        .into_response()
}
