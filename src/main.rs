mod adapters;
mod audio_store;
mod backend;
mod config;
mod db_types;
mod deepgram_types;
mod error;
mod extractor;
mod gateways;
mod google_tts_types;
mod handlers;
mod llm;
mod openai_types;
mod orchestrator;
mod session_store;
mod stt;
mod tasks;
mod telnyx_types;
mod tts;
mod twilio_types;
mod types;
mod utils;
mod vonage_types;

use crate::audio_store::AudioStore;
use crate::backend::PgBackend;
use crate::config::Settings;
use crate::error::{handle_error, AppError};
use crate::extractor::HeuristicExtractor;
use crate::llm::OpenAIReplyGenerator;
use crate::orchestrator::{Gateways, TurnConfig, TurnOrchestrator};
use crate::session_store::SessionStore;
use crate::stt::DeepgramTranscriber;
use crate::tts::GoogleSpeechSynthesizer;
use crate::types::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::prelude::*;

pub mod consts {
    pub const APP_GREETING: &str = "Hi, thanks for calling. How may I help you?";
    pub const RETRY_PROMPT: &str = "Sorry, I didn't catch that. Could you say it again?";
    /// Spoken before hanging up when a turn cannot be processed at all.
    pub const ERROR_APOLOGY: &str =
        "Sorry, we are having trouble with this call. Please call back in a few minutes.";
    pub const FALLBACK_REPLY: &str =
        "Sorry, I'm having trouble answering right now. Could you repeat that?";
    pub const FAREWELL_MARKERS: &[&str] = &[
        "goodbye",
        "good bye",
        "bye bye",
        "have a great day",
        "have a nice day",
        "have a good night",
        "adiós",
        "adios",
        "hasta luego",
        "que tenga un buen día",
    ];
    pub const SESSION_REAP_INTERVAL_SECS: u64 = 60;
    pub const AUDIO_RECLAIM_INTERVAL_SECS: u64 = 30;
}

#[tokio::main]
async fn main() {
    // .env is optional
    dotenvy::dotenv().ok();
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            ("sqlx", tracing_subscriber::filter::LevelFilter::WARN),
            (
                "call_orchestrator",
                tracing_subscriber::filter::LevelFilter::DEBUG,
            ),
        ]));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {e}");
    }

    if let Err(e) = run().await {
        handle_error(&e, "call orchestrator stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let settings = Settings::from_env()?;
    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .map_err(|e| AppError::Config(format!("BIND_ADDR: {e}")))?;

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;
    sqlx::migrate!()
        .run(&db_pool)
        .await
        .map_err(sqlx::Error::from)?;
    info!("database ready");

    let http_client = reqwest::Client::new();
    let audio = Arc::new(
        AudioStore::open(
            &settings.audio_dir,
            &settings.public_base_url,
            settings.audio_ttl,
        )
        .await?,
    );
    let sessions = Arc::new(SessionStore::new(settings.session_idle_timeout));
    let backend = Arc::new(PgBackend::new(db_pool));
    let gateways = Gateways {
        transcriber: Arc::new(DeepgramTranscriber::new(
            http_client.clone(),
            &settings.deepgram_api_key,
            &settings.deepgram_language,
        )),
        replies: Arc::new(OpenAIReplyGenerator::new(
            http_client.clone(),
            &settings.openai_api_key,
            &settings.openai_model,
        )),
        synthesizer: Arc::new(GoogleSpeechSynthesizer::new(
            http_client,
            &settings.google_tts_api_key,
            &settings.tts_language_code,
            audio.clone(),
        )),
        business: backend.clone(),
        reservations: backend,
        extractor: Arc::new(HeuristicExtractor::new()),
    };
    let orchestrator = TurnOrchestrator::new(sessions.clone(), gateways, TurnConfig::from(&settings));
    let provider = adapters::adapter_for(settings.provider);
    info!(provider = provider.name(), addr=%addr, "starting call orchestrator");

    let app_state = Arc::new(AppState {
        settings,
        provider,
        orchestrator,
        sessions: sessions.clone(),
        audio: audio.clone(),
    });

    tokio::spawn(tasks::reap_idle_sessions(
        sessions,
        Duration::from_secs(consts::SESSION_REAP_INTERVAL_SECS),
    ));
    tokio::spawn(tasks::reclaim_audio(
        audio,
        Duration::from_secs(consts::AUDIO_RECLAIM_INTERVAL_SECS),
    ));

    let app = Router::new()
        .route("/voice/incoming", post(handlers::incoming_call))
        .route("/voice/process", post(handlers::process_recording))
        .route("/voice/status", post(handlers::call_status))
        .route("/audio/:file", get(handlers::audio_handler))
        .route("/health", get(handlers::health))
        .with_state(app_state);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
}
