use crate::adapters::RenderContext;
use crate::types::{AppState, VoiceAction};

use axum::{
    body::StreamBody,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, trace, warn};

#[derive(Deserialize, Debug, Default)]
pub struct IncomingParams {
    pub business_id: Option<String>,
}

/// Renders an action in the configured provider's format.
fn respond(app_state: &AppState, action: &VoiceAction) -> Response {
    let ctx = RenderContext {
        next_webhook_url: app_state.settings.next_webhook_url(),
    };
    let payload = app_state.provider.render(action, &ctx);
    trace!(provider = app_state.provider.name(), body=%payload.body, "rendered response");
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, payload.content_type)],
        payload.body,
    )
        .into_response()
}

pub async fn incoming_call(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<IncomingParams>,
    body: String,
) -> Response {
    trace!(body=%body, "incoming call body");
    let event = app_state.provider.parse_call_event(&body);
    let business_id = params
        .business_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| app_state.settings.default_business_id.clone());
    let action = app_state
        .orchestrator
        .handle_call_event(&event, &business_id)
        .await;
    respond(&app_state, &action)
}

pub async fn process_recording(State(app_state): State<Arc<AppState>>, body: String) -> Response {
    trace!(body=%body, "recording body");
    let event = app_state.provider.parse_recording_event(&body);
    debug!(
        call_id=%event.call_id,
        duration=event.duration,
        digits=?event.digits,
        "recording ready"
    );
    let action = app_state.orchestrator.handle_recording_event(&event).await;
    respond(&app_state, &action)
}

pub async fn call_status(State(app_state): State<Arc<AppState>>, body: String) -> StatusCode {
    trace!(body=%body, "status body");
    let event = app_state.provider.parse_call_event(&body);
    app_state.orchestrator.handle_status_event(&event).await;
    StatusCode::OK
}

fn audio_content_type(file: &str) -> &'static str {
    match file.rsplit('.').next() {
        Some("wav") => "audio/wav",
        _ => "audio/mpeg",
    }
}

/// Serves a synthesized artifact to the provider.
pub async fn audio_handler(
    State(app_state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> Response {
    let Some(path) = app_state.audio.path_for(&file) else {
        warn!(file=%file, "rejected audio file name");
        return StatusCode::NOT_FOUND.into_response();
    };
    let handle = match tokio::fs::File::open(&path).await {
        Ok(handle) => handle,
        Err(e) => {
            warn!(file=%file, error=%e, "audio artifact not available");
            return StatusCode::NOT_FOUND.into_response();
        }
    };
    app_state.audio.mark_delivered(&file);
    debug!(file=%file, "serving audio artifact");
    let body = StreamBody::new(ReaderStream::new(handle));
    (
        [(header::CONTENT_TYPE, audio_content_type(&file))],
        body,
    )
        .into_response()
}

pub async fn health(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "provider": app_state.provider.name(),
        "active_sessions": app_state.sessions.len(),
    }))
}
