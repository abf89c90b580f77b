//! Telephony provider adapters.
//!
//! Each provider posts its own webhook shape and expects its own answer
//! format. An adapter maps both ways between that and the canonical events
//! and [`VoiceAction`]s the orchestrator works with. Parsing never fails: a
//! body we cannot read degrades to defaults, and a missing call id is
//! synthesized so the call still gets an identity.

use crate::config::ProviderKind;
use crate::error::AppError;
use crate::telnyx_types::{
    TelnyxCallPayload, TelnyxRecordingPayload, TelnyxTexmlEnvelope, TelnyxWebhook,
};
use crate::twilio_types::{
    wrap_twiml, HangupAction, PlayAction, RecordAction, Response, ResponseAction, SayAction,
    TwilioCallPayload, TwilioRecordingPayload,
};
use crate::types::{
    CallDirection, CallStatus, CanonicalCallEvent, CanonicalRecordingEvent, RecordWindow,
    VoiceAction,
};
use crate::utils::synthesize_call_id;
use crate::vonage_types::{NccoAction, VonageCallPayload, VonageRecordingPayload};

use quick_xml::escape::escape;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

pub const CONTENT_TYPE_XML: &str = "application/xml";
pub const CONTENT_TYPE_JSON: &str = "application/json";

pub struct RenderContext {
    /// Where the provider must post the next recording
    pub next_webhook_url: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ProviderPayload {
    pub content_type: &'static str,
    pub body: String,
}

pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    fn parse_call_event(&self, body: &str) -> CanonicalCallEvent;
    fn parse_recording_event(&self, body: &str) -> CanonicalRecordingEvent;
    fn render(&self, action: &VoiceAction, ctx: &RenderContext) -> ProviderPayload;
}

pub fn adapter_for(kind: ProviderKind) -> Arc<dyn ProviderAdapter> {
    match kind {
        ProviderKind::Twilio => Arc::new(TwilioAdapter),
        ProviderKind::Telnyx => Arc::new(TelnyxAdapter),
        ProviderKind::Vonage => Arc::new(VonageAdapter),
        ProviderKind::Generic => Arc::new(GenericAdapter),
    }
}

fn from_form<T: DeserializeOwned + Default>(provider: &str, body: &str) -> T {
    serde_urlencoded::from_str(body).unwrap_or_else(|e| {
        let e = AppError::MalformedWebhook(e.to_string());
        warn!(provider, error=%e, "using defaults");
        T::default()
    })
}

fn from_json<T: DeserializeOwned + Default>(provider: &str, body: &str) -> T {
    serde_json::from_str(body).unwrap_or_else(|e| {
        let e = AppError::MalformedWebhook(e.to_string());
        warn!(provider, error=%e, "using defaults");
        T::default()
    })
}

fn call_id_or_synthesized(provider: &str, call_id: Option<String>) -> String {
    match call_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => {
            let id = synthesize_call_id();
            warn!(provider, call_id=%id, "webhook carried no call id; synthesized one");
            id
        }
    }
}

fn direction_from(raw: Option<&str>) -> CallDirection {
    match raw.map(|d| d.to_ascii_lowercase()) {
        Some(d) if d == "inbound" || d == "incoming" => CallDirection::Inbound,
        Some(d) if d.starts_with("outbound") || d == "outgoing" => CallDirection::Outbound,
        _ => CallDirection::Unknown,
    }
}

fn status_from(raw: Option<&str>) -> CallStatus {
    match raw
        .map(|s| s.to_ascii_lowercase().replace(['_', ' '], "-"))
        .as_deref()
    {
        Some("queued") => CallStatus::Queued,
        Some("ringing") | Some("started") | Some("initiated") => CallStatus::Ringing,
        Some("in-progress") | Some("answered") | Some("parked") | Some("bridging") => {
            CallStatus::InProgress
        }
        Some("completed") | Some("hangup") | Some("ended") => CallStatus::Completed,
        Some("busy") => CallStatus::Busy,
        Some("failed") | Some("rejected") => CallStatus::Failed,
        Some("no-answer") | Some("unanswered") | Some("timeout") => CallStatus::NoAnswer,
        Some("canceled") | Some("cancelled") => CallStatus::Canceled,
        _ => CallStatus::Unknown,
    }
}

/// xmlserde writes attribute values as given; element text it escapes itself.
fn attr_value(raw: &str) -> String {
    escape(raw).into_owned()
}

fn finish_key(window: &RecordWindow) -> Option<String> {
    window.finish_on_key.map(String::from)
}

/// TwiML document for an action; Telnyx TeXML reuses it verbatim.
fn twiml_for(action: &VoiceAction, ctx: &RenderContext) -> String {
    let record = |window: &RecordWindow| {
        ResponseAction::Record(RecordAction {
            action: attr_value(&ctx.next_webhook_url),
            method: Some("POST".to_string()),
            max_length: Some(window.max_duration_secs),
            timeout: Some(window.silence_timeout_secs),
            finish_on_key: finish_key(window),
            play_beep: Some("false".to_string()),
        })
    };
    let play = |url: &str| {
        ResponseAction::Play(PlayAction {
            url: url.to_string(),
            ..Default::default()
        })
    };
    let say = |text: &str, voice: &str| {
        ResponseAction::Say(SayAction {
            text: text.to_string(),
            voice: Some(attr_value(voice)),
            ..Default::default()
        })
    };
    let actions = match action {
        VoiceAction::PlayAndRecord { audio_url, window } => vec![play(audio_url), record(window)],
        VoiceAction::PlayAndHangup { audio_url } => {
            vec![play(audio_url), ResponseAction::Hangup(HangupAction {})]
        }
        VoiceAction::Say { text, voice } => {
            vec![say(text, voice), ResponseAction::Hangup(HangupAction {})]
        }
        VoiceAction::SayAndRecord {
            text,
            voice,
            window,
        } => vec![say(text, voice), record(window)],
        VoiceAction::Hangup => vec![ResponseAction::Hangup(HangupAction {})],
    };
    wrap_twiml(xmlserde::xml_serialize(Response { actions }))
}

/// Twilio: form-encoded webhooks, raw TwiML answers.
pub struct TwilioAdapter;

impl ProviderAdapter for TwilioAdapter {
    fn name(&self) -> &'static str {
        "twilio"
    }

    fn parse_call_event(&self, body: &str) -> CanonicalCallEvent {
        let payload: TwilioCallPayload = from_form(self.name(), body);
        CanonicalCallEvent {
            call_id: call_id_or_synthesized(self.name(), payload.call_sid),
            from: payload.from.or(payload.caller).unwrap_or_default(),
            to: payload.to.or(payload.called).unwrap_or_default(),
            direction: direction_from(payload.direction.as_deref()),
            call_status: status_from(payload.call_status.as_deref()),
        }
    }

    fn parse_recording_event(&self, body: &str) -> CanonicalRecordingEvent {
        let payload: TwilioRecordingPayload = from_form(self.name(), body);
        CanonicalRecordingEvent {
            call_id: call_id_or_synthesized(self.name(), payload.call_sid),
            recording_url: payload.recording_url.unwrap_or_default(),
            duration: payload
                .recording_duration
                .and_then(|d| d.trim().parse().ok())
                .unwrap_or(0),
            digits: payload.digits.filter(|d| !d.is_empty()),
        }
    }

    fn render(&self, action: &VoiceAction, ctx: &RenderContext) -> ProviderPayload {
        ProviderPayload {
            content_type: CONTENT_TYPE_XML,
            body: twiml_for(action, ctx),
        }
    }
}

/// Telnyx: enveloped JSON webhooks, TeXML answers inside a JSON envelope.
pub struct TelnyxAdapter;

impl ProviderAdapter for TelnyxAdapter {
    fn name(&self) -> &'static str {
        "telnyx"
    }

    fn parse_call_event(&self, body: &str) -> CanonicalCallEvent {
        let webhook: TelnyxWebhook<TelnyxCallPayload> = from_json(self.name(), body);
        let payload = webhook.data.payload;
        CanonicalCallEvent {
            call_id: call_id_or_synthesized(
                self.name(),
                payload.call_control_id.or(payload.call_session_id),
            ),
            from: payload.from.unwrap_or_default(),
            to: payload.to.unwrap_or_default(),
            direction: direction_from(payload.direction.as_deref()),
            call_status: status_from(payload.state.as_deref()),
        }
    }

    fn parse_recording_event(&self, body: &str) -> CanonicalRecordingEvent {
        let webhook: TelnyxWebhook<TelnyxRecordingPayload> = from_json(self.name(), body);
        let payload = webhook.data.payload;
        let urls = payload.recording_urls;
        CanonicalRecordingEvent {
            call_id: call_id_or_synthesized(self.name(), payload.call_control_id),
            recording_url: urls.mp3.or(urls.wav).unwrap_or_default(),
            duration: payload
                .recording_duration_millis
                .map(|ms| u32::try_from(ms / 1_000).unwrap_or(u32::MAX))
                .unwrap_or(0),
            digits: payload.digits.filter(|d| !d.is_empty()),
        }
    }

    fn render(&self, action: &VoiceAction, ctx: &RenderContext) -> ProviderPayload {
        let envelope = TelnyxTexmlEnvelope {
            texml: twiml_for(action, ctx),
        };
        ProviderPayload {
            content_type: CONTENT_TYPE_JSON,
            body: json!(envelope).to_string(),
        }
    }
}

/// Vonage: flat JSON webhooks, NCCO command lists as answers.
pub struct VonageAdapter;

impl VonageAdapter {
    fn record(window: &RecordWindow, ctx: &RenderContext) -> NccoAction {
        NccoAction::Record {
            event_url: vec![ctx.next_webhook_url.clone()],
            event_method: "POST".to_string(),
            end_on_silence: window.silence_timeout_secs,
            time_out: window.max_duration_secs,
            end_on_key: finish_key(window),
            beep_start: false,
            format: "mp3".to_string(),
        }
    }
}

impl ProviderAdapter for VonageAdapter {
    fn name(&self) -> &'static str {
        "vonage"
    }

    fn parse_call_event(&self, body: &str) -> CanonicalCallEvent {
        let payload: VonageCallPayload = from_json(self.name(), body);
        CanonicalCallEvent {
            call_id: call_id_or_synthesized(
                self.name(),
                payload.conversation_uuid.or(payload.uuid),
            ),
            from: payload.from.unwrap_or_default(),
            to: payload.to.unwrap_or_default(),
            direction: direction_from(payload.direction.as_deref()),
            call_status: status_from(payload.status.as_deref()),
        }
    }

    fn parse_recording_event(&self, body: &str) -> CanonicalRecordingEvent {
        let payload: VonageRecordingPayload = from_json(self.name(), body);
        CanonicalRecordingEvent {
            call_id: call_id_or_synthesized(
                self.name(),
                payload.conversation_uuid.or(payload.uuid),
            ),
            recording_url: payload.recording_url.unwrap_or_default(),
            duration: payload.duration.unwrap_or(0),
            digits: payload
                .dtmf
                .and_then(|d| d.digits)
                .filter(|d| !d.is_empty()),
        }
    }

    fn render(&self, action: &VoiceAction, ctx: &RenderContext) -> ProviderPayload {
        let stream = |url: &str| NccoAction::Stream {
            stream_url: vec![url.to_string()],
        };
        let talk = |text: &str, voice: &str| NccoAction::Talk {
            text: text.to_string(),
            // Vonage takes a locale here; Twilio-style voice names are dropped
            language: Some(voice.to_string()).filter(|v| v.contains('-')),
        };
        let ncco = match action {
            VoiceAction::PlayAndRecord { audio_url, window } => {
                vec![stream(audio_url), Self::record(window, ctx)]
            }
            VoiceAction::PlayAndHangup { audio_url } => vec![stream(audio_url)],
            VoiceAction::Say { text, voice } => vec![talk(text, voice)],
            VoiceAction::SayAndRecord {
                text,
                voice,
                window,
            } => vec![talk(text, voice), Self::record(window, ctx)],
            // an empty NCCO ends the call
            VoiceAction::Hangup => vec![],
        };
        ProviderPayload {
            content_type: CONTENT_TYPE_JSON,
            body: json!(ncco).to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenericCallPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_status: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenericRecordingPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<String>,
}

/// Provider-agnostic JSON in, one flat JSON object out.
pub struct GenericAdapter;

impl ProviderAdapter for GenericAdapter {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn parse_call_event(&self, body: &str) -> CanonicalCallEvent {
        let payload: GenericCallPayload = from_json(self.name(), body);
        CanonicalCallEvent {
            call_id: call_id_or_synthesized(self.name(), payload.call_id),
            from: payload.from.unwrap_or_default(),
            to: payload.to.unwrap_or_default(),
            direction: direction_from(payload.direction.as_deref()),
            call_status: status_from(payload.call_status.as_deref()),
        }
    }

    fn parse_recording_event(&self, body: &str) -> CanonicalRecordingEvent {
        let payload: GenericRecordingPayload = from_json(self.name(), body);
        CanonicalRecordingEvent {
            call_id: call_id_or_synthesized(self.name(), payload.call_id),
            recording_url: payload.recording_url.unwrap_or_default(),
            duration: payload.duration.unwrap_or(0),
            digits: payload.digits.filter(|d| !d.is_empty()),
        }
    }

    fn render(&self, action: &VoiceAction, ctx: &RenderContext) -> ProviderPayload {
        let body = match action {
            VoiceAction::PlayAndRecord { audio_url, window } => json!({
                "action": "play_and_record",
                "audioUrl": audio_url,
                "maxDurationSec": window.max_duration_secs,
                "silenceTimeoutSec": window.silence_timeout_secs,
                "finishOnKey": finish_key(window),
                "nextWebhookUrl": ctx.next_webhook_url,
            }),
            VoiceAction::PlayAndHangup { audio_url } => json!({
                "action": "play_and_hangup",
                "audioUrl": audio_url,
            }),
            VoiceAction::Say { text, voice } => json!({
                "action": "say",
                "text": text,
                "voice": voice,
            }),
            VoiceAction::SayAndRecord {
                text,
                voice,
                window,
            } => json!({
                "action": "say_and_record",
                "text": text,
                "voice": voice,
                "maxDurationSec": window.max_duration_secs,
                "silenceTimeoutSec": window.silence_timeout_secs,
                "finishOnKey": finish_key(window),
                "nextWebhookUrl": ctx.next_webhook_url,
            }),
            VoiceAction::Hangup => json!({ "action": "hangup" }),
        };
        ProviderPayload {
            content_type: CONTENT_TYPE_JSON,
            body: body.to_string(),
        }
    }
}
