use crate::adapters::ProviderAdapter;
use crate::audio_store::AudioStore;
use crate::config::Settings;
use crate::orchestrator::TurnOrchestrator;
use crate::session_store::SessionStore;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;

pub struct AppState {
    pub settings: Settings,
    /// Chosen once at startup from `TELEPHONY_PROVIDER`
    pub provider: Arc<dyn ProviderAdapter>,
    pub orchestrator: TurnOrchestrator,
    pub sessions: Arc<SessionStore>,
    pub audio: Arc<AudioStore>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionStatus {
    Active,
    Terminated,
}

/// One utterance in the call transcript.
#[derive(Clone, Debug)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: OffsetDateTime,
    /// Set only on assistant turns that dispatched a reservation
    pub action: Option<ReservationAction>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
            action: None,
        }
    }

    pub fn assistant(content: impl Into<String>, action: Option<ReservationAction>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
            action,
        }
    }
}

/// Live state of one phone call from answer to hangup.
#[derive(Debug)]
pub struct CallSession {
    pub call_id: String,
    pub business_id: String,
    /// Caller number from the call-start event
    pub caller: String,
    pub messages: Vec<Turn>,
    pub start_time: OffsetDateTime,
    pub status: SessionStatus,
}

impl CallSession {
    pub fn new(call_id: &str, business_id: &str, caller: &str) -> Self {
        Self {
            call_id: call_id.to_string(),
            business_id: business_id.to_string(),
            caller: caller.to_string(),
            messages: vec![],
            start_time: OffsetDateTime::now_utc(),
            status: SessionStatus::Active,
        }
    }

    /// Transcript is append-only; this is the only way turns get in.
    pub fn append_turn(&mut self, turn: Turn) {
        self.messages.push(turn);
    }

    pub fn elapsed(&self) -> time::Duration {
        OffsetDateTime::now_utc() - self.start_time
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn user_utterances(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CallDirection {
    Inbound,
    Outbound,
    #[default]
    Unknown,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CallStatus {
    Queued,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
    #[default]
    Unknown,
}

impl CallStatus {
    /// Statuses after which no more webhooks arrive for the call
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallStatus::Completed
                | CallStatus::Busy
                | CallStatus::Failed
                | CallStatus::NoAnswer
                | CallStatus::Canceled
        )
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CanonicalCallEvent {
    pub call_id: String,
    pub from: String,
    pub to: String,
    pub direction: CallDirection,
    pub call_status: CallStatus,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CanonicalRecordingEvent {
    pub call_id: String,
    pub recording_url: String,
    /// Whole seconds; 0 when the provider did not say
    pub duration: u32,
    pub digits: Option<String>,
}

impl CanonicalRecordingEvent {
    /// Twilio-style providers report `hangup` when the caller drops mid-recording.
    pub fn caller_hung_up(&self) -> bool {
        self.digits
            .as_deref()
            .map(|d| d.eq_ignore_ascii_case("hangup"))
            .unwrap_or(false)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RecordWindow {
    pub max_duration_secs: u32,
    pub silence_timeout_secs: u32,
    pub finish_on_key: Option<char>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum VoiceAction {
    PlayAndRecord {
        audio_url: String,
        window: RecordWindow,
    },
    PlayAndHangup {
        audio_url: String,
    },
    Say {
        text: String,
        voice: String,
    },
    /// Provider-side speech then record; used when our own synthesis fails mid-call.
    SayAndRecord {
        text: String,
        voice: String,
        window: RecordWindow,
    },
    Hangup,
}

/// Structured booking intent lifted out of the conversation. Every field is
/// filled, falling back to the extractor defaults.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ReservationAction {
    pub name: String,
    pub party_size: u32,
    pub date: String,
    pub time: String,
    pub phone: String,
    pub notes: String,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ReservationRecord {
    pub id: uuid::Uuid,
    pub business_id: String,
    pub name: String,
    pub party_size: u32,
    pub date: time::Date,
    pub time: time::Time,
    pub phone: String,
    pub notes: String,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct MenuItem {
    pub name: String,
    pub description: String,
    pub price_cents: i32,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct DiningTable {
    pub label: String,
    pub seats: i32,
}

#[derive(Clone, PartialEq, Debug)]
pub struct BusinessContext {
    pub name: String,
    pub hours: String,
    pub menu: Vec<MenuItem>,
    pub tables: Vec<DiningTable>,
    pub available_slots: Vec<String>,
}

impl Default for BusinessContext {
    fn default() -> Self {
        Self {
            name: "our restaurant".to_string(),
            hours: "please ask the staff for today's hours".to_string(),
            menu: vec![],
            tables: vec![],
            available_slots: vec![],
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GeneratedReply {
    pub text: String,
    pub raw_action_marker: Option<String>,
}
