//! Per-call turn pipeline.
//!
//! A call moves `Created -> AwaitingSpeech -> Processing -> (AwaitingSpeech |
//! Terminated)`. Only the transitions live here; every external step goes
//! through a gateway trait and is bounded by the gateway timeout. Whatever
//! goes wrong, the provider still gets something to say.

use crate::config::Settings;
use crate::consts::{APP_GREETING, ERROR_APOLOGY, FALLBACK_REPLY, FAREWELL_MARKERS, RETRY_PROMPT};
use crate::error::{handle_error, AppError};
use crate::extractor::{ActionExtractor, DEFAULT_PHONE};
use crate::gateways::{BusinessData, ReplyGenerator, ReservationBackend, SpeechSynthesizer, Transcriber};
use crate::session_store::SessionStore;
use crate::types::{
    BusinessContext, CallSession, CanonicalCallEvent, CanonicalRecordingEvent, GeneratedReply, RecordWindow,
    ReservationAction, SessionStatus, Turn, VoiceAction,
};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// First utterances are short answers to the greeting.
pub const GREETING_WINDOW: RecordWindow = RecordWindow {
    max_duration_secs: 10,
    silence_timeout_secs: 3,
    finish_on_key: Some('#'),
};

pub const FOLLOW_UP_WINDOW: RecordWindow = RecordWindow {
    max_duration_secs: 30,
    silence_timeout_secs: 3,
    finish_on_key: Some('#'),
};

/// The external collaborators of a call.
pub struct Gateways {
    pub transcriber: Arc<dyn Transcriber>,
    pub replies: Arc<dyn ReplyGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub business: Arc<dyn BusinessData>,
    pub reservations: Arc<dyn ReservationBackend>,
    pub extractor: Arc<dyn ActionExtractor>,
}

#[derive(Clone, Debug)]
pub struct TurnConfig {
    /// Voice for our own synthesis
    pub tts_voice: String,
    /// Voice the provider uses when it has to speak for us
    pub say_voice: String,
    pub gateway_timeout: Duration,
}

impl From<&Settings> for TurnConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            tts_voice: settings.tts_voice.clone(),
            say_voice: settings.say_voice.clone(),
            gateway_timeout: settings.gateway_timeout,
        }
    }
}

pub struct TurnOrchestrator {
    sessions: Arc<SessionStore>,
    gateways: Gateways,
    config: TurnConfig,
}

impl TurnOrchestrator {
    pub fn new(sessions: Arc<SessionStore>, gateways: Gateways, config: TurnConfig) -> Self {
        Self {
            sessions,
            gateways,
            config,
        }
    }

    /// Call-start webhook. Redeliveries reuse the session and leave its
    /// transcript alone, but still get the greeting back.
    pub async fn handle_call_event(&self, event: &CanonicalCallEvent, business_id: &str) -> VoiceAction {
        let (_, created) = self.sessions.create(&event.call_id, business_id, &event.from);
        if created {
            if let Err(e) = self
                .sessions
                .append_turn(&event.call_id, Turn::assistant(APP_GREETING, None))
                .await
            {
                handle_error(&e, "failed to record greeting");
            }
            info!(
                call_id=%event.call_id,
                from=%event.from,
                to=%event.to,
                direction=?event.direction,
                "call started"
            );
        }
        self.speak(APP_GREETING, Some(GREETING_WINDOW)).await
    }

    /// Recording-ready webhook: one full listen, understand, decide, speak turn.
    pub async fn handle_recording_event(&self, event: &CanonicalRecordingEvent) -> VoiceAction {
        match self.process_recording(event).await {
            Ok(action) => action,
            Err(e) => {
                handle_error(&e, "could not process recording");
                self.speak(ERROR_APOLOGY, None).await
            }
        }
    }

    /// Status callback. Returns whether a session ended because of it.
    pub async fn handle_status_event(&self, event: &CanonicalCallEvent) -> bool {
        if !event.call_status.is_terminal() {
            debug!(call_id=%event.call_id, status=?event.call_status, "call status update");
            self.sessions.touch(&event.call_id);
            return false;
        }
        match self.sessions.terminate(&event.call_id) {
            Some(handle) => {
                // waits for a turn in flight to finish
                let mut session = handle.lock().await;
                session.status = SessionStatus::Terminated;
                log_call_end(&session, "status callback");
                true
            }
            None => false,
        }
    }

    async fn process_recording(&self, event: &CanonicalRecordingEvent) -> Result<VoiceAction, AppError> {
        let call_id = event.call_id.as_str();
        let handle = self.sessions.get(call_id)?;
        let mut session = handle.lock().await;
        // ended while we waited for the lock
        if !session.is_active() {
            return Err(AppError::SessionNotFound(call_id.to_string()));
        }
        self.sessions.touch(call_id);

        if event.caller_hung_up() {
            session.status = SessionStatus::Terminated;
            log_call_end(&session, "caller hung up");
            drop(session);
            self.sessions.terminate(call_id);
            return Ok(VoiceAction::Hangup);
        }

        let transcript = match self.transcribe(&event.recording_url).await {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!(call_id=%call_id, error=%e, "nothing usable heard; asking again");
                return Ok(self.speak(RETRY_PROMPT, Some(FOLLOW_UP_WINDOW)).await);
            }
        };
        debug!(call_id=%call_id, transcript=%transcript, "caller said");
        session.append_turn(Turn::user(transcript));

        let context = self.business_context(&session.business_id).await;
        let reply = self.reply(&session.messages, &context).await;

        // only a reply the generator flagged can book a table
        let mut action = match reply.raw_action_marker {
            Some(_) => {
                let utterances = session.user_utterances();
                self.gateways.extractor.extract(&reply.text, &utterances)
            }
            None => None,
        };
        if let Some(action) = action.as_mut() {
            if action.phone == DEFAULT_PHONE && !session.caller.is_empty() {
                action.phone = session.caller.clone();
            }
        }
        session.append_turn(Turn::assistant(reply.text.clone(), action.clone()));

        if let Some(action) = &action {
            let business_id = session.business_id.clone();
            self.reserve(call_id, &business_id, action).await;
        }

        let spoken = self.gateways.extractor.strip_markers(&reply.text);
        let farewell = is_farewell(&spoken);
        let window = (!farewell).then_some(FOLLOW_UP_WINDOW);
        let voice_action = self.speak(&spoken, window).await;

        if farewell {
            session.status = SessionStatus::Terminated;
            log_call_end(&session, "farewell");
            drop(session);
            self.sessions.terminate(call_id);
        } else {
            drop(session);
            self.sessions.touch(call_id);
        }
        Ok(voice_action)
    }

    async fn with_timeout<T>(
        &self,
        gateway: &'static str,
        fut: impl Future<Output = T>,
    ) -> Result<T, AppError> {
        tokio::time::timeout(self.config.gateway_timeout, fut)
            .await
            .map_err(|_| AppError::GatewayTimeout(gateway))
    }

    async fn transcribe(&self, recording_url: &str) -> Result<String, AppError> {
        let transcript = self
            .with_timeout("transcription", self.gateways.transcriber.transcribe(recording_url))
            .await?
            .map_err(|e| AppError::GatewayFailure {
                gateway: "transcription",
                reason: e.to_string(),
            })?;
        if transcript.trim().is_empty() {
            return Err(AppError::EmptyTranscript);
        }
        Ok(transcript.trim().to_string())
    }

    async fn business_context(&self, business_id: &str) -> BusinessContext {
        match self
            .with_timeout("business", self.gateways.business.fetch_context(business_id))
            .await
        {
            Ok(Ok(context)) => context,
            Ok(Err(e)) | Err(e) => {
                warn!(business_id=%business_id, error=%e, "using default business context");
                BusinessContext::default()
            }
        }
    }

    async fn reply(&self, history: &[Turn], context: &BusinessContext) -> GeneratedReply {
        match self
            .with_timeout("reply", self.gateways.replies.generate_reply(history, context))
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error=%e, "using fallback reply");
                GeneratedReply {
                    text: FALLBACK_REPLY.to_string(),
                    raw_action_marker: None,
                }
            }
        }
    }

    /// Fire the reservation side effect. The spoken reply is already
    /// committed, so failures are only logged.
    async fn reserve(&self, call_id: &str, business_id: &str, action: &ReservationAction) {
        let result = self
            .with_timeout(
                "reservation",
                self.gateways.reservations.create_reservation(business_id, action),
            )
            .await;
        match result {
            Ok(Ok(record)) => info!(
                call_id=%call_id,
                reservation_id=%record.id,
                name=%record.name,
                party_size=record.party_size,
                date=%record.date,
                time=%record.time,
                "reservation created"
            ),
            Ok(Err(e)) => handle_error(
                &AppError::ReservationCreationFailed(e),
                "reservation confirmed to caller but not stored",
            ),
            Err(e) => handle_error(&e, "reservation confirmed to caller but not stored"),
        }
    }

    /// Synthesizes `text`. With a window the caller gets to answer, without one
    /// the call ends. If synthesis fails the provider speaks the text itself.
    async fn speak(&self, text: &str, window: Option<RecordWindow>) -> VoiceAction {
        let synthesized = self
            .with_timeout(
                "synthesis",
                self.gateways.synthesizer.synthesize(text, &self.config.tts_voice),
            )
            .await
            .and_then(|r| {
                r.map_err(|e| AppError::GatewayFailure {
                    gateway: "synthesis",
                    reason: e.to_string(),
                })
            });
        match (synthesized, window) {
            (Ok(audio_url), Some(window)) => VoiceAction::PlayAndRecord { audio_url, window },
            (Ok(audio_url), None) => VoiceAction::PlayAndHangup { audio_url },
            (Err(e), window) => {
                handle_error(&e, "falling back to provider speech");
                let text = text.to_string();
                let voice = self.config.say_voice.clone();
                match window {
                    Some(window) => VoiceAction::SayAndRecord { text, voice, window },
                    None => VoiceAction::Say { text, voice },
                }
            }
        }
    }
}

fn log_call_end(session: &CallSession, reason: &'static str) {
    info!(
        call_id=%session.call_id,
        business_id=%session.business_id,
        turns=session.messages.len(),
        last_turn_at=?session.messages.last().map(|t| t.timestamp),
        duration_secs=session.elapsed().whole_seconds(),
        reason,
        "call ended"
    );
}

/// Closing phrases that end the call, matched case-insensitively.
pub fn is_farewell(reply: &str) -> bool {
    let reply = reply.to_lowercase();
    FAREWELL_MARKERS.iter().any(|marker| reply.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReservationError, SynthesisError, TranscriptionError};
    use crate::extractor::{HeuristicExtractor, RESERVATION_MARKER};
    use crate::types::{CallDirection, CallStatus, ReservationRecord, Role};

    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedTranscriber {
        transcripts: Mutex<VecDeque<Result<String, TranscriptionError>>>,
    }

    #[async_trait]
    impl Transcriber for ScriptedTranscriber {
        async fn transcribe(&self, _recording_url: &str) -> Result<String, TranscriptionError> {
            self.transcripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    #[derive(Default)]
    struct ScriptedReplies {
        replies: Mutex<VecDeque<String>>,
        delay: Option<Duration>,
        unflagged: bool,
        seen_history: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ReplyGenerator for ScriptedReplies {
        async fn generate_reply(&self, history: &[Turn], _context: &BusinessContext) -> GeneratedReply {
            self.seen_history.lock().unwrap().push(history.len());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let text = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "Anything else?".to_string());
            let raw_action_marker = (!self.unflagged && text.contains(RESERVATION_MARKER))
                .then(|| RESERVATION_MARKER.to_string());
            GeneratedReply {
                text,
                raw_action_marker,
            }
        }
    }

    #[derive(Default)]
    struct FakeSynthesizer {
        fail: bool,
        spoken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynthesizer {
        async fn synthesize(&self, text: &str, _voice_id: &str) -> Result<String, SynthesisError> {
            if self.fail {
                return Err(SynthesisError::Failed("tts down".to_string()));
            }
            let mut spoken = self.spoken.lock().unwrap();
            spoken.push(text.to_string());
            Ok(format!("https://audio.test/{}.mp3", spoken.len()))
        }
    }

    struct FakeBusiness {
        fail: bool,
    }

    #[async_trait]
    impl BusinessData for FakeBusiness {
        async fn fetch_context(&self, _business_id: &str) -> Result<BusinessContext, AppError> {
            if self.fail {
                return Err(AppError::Config("db unreachable".to_string()));
            }
            Ok(BusinessContext {
                name: "La Tasca".to_string(),
                ..Default::default()
            })
        }
    }

    #[derive(Default)]
    struct FakeReservations {
        fail: bool,
        created: Mutex<Vec<(String, ReservationAction)>>,
    }

    #[async_trait]
    impl ReservationBackend for FakeReservations {
        async fn create_reservation(
            &self,
            business_id: &str,
            action: &ReservationAction,
        ) -> Result<ReservationRecord, ReservationError> {
            self.created
                .lock()
                .unwrap()
                .push((business_id.to_string(), action.clone()));
            if self.fail {
                return Err(ReservationError::NoAvailability);
            }
            Ok(ReservationRecord {
                id: uuid::Uuid::new_v4(),
                business_id: business_id.to_string(),
                name: action.name.clone(),
                party_size: action.party_size,
                date: time::OffsetDateTime::now_utc().date(),
                time: time::Time::MIDNIGHT,
                phone: action.phone.clone(),
                notes: action.notes.clone(),
            })
        }
    }

    struct Harness {
        orchestrator: TurnOrchestrator,
        sessions: Arc<SessionStore>,
        replies: Arc<ScriptedReplies>,
        reservations: Arc<FakeReservations>,
    }

    #[derive(Default)]
    struct Script {
        transcripts: Vec<Result<String, TranscriptionError>>,
        replies: Vec<&'static str>,
        reply_delay: Option<Duration>,
        replies_unflagged: bool,
        synthesis_fails: bool,
        business_fails: bool,
        reservation_fails: bool,
    }

    fn harness(script: Script) -> Harness {
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(600)));
        let replies = Arc::new(ScriptedReplies {
            replies: Mutex::new(script.replies.into_iter().map(String::from).collect()),
            delay: script.reply_delay,
            unflagged: script.replies_unflagged,
            ..Default::default()
        });
        let reservations = Arc::new(FakeReservations {
            fail: script.reservation_fails,
            ..Default::default()
        });
        let gateways = Gateways {
            transcriber: Arc::new(ScriptedTranscriber {
                transcripts: Mutex::new(script.transcripts.into_iter().collect()),
            }),
            replies: replies.clone(),
            synthesizer: Arc::new(FakeSynthesizer {
                fail: script.synthesis_fails,
                ..Default::default()
            }),
            business: Arc::new(FakeBusiness {
                fail: script.business_fails,
            }),
            reservations: reservations.clone(),
            extractor: Arc::new(HeuristicExtractor::new()),
        };
        let config = TurnConfig {
            tts_voice: "en-US-Standard-E".to_string(),
            say_voice: "alice".to_string(),
            gateway_timeout: Duration::from_millis(100),
        };
        Harness {
            orchestrator: TurnOrchestrator::new(sessions.clone(), gateways, config),
            sessions,
            replies,
            reservations,
        }
    }

    fn call_start(call_id: &str) -> CanonicalCallEvent {
        CanonicalCallEvent {
            call_id: call_id.to_string(),
            from: "+34600111222".to_string(),
            to: "+34910000000".to_string(),
            direction: CallDirection::Inbound,
            call_status: CallStatus::Ringing,
        }
    }

    fn recording(call_id: &str) -> CanonicalRecordingEvent {
        CanonicalRecordingEvent {
            call_id: call_id.to_string(),
            recording_url: "https://provider.test/rec.wav".to_string(),
            duration: 4,
            digits: None,
        }
    }

    async fn roles(sessions: &SessionStore, call_id: &str) -> Vec<Role> {
        let handle = sessions.get(call_id).unwrap();
        let session = handle.lock().await;
        session.messages.iter().map(|t| t.role).collect()
    }

    #[tokio::test]
    async fn greeting_opens_with_short_window() {
        let h = harness(Script::default());
        let action = h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        assert_eq!(
            action,
            VoiceAction::PlayAndRecord {
                audio_url: "https://audio.test/1.mp3".to_string(),
                window: GREETING_WINDOW,
            }
        );
        assert_eq!(roles(&h.sessions, "CA1").await, vec![Role::Assistant]);
    }

    #[tokio::test]
    async fn redelivered_call_start_keeps_transcript() {
        let h = harness(Script {
            transcripts: vec![Ok("Do you have a table tonight?".to_string())],
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        h.orchestrator.handle_recording_event(&recording("CA1")).await;
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        assert_eq!(h.sessions.len(), 1);
        assert_eq!(
            roles(&h.sessions, "CA1").await,
            vec![Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[tokio::test]
    async fn turns_alternate_starting_with_assistant() {
        let h = harness(Script {
            transcripts: vec![
                Ok("What time do you open?".to_string()),
                Ok("And on Sunday?".to_string()),
            ],
            replies: vec!["We open at one.", "Sundays too."],
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        for _ in 0..2 {
            let action = h.orchestrator.handle_recording_event(&recording("CA1")).await;
            assert!(matches!(
                action,
                VoiceAction::PlayAndRecord { window, .. } if window == FOLLOW_UP_WINDOW
            ));
        }
        assert_eq!(
            roles(&h.sessions, "CA1").await,
            vec![
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant
            ]
        );
        // the generator always sees the caller's latest turn
        assert_eq!(*h.replies.seen_history.lock().unwrap(), vec![2, 4]);
    }

    #[tokio::test]
    async fn overlapping_deliveries_run_whole_turns_in_order() {
        let h = harness(Script {
            transcripts: vec![
                Ok("Is there parking?".to_string()),
                Ok("Is there parking? (redelivered)".to_string()),
            ],
            replies: vec!["Yes, out back.", "Yes, as I said."],
            reply_delay: Some(Duration::from_millis(30)),
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        let (rec_a, rec_b) = (recording("CA1"), recording("CA1"));
        let (first, second) = tokio::join!(
            h.orchestrator.handle_recording_event(&rec_a),
            h.orchestrator.handle_recording_event(&rec_b),
        );
        assert!(matches!(first, VoiceAction::PlayAndRecord { .. }));
        assert!(matches!(second, VoiceAction::PlayAndRecord { .. }));
        assert_eq!(
            roles(&h.sessions, "CA1").await,
            vec![
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant
            ]
        );
        // the second turn only started once the first had its reply
        assert_eq!(*h.replies.seen_history.lock().unwrap(), vec![2, 4]);
    }

    #[tokio::test]
    async fn empty_transcript_retries_without_appending() {
        let h = harness(Script {
            transcripts: vec![Ok("   ".to_string())],
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        let action = h.orchestrator.handle_recording_event(&recording("CA1")).await;
        assert!(matches!(
            action,
            VoiceAction::PlayAndRecord { window, .. } if window == FOLLOW_UP_WINDOW
        ));
        assert_eq!(roles(&h.sessions, "CA1").await, vec![Role::Assistant]);
        assert!(h.replies.seen_history.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transcription_failure_is_treated_as_silence() {
        let h = harness(Script {
            transcripts: vec![Err(TranscriptionError::AudioTooLarge)],
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        let action = h.orchestrator.handle_recording_event(&recording("CA1")).await;
        assert!(matches!(action, VoiceAction::PlayAndRecord { .. }));
        assert_eq!(roles(&h.sessions, "CA1").await, vec![Role::Assistant]);
    }

    #[tokio::test]
    async fn farewell_ends_call_and_forgets_session() {
        let h = harness(Script {
            transcripts: vec![Ok("That's all, thanks".to_string())],
            replies: vec!["Thanks for calling. Goodbye!"],
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        let handle = h.sessions.get("CA1").unwrap();
        let action = h.orchestrator.handle_recording_event(&recording("CA1")).await;
        assert!(matches!(action, VoiceAction::PlayAndHangup { .. }));
        assert_eq!(handle.lock().await.status, SessionStatus::Terminated);
        assert!(matches!(
            h.sessions.get("CA1"),
            Err(AppError::SessionNotFound(_))
        ));

        // a straggling webhook for the ended call gets an apology and a hangup
        let late = h.orchestrator.handle_recording_event(&recording("CA1")).await;
        assert!(matches!(late, VoiceAction::PlayAndHangup { .. }));
    }

    #[tokio::test]
    async fn unknown_call_gets_apology() {
        let h = harness(Script::default());
        let action = h.orchestrator.handle_recording_event(&recording("nobody")).await;
        assert!(matches!(action, VoiceAction::PlayAndHangup { .. }));
        assert!(h.sessions.is_empty());
    }

    #[tokio::test]
    async fn reservation_is_created_from_marked_reply() {
        let h = harness(Script {
            transcripts: vec![Ok("my name is Maria, table for 4, tomorrow at 9pm".to_string())],
            replies: vec!["Perfect, reservation confirmed. [RESERVE]"],
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz-7").await;
        h.orchestrator.handle_recording_event(&recording("CA1")).await;

        let created = h.reservations.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        let (business_id, action) = &created[0];
        assert_eq!(business_id, "biz-7");
        assert_eq!(action.name, "Maria");
        assert_eq!(action.party_size, 4);
        assert_eq!(action.date, "tomorrow");
        assert_eq!(action.time, "21:00");
        // never said a number, so the caller id fills in
        assert_eq!(action.phone, "+34600111222");

        let handle = h.sessions.get("CA1").unwrap();
        let session = handle.lock().await;
        assert_eq!(session.messages[2].action.as_ref(), Some(action));
    }

    #[tokio::test]
    async fn marker_is_not_spoken() {
        let h = harness(Script {
            transcripts: vec![Ok("table for 2 at 8".to_string())],
            replies: vec!["Booked for 8. [RESERVE]"],
            synthesis_fails: true,
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        let action = h.orchestrator.handle_recording_event(&recording("CA1")).await;
        match action {
            VoiceAction::SayAndRecord { text, voice, window } => {
                assert_eq!(text, "Booked for 8.");
                assert_eq!(voice, "alice");
                assert_eq!(window, FOLLOW_UP_WINDOW);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unflagged_reply_books_nothing() {
        let h = harness(Script {
            transcripts: vec![Ok("my name is Maria, table for 4".to_string())],
            replies: vec!["Noted. [RESERVE]"],
            replies_unflagged: true,
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        h.orchestrator.handle_recording_event(&recording("CA1")).await;
        assert!(h.reservations.created.lock().unwrap().is_empty());

        let handle = h.sessions.get("CA1").unwrap();
        let session = handle.lock().await;
        assert_eq!(session.messages[2].action, None);
    }

    #[tokio::test]
    async fn reservation_failure_keeps_reply() {
        let h = harness(Script {
            transcripts: vec![Ok("table for 2 at 8".to_string())],
            replies: vec!["You're booked at 8. [RESERVE]"],
            reservation_fails: true,
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        let action = h.orchestrator.handle_recording_event(&recording("CA1")).await;
        assert!(matches!(action, VoiceAction::PlayAndRecord { .. }));
        assert_eq!(h.reservations.created.lock().unwrap().len(), 1);

        let handle = h.sessions.get("CA1").unwrap();
        let session = handle.lock().await;
        assert_eq!(session.messages[2].content, "You're booked at 8. [RESERVE]");
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn slow_reply_falls_back_to_apology() {
        let h = harness(Script {
            transcripts: vec![Ok("Hello?".to_string())],
            reply_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        let action = h.orchestrator.handle_recording_event(&recording("CA1")).await;
        assert!(matches!(action, VoiceAction::PlayAndRecord { .. }));

        let handle = h.sessions.get("CA1").unwrap();
        let session = handle.lock().await;
        assert_eq!(session.messages[2].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn business_failure_uses_default_context() {
        let h = harness(Script {
            transcripts: vec![Ok("What's on the menu?".to_string())],
            replies: vec!["Let me check."],
            business_fails: true,
            ..Default::default()
        });
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        let action = h.orchestrator.handle_recording_event(&recording("CA1")).await;
        assert!(matches!(action, VoiceAction::PlayAndRecord { .. }));
        assert_eq!(roles(&h.sessions, "CA1").await.len(), 3);
    }

    #[tokio::test]
    async fn greeting_synthesis_failure_lets_provider_speak() {
        let h = harness(Script {
            synthesis_fails: true,
            ..Default::default()
        });
        let action = h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        assert_eq!(
            action,
            VoiceAction::SayAndRecord {
                text: APP_GREETING.to_string(),
                voice: "alice".to_string(),
                window: GREETING_WINDOW,
            }
        );
    }

    #[tokio::test]
    async fn hangup_digits_end_session() {
        let h = harness(Script::default());
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;
        let mut event = recording("CA1");
        event.digits = Some("hangup".to_string());
        assert_eq!(
            h.orchestrator.handle_recording_event(&event).await,
            VoiceAction::Hangup
        );
        assert!(h.sessions.is_empty());
    }

    #[tokio::test]
    async fn terminal_status_ends_session() {
        let h = harness(Script::default());
        h.orchestrator.handle_call_event(&call_start("CA1"), "biz").await;

        let mut status = call_start("CA1");
        status.call_status = CallStatus::InProgress;
        assert!(!h.orchestrator.handle_status_event(&status).await);
        assert_eq!(h.sessions.len(), 1);

        status.call_status = CallStatus::Completed;
        assert!(h.orchestrator.handle_status_event(&status).await);
        assert!(h.sessions.is_empty());
        assert!(!h.orchestrator.handle_status_event(&status).await);
    }

    #[test]
    fn farewells_in_both_languages() {
        assert!(is_farewell("Thank you, GOODBYE"));
        assert!(is_farewell("Have a great day!"));
        assert!(is_farewell("Gracias, adiós"));
        assert!(is_farewell("Perfecto, hasta luego"));
        assert!(!is_farewell("What time would you like?"));
    }
}
