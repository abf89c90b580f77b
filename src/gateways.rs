//! Contracts for the external collaborators of a call. The turn pipeline
//! only ever talks to these traits; the concrete clients live in `stt`,
//! `llm`, `tts` and `backend`.

use crate::error::{AppError, ReservationError, SynthesisError, TranscriptionError};
use crate::types::{BusinessContext, GeneratedReply, ReservationAction, ReservationRecord, Turn};

use async_trait::async_trait;

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, recording_url: &str) -> Result<String, TranscriptionError>;
}

/// Never fails towards the caller; implementations fall back to an apology.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate_reply(&self, history: &[Turn], context: &BusinessContext) -> GeneratedReply;
}

/// Returns a URL the telephony provider can fetch the audio from.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String, SynthesisError>;
}

/// Partial failures come back as per-field defaults, not as errors.
#[async_trait]
pub trait BusinessData: Send + Sync {
    async fn fetch_context(&self, business_id: &str) -> Result<BusinessContext, AppError>;
}

#[async_trait]
pub trait ReservationBackend: Send + Sync {
    async fn create_reservation(
        &self,
        business_id: &str,
        action: &ReservationAction,
    ) -> Result<ReservationRecord, ReservationError>;
}
