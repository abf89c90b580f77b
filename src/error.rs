use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Follow-up event for a call we never started, or one already torn down.
    #[error("no active session for call {0}")]
    SessionNotFound(String),
    #[error("transcript was empty")]
    EmptyTranscript,
    #[error("{0} gateway timed out")]
    GatewayTimeout(&'static str),
    #[error("{gateway} gateway failed: {reason}")]
    GatewayFailure {
        gateway: &'static str,
        reason: String,
    },
    #[error("reservation creation failed: {0}")]
    ReservationCreationFailed(#[from] ReservationError),
    #[error("malformed webhook: {0}")]
    MalformedWebhook(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("recording is too large to transcribe")]
    AudioTooLarge,
    #[error("unsupported recording format: {0}")]
    UnsupportedFormat(String),
    #[error("transcription failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("nothing to synthesize")]
    EmptyText,
    #[error("text is {len} bytes, limit is {max}")]
    TextTooLong { len: usize, max: usize },
    #[error("synthesis failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("no availability for the requested slot")]
    NoAvailability,
    #[error("reservation backend error: {0}")]
    BackendError(String),
}

impl From<sqlx::Error> for ReservationError {
    fn from(e: sqlx::Error) -> Self {
        ReservationError::BackendError(e.to_string())
    }
}

pub fn handle_error(e: &impl std::error::Error, context: &str) {
    error!(error=%e, "{context}")
}
