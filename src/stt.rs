use crate::deepgram_types::{ListenError, ListenRequest, ListenResponse};
use crate::error::TranscriptionError;
use crate::gateways::Transcriber;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, error};

const LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";

/// Deepgram pre-recorded transcription; Deepgram downloads the recording
/// from the provider URL itself.
pub struct DeepgramTranscriber {
    http_client: reqwest::Client,
    api_key: String,
    language: String,
}

impl DeepgramTranscriber {
    pub fn new(http_client: reqwest::Client, api_key: &str, language: &str) -> Self {
        Self {
            http_client,
            api_key: api_key.to_string(),
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(&self, recording_url: &str) -> Result<String, TranscriptionError> {
        if recording_url.trim().is_empty() {
            return Err(TranscriptionError::UnsupportedFormat(
                "no recording url".to_string(),
            ));
        }
        let resp = self
            .http_client
            .post(LISTEN_URL)
            .query(&[
                ("model", "nova-2"),
                ("smart_format", "true"),
                ("language", self.language.as_str()),
            ])
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.api_key))
            .json(&ListenRequest { url: recording_url })
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send request to Deepgram");
                TranscriptionError::Failed(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.json::<ListenError>().await.unwrap_or_default();
            let message = detail
                .err_msg
                .or(detail.err_code)
                .unwrap_or_else(|| status.to_string());
            error!(status=%status, message=%message, "deepgram rejected recording");
            return Err(match status {
                StatusCode::PAYLOAD_TOO_LARGE => TranscriptionError::AudioTooLarge,
                StatusCode::UNSUPPORTED_MEDIA_TYPE => TranscriptionError::UnsupportedFormat(message),
                _ => TranscriptionError::Failed(message),
            });
        }

        let listen = resp.json::<ListenResponse>().await.map_err(|e| {
            error!(error=%e, "failed to deserialize Deepgram response");
            TranscriptionError::Failed(e.to_string())
        })?;
        let transcript = listen.transcript();
        debug!(
            request_id=?listen.metadata.as_ref().map(|m| m.request_id.as_str()),
            transcript=%transcript,
            "got deepgram transcript"
        );
        Ok(transcript)
    }
}
