use crate::audio_store::AudioStore;
use crate::error::SynthesisError;
use crate::gateways::SpeechSynthesizer;
use crate::google_tts_types::{
    AudioConfig, GoogleErrorBody, SynthesisInput, SynthesizeSpeechRequest,
    SynthesizeSpeechResponse, VoiceSelectionParams, ENCODING_MP3,
};
use crate::utils::b64_decode_to_buf;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

const SYNTHESIZE_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
/// Google rejects input over 5000 bytes.
pub const MAX_TEXT_BYTES: usize = 5000;

/// Google Cloud TTS over its REST API. Audio lands in the [`AudioStore`] and
/// the provider fetches it back through the public audio route.
pub struct GoogleSpeechSynthesizer {
    http_client: reqwest::Client,
    api_key: String,
    language_code: String,
    audio: Arc<AudioStore>,
}

impl GoogleSpeechSynthesizer {
    pub fn new(
        http_client: reqwest::Client,
        api_key: &str,
        language_code: &str,
        audio: Arc<AudioStore>,
    ) -> Self {
        Self {
            http_client,
            api_key: api_key.to_string(),
            language_code: language_code.to_string(),
            audio,
        }
    }

    fn request(&self, text: &str, voice_id: &str) -> SynthesizeSpeechRequest {
        SynthesizeSpeechRequest {
            input: SynthesisInput {
                text: text.to_string(),
            },
            voice: VoiceSelectionParams {
                language_code: self.language_code.clone(),
                name: (!voice_id.is_empty()).then(|| voice_id.to_string()),
            },
            audio_config: AudioConfig {
                audio_encoding: ENCODING_MP3,
                sample_rate_hertz: None,
            },
        }
    }
}

pub fn check_text(text: &str) -> Result<(), SynthesisError> {
    if text.trim().is_empty() {
        return Err(SynthesisError::EmptyText);
    }
    if text.len() > MAX_TEXT_BYTES {
        return Err(SynthesisError::TextTooLong {
            len: text.len(),
            max: MAX_TEXT_BYTES,
        });
    }
    Ok(())
}

#[async_trait]
impl SpeechSynthesizer for GoogleSpeechSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String, SynthesisError> {
        check_text(text)?;
        let request = self.request(text, voice_id);
        let resp = self
            .http_client
            .post(SYNTHESIZE_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send request to Google TTS");
                SynthesisError::Failed(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<GoogleErrorBody>().await.unwrap_or_default();
            error!(status=%status, message=%body.error.message, "google tts rejected request");
            return Err(SynthesisError::Failed(format!(
                "{status}: {}",
                body.error.message
            )));
        }

        let synthesized = resp.json::<SynthesizeSpeechResponse>().await.map_err(|e| {
            error!(error=%e, "failed to deserialize Google TTS response");
            SynthesisError::Failed(e.to_string())
        })?;
        let mut audio = Vec::new();
        b64_decode_to_buf(&synthesized.audio_content, &mut audio)
            .map_err(|e| SynthesisError::Failed(format!("bad audio content: {e}")))?;
        if audio.is_empty() {
            return Err(SynthesisError::Failed("empty audio content".to_string()));
        }
        let url = self
            .audio
            .save(&audio, "mp3")
            .await
            .map_err(|e| {
                error!(error=%e, "failed to store synthesized audio");
                SynthesisError::Failed(e.to_string())
            })?;
        debug!(url=%url, bytes=audio.len(), "synthesized reply");
        Ok(url)
    }
}
