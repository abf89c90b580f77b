//! Request and response bodies for Google Cloud Text-to-Speech `text:synthesize`.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeSpeechRequest {
    pub input: SynthesisInput,
    pub voice: VoiceSelectionParams,
    pub audio_config: AudioConfig,
}

#[derive(Serialize, Debug, Default)]
pub struct SynthesisInput {
    pub text: String,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSelectionParams {
    pub language_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

pub const ENCODING_MP3: &str = "MP3";

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    pub audio_encoding: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate_hertz: Option<u32>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeSpeechResponse {
    /// Base64 encoded audio bytes.
    #[serde(default)]
    pub audio_content: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct GoogleErrorBody {
    #[serde(default)]
    pub error: GoogleError,
}

#[derive(Deserialize, Debug, Default)]
pub struct GoogleError {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_google_field_names() {
        let req = SynthesizeSpeechRequest {
            input: SynthesisInput {
                text: "Hello".to_string(),
            },
            voice: VoiceSelectionParams {
                language_code: "en-US".to_string(),
                name: Some("en-US-Standard-E".to_string()),
            },
            audio_config: AudioConfig {
                audio_encoding: ENCODING_MP3,
                sample_rate_hertz: None,
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["input"]["text"], "Hello");
        assert_eq!(json["voice"]["languageCode"], "en-US");
        assert_eq!(json["voice"]["name"], "en-US-Standard-E");
        assert_eq!(json["audioConfig"]["audioEncoding"], "MP3");
        assert!(json["audioConfig"].get("sampleRateHertz").is_none());
    }

    #[test]
    fn parses_error_body() {
        let body: GoogleErrorBody = serde_json::from_str(
            r#"{"error":{"code":400,"message":"Invalid voice","status":"INVALID_ARGUMENT"}}"#,
        )
        .unwrap();
        assert_eq!(body.error.code, 400);
        assert_eq!(body.error.message, "Invalid voice");
    }
}
