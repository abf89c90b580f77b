//! Environment-driven settings. `.env` is loaded by `main` before `Settings::from_env`.
//!
//! | Env | Default |
//! |-----|---------|
//! | BIND_ADDR | 0.0.0.0:3000 |
//! | PUBLIC_BASE_URL | required; where the provider reaches us |
//! | TELEPHONY_PROVIDER | twilio (twilio, telnyx, vonage, generic) |
//! | DEFAULT_BUSINESS_ID | default |
//! | OPENAI_API_KEY / OPENAI_MODEL | required / gpt-3.5-turbo |
//! | DEEPGRAM_API_KEY / DEEPGRAM_LANGUAGE | required / en-US |
//! | GOOGLE_TTS_API_KEY | required |
//! | TTS_LANGUAGE_CODE / TTS_VOICE | en-US / en-US-Standard-E |
//! | SAY_VOICE | alice; provider-side voice for fallback speech |
//! | DATABASE_URL | required |
//! | AUDIO_DIR | ./audio |
//! | GATEWAY_TIMEOUT_SECS | 15 |
//! | SESSION_IDLE_TIMEOUT_SECS | 600 |
//! | AUDIO_TTL_SECS | 600 |

use crate::error::AppError;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProviderKind {
    Twilio,
    Telnyx,
    Vonage,
    Generic,
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twilio" => Ok(ProviderKind::Twilio),
            "telnyx" => Ok(ProviderKind::Telnyx),
            "vonage" | "nexmo" => Ok(ProviderKind::Vonage),
            "generic" => Ok(ProviderKind::Generic),
            other => Err(AppError::Config(format!(
                "unknown TELEPHONY_PROVIDER '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_addr: String,
    pub public_base_url: String,
    pub provider: ProviderKind,
    pub default_business_id: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub deepgram_api_key: String,
    pub deepgram_language: String,
    pub google_tts_api_key: String,
    pub tts_language_code: String,
    pub tts_voice: String,
    pub say_voice: String,
    pub database_url: String,
    pub audio_dir: PathBuf,
    pub gateway_timeout: Duration,
    pub session_idle_timeout: Duration,
    pub audio_ttl: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            bind_addr: optional("BIND_ADDR", "0.0.0.0:3000"),
            public_base_url: required("PUBLIC_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            provider: optional("TELEPHONY_PROVIDER", "twilio").parse()?,
            default_business_id: optional("DEFAULT_BUSINESS_ID", "default"),
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_model: optional("OPENAI_MODEL", "gpt-3.5-turbo"),
            deepgram_api_key: required("DEEPGRAM_API_KEY")?,
            deepgram_language: optional("DEEPGRAM_LANGUAGE", "en-US"),
            google_tts_api_key: required("GOOGLE_TTS_API_KEY")?,
            tts_language_code: optional("TTS_LANGUAGE_CODE", "en-US"),
            tts_voice: optional("TTS_VOICE", "en-US-Standard-E"),
            say_voice: optional("SAY_VOICE", "alice"),
            database_url: required("DATABASE_URL")?,
            audio_dir: PathBuf::from(optional("AUDIO_DIR", "./audio")),
            gateway_timeout: secs("GATEWAY_TIMEOUT_SECS", 15)?,
            session_idle_timeout: secs("SESSION_IDLE_TIMEOUT_SECS", 600)?,
            audio_ttl: secs("AUDIO_TTL_SECS", 600)?,
        })
    }

    /// Callback the provider must hit with the next recording
    pub fn next_webhook_url(&self) -> String {
        format!("{}/voice/process", self.public_base_url)
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Config(format!("{key} not set!")))
}

fn optional(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn secs(key: &str, default: u64) -> Result<Duration, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| AppError::Config(format!("{key}: {e}"))),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}
