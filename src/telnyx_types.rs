use serde::{Deserialize, Serialize};

/// Every Telnyx webhook arrives wrapped as `{"data": {"event_type", "payload"}}`.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct TelnyxWebhook<P> {
    #[serde(default)]
    pub data: TelnyxEvent<P>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct TelnyxEvent<P> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub payload: P,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct TelnyxCallPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_control_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// `incoming` or `outgoing`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct TelnyxRecordingUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mp3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wav: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct TelnyxRecordingPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_control_id: Option<String>,
    #[serde(default)]
    pub recording_urls: TelnyxRecordingUrls,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_duration_millis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<String>,
}

/// Response body: TeXML document inside a JSON envelope.
#[derive(Serialize, Deserialize, Debug)]
pub struct TelnyxTexmlEnvelope {
    pub texml: String,
}
