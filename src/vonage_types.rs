use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct VonageCallPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Stable for the whole call; recording events only carry this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct VonageDtmf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct VonageRecordingPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtmf: Option<VonageDtmf>,
}

/// One entry of a Call Control Object; the answer to a webhook is a list of these.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum NccoAction {
    Stream {
        #[serde(rename = "streamUrl")]
        stream_url: Vec<String>,
    },
    Talk {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Record {
        #[serde(rename = "eventUrl")]
        event_url: Vec<String>,
        #[serde(rename = "eventMethod")]
        event_method: String,
        #[serde(rename = "endOnSilence")]
        end_on_silence: u32,
        #[serde(rename = "timeOut")]
        time_out: u32,
        #[serde(rename = "endOnKey", skip_serializing_if = "Option::is_none")]
        end_on_key: Option<String>,
        #[serde(rename = "beepStart")]
        beep_start: bool,
        format: String,
    },
}
