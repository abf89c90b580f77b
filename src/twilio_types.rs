pub fn wrap_twiml(twiml: String) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{twiml}")
}

/// TwiML verbs we answer webhooks with. Telnyx TeXML speaks the same dialect.
mod twiml {
    use xmlserde_derives::XmlSerialize;

    #[derive(PartialEq, Eq, XmlSerialize)]
    #[xmlserde(root = b"Response")]
    pub struct Response {
        #[xmlserde(ty = "untag")]
        pub actions: Vec<ResponseAction>,
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum ResponseAction {
        #[xmlserde(name = b"Say")]
        Say(SayAction),
        #[xmlserde(name = b"Play")]
        Play(PlayAction),
        #[xmlserde(name = b"Record")]
        Record(RecordAction),
        #[xmlserde(name = b"Hangup")]
        Hangup(HangupAction),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct SayAction {
        #[xmlserde(ty = "text")]
        pub text: String,
        #[xmlserde(name = b"voice", ty = "attr")]
        pub voice: Option<String>,
        #[xmlserde(name = b"loop", ty = "attr")]
        pub lp: Option<u16>,
        #[xmlserde(name = b"language", ty = "attr")]
        pub language: Option<String>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct PlayAction {
        #[xmlserde(ty = "text")]
        pub url: String,
        #[xmlserde(name = b"loop", ty = "attr")]
        pub lp: Option<u16>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct RecordAction {
        #[xmlserde(name = b"action", ty = "attr")]
        pub action: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<String>,
        #[xmlserde(name = b"maxLength", ty = "attr")]
        pub max_length: Option<u32>,
        #[xmlserde(name = b"timeout", ty = "attr")]
        pub timeout: Option<u32>,
        #[xmlserde(name = b"finishOnKey", ty = "attr")]
        pub finish_on_key: Option<String>,
        #[xmlserde(name = b"playBeep", ty = "attr")]
        pub play_beep: Option<String>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct HangupAction {}
}
pub use twiml::*;

/// Form-encoded webhook bodies. Every field is optional so that a partial
/// body still yields whatever identity it carries.
mod webhook {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, Default)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioCallPayload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub account_sid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub call_sid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub call_status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub direction: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub caller: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub called: Option<String>,
    }

    #[derive(Serialize, Deserialize, Debug, Default)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioRecordingPayload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub call_sid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub recording_sid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub recording_url: Option<String>,
        /// Seconds, sent as a string
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub recording_duration: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub digits: Option<String>,
    }
}
pub use webhook::*;
