use serde::{Deserialize, Serialize};

/// Body for a pre-recorded transcription of audio Deepgram fetches itself.
#[derive(Serialize, Debug)]
pub struct ListenRequest<'a> {
    pub url: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct ListenResponse {
    #[serde(default)]
    pub metadata: Option<ListenMetadata>,
    pub results: ListenResults,
}

#[derive(Deserialize, Debug)]
pub struct ListenMetadata {
    pub request_id: String,
    #[serde(default)]
    pub duration: f32,
}

#[derive(Deserialize, Debug)]
pub struct ListenResults {
    pub channels: Vec<Channel>,
}

#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Debug)]
pub struct Channel {
    pub alternatives: Vec<Alternative>,
}

#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Debug)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: f32,
    #[serde(default)]
    pub words: Vec<Word>,
}

#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Debug)]
pub struct Word {
    pub word: String,
    pub start: f32,
    pub end: f32,
    pub confidence: f32,
}

#[derive(Deserialize, Debug, Default)]
pub struct ListenError {
    #[serde(default)]
    pub err_code: Option<String>,
    #[serde(default)]
    pub err_msg: Option<String>,
}

impl ListenResponse {
    /// Best alternative of the first channel; empty when Deepgram heard nothing.
    pub fn transcript(&self) -> String {
        self.results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.trim().to_string())
            .unwrap_or_default()
    }
}
