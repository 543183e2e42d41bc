use serde::{Deserialize, Serialize};

/// Recognition/translation result sent by the service as a text message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    /// `partial` or `final`
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub recognition: String,
    #[serde(default)]
    pub translation: Option<String>,
    /// Offset of the utterance in the audio stream (100ns ticks)
    #[serde(default)]
    pub audio_time_offset: Option<u64>,
    /// Duration of the utterance (100ns ticks)
    #[serde(default)]
    pub audio_time_size: Option<u64>,
    #[serde(default)]
    pub audio_stream_position: Option<u64>,
    #[serde(default)]
    pub audio_size_bytes: Option<u64>,
}

impl TranslationResult {
    /// Parse a text message; `None` for anything that is not a result
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn is_partial(&self) -> bool {
        self.kind.eq_ignore_ascii_case("partial")
    }
}
