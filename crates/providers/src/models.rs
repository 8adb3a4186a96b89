use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatTelemetry {
    pub provider: String,
    pub model: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub latency: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub telemetry: Option<ChatTelemetry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VideoRequest {
    pub prompt: String,
    /// Desired clip length; models that ignore it return their own length.
    pub duration_secs: f64,
    pub aspect_ratio: Option<String>,
}

impl VideoRequest {
    pub fn new(prompt: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            prompt: prompt.into(),
            duration_secs,
            aspect_ratio: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedVideo {
    pub url: String,
    pub prediction_id: Option<String>,
    pub duration_secs: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    /// Overrides the configured voice.
    pub voice_id: Option<String>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SoundRequest {
    pub prompt: String,
    pub duration_secs: Option<f64>,
}

impl SoundRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            duration_secs: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedAudio {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl GeneratedAudio {
    pub fn mp3(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: "audio/mpeg".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoundSearchResult {
    pub id: u64,
    pub name: String,
    pub duration: f64,
    pub preview_url: Option<String>,
    pub license: Option<String>,
    pub username: Option<String>,
}
