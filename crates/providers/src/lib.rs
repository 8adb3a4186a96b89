pub mod chat;
pub mod mock;
pub mod models;
pub mod search;
pub mod service;
pub mod sound;
pub mod speech;
pub mod video;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use chat::{OpenAiChat, OpenAiConfig};
pub use mock::{mock_script_reply, MockChat, MockSearch, MockSound, MockSpeech, MockVideo};
pub use models::{
    ChatCompletion, ChatMessage, ChatRole, ChatTelemetry, GeneratedAudio, GeneratedVideo,
    SoundRequest, SoundSearchResult, SpeechRequest, VideoRequest,
};
pub use search::{FreesoundConfig, FreesoundSearch};
pub use service::{AudioSearch, ChatProvider, SoundProvider, SpeechProvider, VideoProvider};
pub use sound::{ElevenLabsSound, SoundConfig};
pub use speech::{ElevenLabsSpeech, SpeechConfig};
pub use video::{ReplicateConfig, ReplicateVideo};

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("{0}")]
    Configuration(String),
    #[error("{provider} API key is not configured. {guidance}")]
    MissingApiKey {
        provider: &'static str,
        guidance: String,
    },
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    InvalidResponse(String),
    #[error("{provider} did not finish within {}s", .after.as_secs())]
    Timeout {
        provider: &'static str,
        after: Duration,
    },
    #[error("{0}")]
    Failed(String),
}

impl ProviderError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        ProviderError::Configuration(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        ProviderError::Transport(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        ProviderError::InvalidResponse(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        ProviderError::Failed(msg.into())
    }

    pub fn missing_key(provider: &'static str, setting: &str, env: &str) -> Self {
        ProviderError::MissingApiKey {
            provider,
            guidance: format!(
                "Run `storyreel config set {setting} <key>` or export {env}."
            ),
        }
    }

    /// Maps a non-success HTTP status to the matching variant.
    pub fn from_status(provider: &str, status: u16, body: &str) -> Self {
        let detail = error_detail(body);
        match status {
            401 | 403 => ProviderError::Authentication(format!(
                "{provider} rejected the API key ({status}): {detail}"
            )),
            429 => ProviderError::RateLimited(format!(
                "{provider} rate limit reached: {detail}"
            )),
            _ => ProviderError::Failed(format!("{provider} returned {status}: {detail}")),
        }
    }
}

/// Pulls a human-readable message out of a JSON error body, falling back to the raw text.
fn error_detail(body: &str) -> String {
    const MAX: usize = 300;
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        let candidates = [
            v.pointer("/error/message"),
            v.pointer("/detail/message"),
            v.get("detail"),
            v.get("error"),
            v.get("message"),
        ];
        candidates
            .into_iter()
            .flatten()
            .find_map(|c| c.as_str().map(str::to_string))
    });
    let text = message.unwrap_or_else(|| body.trim().to_string());
    if text.chars().count() > MAX {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}…")
    } else {
        text
    }
}

pub(crate) async fn read_error(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::from_status(provider, status, &body)
}

pub(crate) fn request_failed(provider: &str, err: reqwest::Error) -> ProviderError {
    ProviderError::transport(format!("{provider} request failed: {err}"))
}

/// Keys and model choices used to build the live clients.
#[derive(Debug, Clone, Default)]
pub struct ProvidersConfig {
    pub openai_key: Option<String>,
    pub replicate_token: Option<String>,
    pub elevenlabs_key: Option<String>,
    pub freesound_key: Option<String>,
    pub chat_model: Option<String>,
    pub video_model: Option<String>,
    pub voice_id: Option<String>,
    pub video_timeout: Option<Duration>,
}

/// The providers a run can draw on; any of them may be absent.
#[derive(Clone, Default)]
pub struct ProviderSet {
    pub chat: Option<Arc<dyn ChatProvider>>,
    pub video: Option<Arc<dyn VideoProvider>>,
    pub speech: Option<Arc<dyn SpeechProvider>>,
    pub sound: Option<Arc<dyn SoundProvider>>,
    pub search: Option<Arc<dyn AudioSearch>>,
}

impl ProviderSet {
    /// Builds a live client for every configured key. Blank keys are skipped.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        let key = |k: &Option<String>| {
            k.as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
        };
        let mut set = ProviderSet::default();

        if let Some(api_key) = key(&config.openai_key) {
            let mut chat = OpenAiConfig {
                api_key,
                ..OpenAiConfig::default()
            };
            if let Some(model) = config.chat_model.clone() {
                chat.model = model;
            }
            set.chat = Some(Arc::new(OpenAiChat::new(chat)?));
        }
        if let Some(api_token) = key(&config.replicate_token) {
            let mut video = ReplicateConfig::new(api_token);
            if let Some(model) = config.video_model.clone() {
                video.model = model;
            }
            if let Some(timeout) = config.video_timeout {
                video.timeout = timeout;
            }
            set.video = Some(Arc::new(ReplicateVideo::new(video)?));
        }
        if let Some(api_key) = key(&config.elevenlabs_key) {
            let mut speech = SpeechConfig::new(api_key.clone());
            if let Some(voice) = config.voice_id.clone() {
                speech.voice_id = voice;
            }
            set.speech = Some(Arc::new(ElevenLabsSpeech::new(speech)?));
            set.sound = Some(Arc::new(ElevenLabsSound::new(SoundConfig::new(api_key))?));
        }
        if let Some(api_key) = key(&config.freesound_key) {
            set.search = Some(Arc::new(FreesoundSearch::new(FreesoundConfig::new(api_key))?));
        }
        Ok(set)
    }

    /// Every slot filled with a scripted mock.
    pub fn mock() -> Self {
        Self {
            chat: Some(Arc::new(MockChat::default())),
            video: Some(Arc::new(MockVideo::default())),
            speech: Some(Arc::new(MockSpeech::default())),
            sound: Some(Arc::new(MockSound::default())),
            search: Some(Arc::new(MockSearch::default())),
        }
    }

    pub fn require_chat(&self) -> Result<Arc<dyn ChatProvider>, ProviderError> {
        self.chat
            .clone()
            .ok_or_else(|| ProviderError::missing_key("OpenAI", "api_keys.openai", "OPENAI_API_KEY"))
    }

    pub fn require_video(&self) -> Result<Arc<dyn VideoProvider>, ProviderError> {
        self.video.clone().ok_or_else(|| {
            ProviderError::missing_key("Replicate", "api_keys.replicate", "REPLICATE_API_TOKEN")
        })
    }

    pub fn require_speech(&self) -> Result<Arc<dyn SpeechProvider>, ProviderError> {
        self.speech.clone().ok_or_else(|| {
            ProviderError::missing_key("ElevenLabs", "api_keys.elevenlabs", "ELEVENLABS_API_KEY")
        })
    }

    pub fn require_sound(&self) -> Result<Arc<dyn SoundProvider>, ProviderError> {
        self.sound.clone().ok_or_else(|| {
            ProviderError::missing_key("ElevenLabs", "api_keys.elevenlabs", "ELEVENLABS_API_KEY")
        })
    }

    pub fn require_search(&self) -> Result<Arc<dyn AudioSearch>, ProviderError> {
        self.search.clone().ok_or_else(|| {
            ProviderError::missing_key("Freesound", "api_keys.freesound", "FREESOUND_API_KEY")
        })
    }
}
