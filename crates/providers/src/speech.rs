use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};

use crate::models::{GeneratedAudio, SpeechRequest};
use crate::service::SpeechProvider;
use crate::{read_error, request_failed, ProviderError};

pub(crate) const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";

#[derive(Clone, Debug)]
pub struct SpeechConfig {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub api_base: String,
}

impl SpeechConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            api_base: ELEVENLABS_API_BASE.to_string(),
        }
    }
}

pub struct ElevenLabsSpeech {
    config: SpeechConfig,
    client: reqwest::Client,
}

impl ElevenLabsSpeech {
    pub fn new(config: SpeechConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::configuration("ElevenLabs API key is required."));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| ProviderError::configuration(format!("HTTP client: {err}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl SpeechProvider for ElevenLabsSpeech {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<GeneratedAudio, ProviderError> {
        if request.text.trim().is_empty() {
            return Err(ProviderError::configuration("Speech text cannot be empty."));
        }
        let voice = request.voice_id.as_deref().unwrap_or(&self.config.voice_id);
        let start = Instant::now();
        tracing::info!(
            target: "providers",
            "ElevenLabs speech start: voice={}, chars={}",
            voice,
            request.text.chars().count()
        );
        let response = self
            .client
            .post(format!(
                "{}/v1/text-to-speech/{}",
                self.config.api_base.trim_end_matches('/'),
                voice
            ))
            .header("xi-api-key", &self.config.api_key)
            .header("Accept", "audio/mpeg")
            .json(&json!({
                "text": request.text,
                "model_id": self.config.model_id,
            }))
            .send()
            .await
            .map_err(|err| request_failed("ElevenLabs", err))?;
        if !response.status().is_success() {
            return Err(read_error("ElevenLabs", response).await);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ProviderError::transport(format!("Read ElevenLabs audio failed: {err}")))?;
        if bytes.is_empty() {
            return Err(ProviderError::invalid_response("ElevenLabs returned no audio."));
        }
        tracing::info!(
            target: "providers",
            "ElevenLabs speech completed in {:.2?} ({} bytes)",
            start.elapsed(),
            bytes.len()
        );
        Ok(GeneratedAudio::mp3(bytes.to_vec()))
    }
}
