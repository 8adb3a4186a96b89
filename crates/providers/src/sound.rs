use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};

use crate::models::{GeneratedAudio, SoundRequest};
use crate::service::SoundProvider;
use crate::speech::ELEVENLABS_API_BASE;
use crate::{read_error, request_failed, ProviderError};

/// Accepted range of the sound-generation endpoint.
const MIN_SOUND_SECS: f64 = 0.5;
const MAX_SOUND_SECS: f64 = 22.0;

#[derive(Clone, Debug)]
pub struct SoundConfig {
    pub api_key: String,
    pub prompt_influence: f32,
    pub api_base: String,
}

impl SoundConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            prompt_influence: 0.3,
            api_base: ELEVENLABS_API_BASE.to_string(),
        }
    }
}

pub struct ElevenLabsSound {
    config: SoundConfig,
    client: reqwest::Client,
}

impl ElevenLabsSound {
    pub fn new(config: SoundConfig) -> Result<Self, ProviderError> {
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

pub(crate) fn clamp_sound_duration(secs: f64) -> f64 {
    if secs.is_nan() {
        return MIN_SOUND_SECS;
    }
    secs.clamp(MIN_SOUND_SECS, MAX_SOUND_SECS)
}

#[async_trait]
impl SoundProvider for ElevenLabsSound {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn generate(&self, request: &SoundRequest) -> Result<GeneratedAudio, ProviderError> {
        if request.prompt.trim().is_empty() {
            return Err(ProviderError::configuration("Sound prompt cannot be empty."));
        }
        let mut body = json!({
            "text": request.prompt,
            "prompt_influence": self.config.prompt_influence,
        });
        if let Some(secs) = request.duration_secs {
            body["duration_seconds"] = json!(clamp_sound_duration(secs));
        }
        let start = Instant::now();
        tracing::info!(target: "providers", "ElevenLabs sound start: {:?}", request.prompt);
        let response = self
            .client
            .post(format!(
                "{}/v1/sound-generation",
                self.config.api_base.trim_end_matches('/')
            ))
            .header("xi-api-key", &self.config.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
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
            "ElevenLabs sound completed in {:.2?} ({} bytes)",
            start.elapsed(),
            bytes.len()
        );
        Ok(GeneratedAudio::mp3(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_are_clamped_to_endpoint_range() {
        assert_eq!(clamp_sound_duration(0.1), 0.5);
        assert_eq!(clamp_sound_duration(8.0), 8.0);
        assert_eq!(clamp_sound_duration(60.0), 22.0);
        assert_eq!(clamp_sound_duration(f64::NAN), 0.5);
    }
}
