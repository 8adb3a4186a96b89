use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::models::{GeneratedVideo, VideoRequest};
use crate::service::VideoProvider;
use crate::{read_error, request_failed, ProviderError};

const DEFAULT_API_BASE: &str = "https://api.replicate.com";

#[derive(Clone, Debug)]
pub struct ReplicateConfig {
    pub api_token: String,
    /// `owner/name` of an official model.
    pub model: String,
    pub poll_interval: Duration,
    /// Upper bound for create + polling together.
    pub timeout: Duration,
    pub api_base: String,
}

impl ReplicateConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            model: "minimax/video-01".to_string(),
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(15 * 60),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

pub struct ReplicateVideo {
    config: ReplicateConfig,
    client: reqwest::Client,
}

impl ReplicateVideo {
    pub fn new(config: ReplicateConfig) -> Result<Self, ProviderError> {
        if config.api_token.trim().is_empty() {
            return Err(ProviderError::configuration("Replicate API token is required."));
        }
        if !config.model.contains('/') {
            return Err(ProviderError::configuration(format!(
                "Replicate model must look like owner/name, got '{}'",
                config.model
            )));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ProviderError::configuration(format!("HTTP client: {err}")))?;
        Ok(Self { config, client })
    }

    fn base(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    async fn create_prediction(&self, request: &VideoRequest) -> Result<Prediction, ProviderError> {
        let mut input = json!({ "prompt": request.prompt });
        if let Some(ratio) = request.aspect_ratio.as_deref() {
            input["aspect_ratio"] = json!(ratio);
        }
        let response = self
            .client
            .post(format!("{}/v1/models/{}/predictions", self.base(), self.config.model))
            .bearer_auth(&self.config.api_token)
            .json(&json!({ "input": input }))
            .send()
            .await
            .map_err(|err| request_failed("Replicate", err))?;
        if !response.status().is_success() {
            return Err(read_error("Replicate", response).await);
        }
        response.json().await.map_err(|err| {
            ProviderError::invalid_response(format!("Invalid Replicate prediction JSON: {err}"))
        })
    }

    async fn get_prediction(&self, prediction_id: &str) -> Result<Prediction, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/predictions/{}", self.base(), prediction_id))
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|err| request_failed("Replicate", err))?;
        if !response.status().is_success() {
            return Err(read_error("Replicate", response).await);
        }
        response.json().await.map_err(|err| {
            ProviderError::invalid_response(format!("Invalid Replicate prediction JSON: {err}"))
        })
    }

    async fn run(&self, request: &VideoRequest) -> Result<GeneratedVideo, ProviderError> {
        let mut prediction = self.create_prediction(request).await?;
        tracing::debug!(target: "providers", "Replicate prediction {} created", prediction.id);
        loop {
            match prediction.status.as_str() {
                "succeeded" => {
                    let url = prediction.output_url().ok_or_else(|| {
                        ProviderError::invalid_response(format!(
                            "Replicate prediction {} succeeded without a video URL",
                            prediction.id
                        ))
                    })?;
                    return Ok(GeneratedVideo {
                        url,
                        prediction_id: Some(prediction.id),
                        duration_secs: request.duration_secs,
                    });
                }
                "failed" | "canceled" => {
                    return Err(ProviderError::failed(format!(
                        "Replicate prediction {} {}: {}",
                        prediction.id,
                        prediction.status,
                        prediction.error_text().unwrap_or_else(|| "no details".into())
                    )));
                }
                _ => {}
            }
            tokio::time::sleep(self.config.poll_interval).await;
            prediction = self.get_prediction(&prediction.id).await?;
        }
    }
}

#[async_trait]
impl VideoProvider for ReplicateVideo {
    fn name(&self) -> &str {
        "replicate"
    }

    async fn generate(&self, request: &VideoRequest) -> Result<GeneratedVideo, ProviderError> {
        let start = Instant::now();
        tracing::info!(
            target: "providers",
            "Replicate video start: model={}, timeout={:?}",
            self.config.model,
            self.config.timeout
        );
        let result = tokio::time::timeout(self.config.timeout, self.run(request))
            .await
            .map_err(|_| ProviderError::Timeout {
                provider: "Replicate",
                after: self.config.timeout,
            })?;
        match &result {
            Ok(video) => tracing::info!(
                target: "providers",
                "Replicate video completed in {:.2?}: {}",
                start.elapsed(),
                video.url
            ),
            Err(err) => tracing::warn!(target: "providers", "Replicate video failed: {}", err),
        }
        result
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
}

impl Prediction {
    /// Output is either a URL or a list of URLs depending on the model.
    fn output_url(&self) -> Option<String> {
        match &self.output {
            Value::String(url) => Some(url.clone()),
            Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
            _ => None,
        }
    }

    fn error_text(&self) -> Option<String> {
        match &self.error {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
