use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};

use crate::models::{ChatCompletion, ChatMessage, ChatTelemetry};
use crate::service::ChatProvider;
use crate::{read_error, request_failed, ProviderError};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub organization: Option<String>,
    pub temperature: f32,
    pub api_base: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            organization: None,
            temperature: 0.7,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

pub struct OpenAiChat {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::configuration("OpenAI API key is required."));
        }
        if config.model.trim().is_empty() {
            return Err(ProviderError::configuration("OpenAI model name is required."));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| ProviderError::configuration(format!("HTTP client: {err}")))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{CHAT_COMPLETIONS_PATH}",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, ProviderError> {
        let payload = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": messages,
        });
        let start = Instant::now();
        tracing::info!(
            target: "providers",
            model = %self.config.model,
            messages = messages.len(),
            "chat completion requested"
        );
        let mut request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .header("Accept", "application/json")
            .json(&payload);
        if let Some(org) = self.config.organization.as_deref() {
            if !org.trim().is_empty() {
                request = request.header("OpenAI-Organization", org.trim());
            }
        }
        let response = request
            .send()
            .await
            .map_err(|err| request_failed("OpenAI", err))?;
        if !response.status().is_success() {
            return Err(read_error("OpenAI", response).await);
        }
        let body = response
            .text()
            .await
            .map_err(|err| ProviderError::transport(format!("reading OpenAI reply: {err}")))?;
        let elapsed = start.elapsed();
        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|err| {
            ProviderError::invalid_response(format!("OpenAI reply is not a chat completion: {err}"))
        })?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_response("OpenAI reply contained no choices"))?;
        let message = choice.message.ok_or_else(|| {
            ProviderError::invalid_response("OpenAI choice carried no message")
        })?;

        let usage = parsed.usage.unwrap_or_default();
        let telemetry = ChatTelemetry {
            provider: "openai".to_string(),
            model: self.config.model.clone(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            latency: Some(elapsed),
        };
        tracing::info!(
            target: "providers",
            latency = ?elapsed,
            input_tokens = ?telemetry.input_tokens,
            output_tokens = ?telemetry.output_tokens,
            "chat completion finished"
        );
        Ok(ChatCompletion {
            content: message.content.unwrap_or_default(),
            telemetry: Some(telemetry),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: Option<ChatCompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}
