use async_trait::async_trait;

use crate::models::{
    ChatCompletion, ChatMessage, GeneratedAudio, GeneratedVideo, SoundRequest, SoundSearchResult,
    SpeechRequest, VideoRequest,
};
use crate::ProviderError;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, ProviderError>;
}

#[async_trait]
pub trait VideoProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, request: &VideoRequest) -> Result<GeneratedVideo, ProviderError>;
}

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn synthesize(&self, request: &SpeechRequest) -> Result<GeneratedAudio, ProviderError>;
}

#[async_trait]
pub trait SoundProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, request: &SoundRequest) -> Result<GeneratedAudio, ProviderError>;
}

#[async_trait]
pub trait AudioSearch: Send + Sync {
    fn name(&self) -> &str;
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SoundSearchResult>, ProviderError>;
}
