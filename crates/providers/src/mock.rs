use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::{
    ChatCompletion, ChatMessage, GeneratedAudio, GeneratedVideo, SoundRequest, SoundSearchResult,
    SpeechRequest, VideoRequest,
};
use crate::service::{AudioSearch, ChatProvider, SoundProvider, SpeechProvider, VideoProvider};
use crate::ProviderError;

/// Chat provider that replays scripted replies, then falls back to a canned script.
#[derive(Default)]
pub struct MockChat {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockChat {
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::default();
        for reply in replies {
            mock.push_reply(reply);
        }
        mock
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, err: ProviderError) {
        self.replies.lock().push_back(Err(err));
    }

    /// Every message list this mock was asked to complete, oldest first.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().clone()
    }
}

pub fn mock_script_reply() -> String {
    let script = json!({
        "title": "Mock Story",
        "logline": "A placeholder story used when no chat provider is configured.",
        "style": "cinematic",
        "duration": 15,
        "scenes": [
            {
                "sceneNumber": 1,
                "visualPrompt": "Wide establishing shot of a quiet city at dawn",
                "voiceover": "Every city wakes up differently.",
                "music": "soft ambient pads",
                "duration": 5
            },
            {
                "sceneNumber": 2,
                "visualPrompt": "Close-up of hands pouring coffee in a small cafe",
                "voiceover": "Some begin with a single cup.",
                "duration": 5
            },
            {
                "sceneNumber": 3,
                "visualPrompt": "Time-lapse of streets filling with people",
                "music": "rising strings",
                "duration": 5
            }
        ]
    });
    format!(
        "Here is your script:\n\n```json\n{}\n```\n",
        serde_json::to_string_pretty(&script).unwrap_or_default()
    )
}

#[async_trait]
impl ChatProvider for MockChat {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "storyreel-mock-llm"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, ProviderError> {
        self.requests.lock().push(messages.to_vec());
        let next = self.replies.lock().pop_front();
        let content = match next {
            Some(reply) => reply?,
            None => mock_script_reply(),
        };
        Ok(ChatCompletion {
            content,
            telemetry: None,
        })
    }
}

/// Fails on the call with the given zero-based index, or on every call.
#[derive(Clone, Debug, Default)]
enum FailurePlan {
    #[default]
    Never,
    Always(ProviderError),
    OnCall(usize, ProviderError),
}

impl FailurePlan {
    fn check(&self, call: usize) -> Result<(), ProviderError> {
        match self {
            FailurePlan::Never => Ok(()),
            FailurePlan::Always(err) => Err(err.clone()),
            FailurePlan::OnCall(n, err) if *n == call => Err(err.clone()),
            FailurePlan::OnCall(..) => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MockVideo {
    failure: FailurePlan,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockVideo {
    pub fn failing(err: ProviderError) -> Self {
        Self {
            failure: FailurePlan::Always(err),
            ..Self::default()
        }
    }

    pub fn failing_on_call(call: usize, err: ProviderError) -> Self {
        Self {
            failure: FailurePlan::OnCall(call, err),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl VideoProvider for MockVideo {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &VideoRequest) -> Result<GeneratedVideo, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());
        self.failure.check(call)?;
        Ok(GeneratedVideo {
            url: format!("mock://video/{}.mp4", call + 1),
            prediction_id: Some(format!("mock-{}", call + 1)),
            duration_secs: request.duration_secs,
        })
    }
}

const MOCK_MP3: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00mock-audio";

#[derive(Default)]
pub struct MockSpeech {
    failure: FailurePlan,
    calls: AtomicUsize,
}

impl MockSpeech {
    pub fn failing(err: ProviderError) -> Self {
        Self {
            failure: FailurePlan::Always(err),
            ..Self::default()
        }
    }

    pub fn failing_on_call(call: usize, err: ProviderError) -> Self {
        Self {
            failure: FailurePlan::OnCall(call, err),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechProvider for MockSpeech {
    fn name(&self) -> &str {
        "mock"
    }

    async fn synthesize(&self, _request: &SpeechRequest) -> Result<GeneratedAudio, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.failure.check(call)?;
        Ok(GeneratedAudio::mp3(MOCK_MP3.to_vec()))
    }
}

#[derive(Default)]
pub struct MockSound {
    failure: FailurePlan,
    calls: AtomicUsize,
}

impl MockSound {
    pub fn failing(err: ProviderError) -> Self {
        Self {
            failure: FailurePlan::Always(err),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SoundProvider for MockSound {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, _request: &SoundRequest) -> Result<GeneratedAudio, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.failure.check(call)?;
        Ok(GeneratedAudio::mp3(MOCK_MP3.to_vec()))
    }
}

/// Search over a fixed catalogue; a result matches when its name contains a query word.
pub struct MockSearch {
    catalogue: Vec<SoundSearchResult>,
    calls: AtomicUsize,
}

impl Default for MockSearch {
    fn default() -> Self {
        let entry = |id: u64, name: &str, duration: f64| SoundSearchResult {
            id,
            name: name.to_string(),
            duration,
            preview_url: Some(format!("mock://sound/{id}.mp3")),
            license: Some("CC0".to_string()),
            username: Some("storyreel".to_string()),
        };
        Self::with_catalogue(vec![
            entry(1, "Rain on window", 30.0),
            entry(2, "City traffic ambience", 45.0),
            entry(3, "Calm piano loop", 20.0),
            entry(4, "Ocean waves", 60.0),
        ])
    }
}

impl MockSearch {
    pub fn with_catalogue(catalogue: Vec<SoundSearchResult>) -> Self {
        Self {
            catalogue,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSearch for MockSearch {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SoundSearchResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        Ok(self
            .catalogue
            .iter()
            .filter(|r| {
                let name = r.name.to_lowercase();
                words.iter().any(|w| name.contains(w.as_str()))
            })
            .take(limit)
            .cloned()
            .collect())
    }
}
