use providers::{ChatMessage, ProviderError, ProviderSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::params::{is_affirmative, is_restart, GenerationParams, DEFAULT_DURATION_SECS};
use crate::pipeline::{GenerationResult, MediaPipeline, ProgressEvent};
use crate::script::{parse_script, revision_messages, script_request_messages, GeneratedScript};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardState {
    CollectingConcept,
    ConfirmingParameters,
    GeneratingScript,
    ReviewingScript,
    GeneratingMedia,
    Complete,
    Failed,
}

impl WizardState {
    pub fn is_running(&self) -> bool {
        matches!(self, WizardState::GeneratingScript | WizardState::GeneratingMedia)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, WizardState::Complete | WizardState::Failed)
    }
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WizardState::CollectingConcept => "collecting concept",
            WizardState::ConfirmingParameters => "confirming parameters",
            WizardState::GeneratingScript => "generating script",
            WizardState::ReviewingScript => "reviewing script",
            WizardState::GeneratingMedia => "generating media",
            WizardState::Complete => "complete",
            WizardState::Failed => "failed",
        })
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("no finished video yet (wizard is {0})")]
    NotComplete(WizardState),
}

/// One run of the wizard. Lives in memory only.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub messages: Vec<ChatMessage>,
    pub params: Option<GenerationParams>,
    pub script: Option<GeneratedScript>,
    pub result: Option<GenerationResult>,
}

impl ChatSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            params: None,
            script: None,
            result: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WizardReply {
    pub messages: Vec<String>,
    pub state: WizardState,
}

const GREETING: &str = "Hi! Describe the video you want to make. You can mention a length \
(\"45 seconds\"), a style (\"noir\", \"animated\") or say \"no voiceover\" / \"no music\".";

pub struct GenerationWizard {
    providers: ProviderSet,
    pipeline: MediaPipeline,
    default_duration: u32,
    progress: Option<UnboundedSender<ProgressEvent>>,
    session: ChatSession,
    state: WizardState,
}

impl GenerationWizard {
    pub fn new(providers: ProviderSet, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipeline: MediaPipeline::new(providers.clone(), media_dir),
            providers,
            default_duration: DEFAULT_DURATION_SECS,
            progress: None,
            session: ChatSession::new(),
            state: WizardState::CollectingConcept,
        }
    }

    pub fn with_default_duration(mut self, secs: u32) -> Self {
        self.default_duration = secs;
        self
    }

    /// Media progress is forwarded to this channel while a run is in flight.
    pub fn with_progress(mut self, tx: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        self.session.result.as_ref()
    }

    pub fn take_result(&mut self) -> Result<GenerationResult, WizardError> {
        if self.state != WizardState::Complete {
            return Err(WizardError::NotComplete(self.state));
        }
        self.session
            .result
            .take()
            .ok_or(WizardError::NotComplete(self.state))
    }

    pub fn greeting(&mut self) -> WizardReply {
        self.reply(vec![GREETING.to_string()])
    }

    pub fn reset(&mut self) {
        tracing::debug!(target: "wizard", session = %self.session.id, "session reset");
        self.session = ChatSession::new();
        self.state = WizardState::CollectingConcept;
    }

    pub async fn send(&mut self, text: &str) -> WizardReply {
        let text = text.trim();
        if text.is_empty() {
            return self.reply(vec!["I didn't catch that. Could you say it again?".to_string()]);
        }
        if self.state.is_running() {
            return WizardReply {
                messages: vec!["Still working on the last request.".to_string()],
                state: self.state,
            };
        }

        if self.state != WizardState::CollectingConcept && is_restart(text) {
            self.reset();
            self.session.messages.push(ChatMessage::user(text));
            return self.reply(vec![format!("Starting over. {GREETING}")]);
        }
        if self.state.is_finished() {
            self.reset();
        }
        self.session.messages.push(ChatMessage::user(text));

        match self.state {
            WizardState::CollectingConcept => self.take_concept(text),
            WizardState::ConfirmingParameters if is_affirmative(text) => {
                // "yes, but 60 seconds" still carries a change
                if let Some(params) = self.session.params.as_mut() {
                    if params.absorb(text) {
                        tracing::debug!(target: "wizard", "confirmation adjusted parameters");
                    }
                }
                self.generate_script().await
            }
            WizardState::ConfirmingParameters => self.adjust_params(text),
            WizardState::ReviewingScript if is_affirmative(text) => self.generate_media().await,
            WizardState::ReviewingScript => self.revise_script(text).await,
            // unreachable after the checks above
            _ => self.reply(Vec::new()),
        }
    }

    fn reply(&mut self, messages: Vec<String>) -> WizardReply {
        for message in &messages {
            self.session
                .messages
                .push(ChatMessage::assistant(message.clone()));
        }
        WizardReply {
            messages,
            state: self.state,
        }
    }

    fn confirm_prompt(params: &GenerationParams) -> String {
        format!(
            "Here is what I have:\n{params}\n\nReply \"yes\" to write the script, or tell me what to change."
        )
    }

    fn take_concept(&mut self, text: &str) -> WizardReply {
        let params = GenerationParams::from_concept(text, self.default_duration);
        tracing::info!(
            target: "wizard",
            session = %self.session.id,
            duration = params.duration_secs,
            style = %params.style,
            "concept received"
        );
        let prompt = Self::confirm_prompt(&params);
        self.session.params = Some(params);
        self.state = WizardState::ConfirmingParameters;
        self.reply(vec![prompt])
    }

    fn adjust_params(&mut self, text: &str) -> WizardReply {
        let params = self.session.params.get_or_insert_with(GenerationParams::default);
        if !params.absorb(text) {
            if !params.concept.is_empty() {
                params.concept.push(' ');
            }
            params.concept.push_str(text);
        }
        let prompt = Self::confirm_prompt(params);
        self.reply(vec![prompt])
    }

    async fn generate_script(&mut self) -> WizardReply {
        let chat = match self.providers.require_chat() {
            Ok(chat) => chat,
            Err(err) => return self.reply(vec![err.to_string()]),
        };
        let params = self.session.params.clone().unwrap_or_default();

        self.state = WizardState::GeneratingScript;
        tracing::info!(target: "wizard", session = %self.session.id, model = chat.model(), "requesting script");
        let completion = match chat.complete(&script_request_messages(&params)).await {
            Ok(completion) => completion,
            Err(err) => {
                tracing::warn!(target: "wizard", error = %err, "script request failed");
                self.state = WizardState::ConfirmingParameters;
                return self.reply(vec![format!(
                    "Script generation failed: {}. Reply \"yes\" to try again.",
                    describe(&err)
                )]);
            }
        };

        match parse_script(&completion.content) {
            Some(script) => {
                let summary = script.summary();
                self.session.script = Some(script);
                self.state = WizardState::ReviewingScript;
                self.reply(vec![
                    summary,
                    "Reply \"yes\" to generate the video, or tell me what to change.".to_string(),
                ])
            }
            None => {
                self.state = WizardState::ConfirmingParameters;
                self.reply(vec![
                    completion.content,
                    "I couldn't read a script out of that reply. Reply \"yes\" to try again."
                        .to_string(),
                ])
            }
        }
    }

    async fn revise_script(&mut self, feedback: &str) -> WizardReply {
        let (Some(params), Some(script)) = (self.session.params.clone(), self.session.script.clone())
        else {
            self.state = WizardState::ConfirmingParameters;
            return self.reply(vec!["There is no script to revise yet.".to_string()]);
        };
        let chat = match self.providers.require_chat() {
            Ok(chat) => chat,
            Err(err) => return self.reply(vec![err.to_string()]),
        };

        self.state = WizardState::GeneratingScript;
        let result = chat
            .complete(&revision_messages(&params, &script, feedback))
            .await;
        self.state = WizardState::ReviewingScript;
        match result {
            Ok(completion) => match parse_script(&completion.content) {
                Some(revised) => {
                    let summary = revised.summary();
                    self.session.script = Some(revised);
                    self.reply(vec![
                        summary,
                        "Reply \"yes\" to generate the video, or tell me what else to change."
                            .to_string(),
                    ])
                }
                None => self.reply(vec![
                    completion.content,
                    "I couldn't read a revised script out of that, so the previous one stands."
                        .to_string(),
                ]),
            },
            Err(err) => {
                tracing::warn!(target: "wizard", error = %err, "revision request failed");
                self.reply(vec![format!(
                    "Revision failed: {}. The previous script stands.",
                    describe(&err)
                )])
            }
        }
    }

    async fn generate_media(&mut self) -> WizardReply {
        let (Some(params), Some(script)) = (self.session.params.clone(), self.session.script.clone())
        else {
            self.state = WizardState::ConfirmingParameters;
            return self.reply(vec!["There is no script to produce yet.".to_string()]);
        };
        if let Err(failure) = self.pipeline.preflight(&script, &params) {
            let message = match failure.provider_error() {
                Some(err) => err.to_string(),
                None => failure.to_string(),
            };
            return self.reply(vec![message]);
        }

        self.state = WizardState::GeneratingMedia;
        let run = self
            .pipeline
            .run(self.session.id, &script, &params, self.progress.as_ref())
            .await;
        match run {
            Ok(result) => {
                let layout = result.to_timeline();
                let message = format!(
                    "Your video \"{}\" is ready: {} scenes, {:.0} seconds, {} timeline clips.",
                    script.title,
                    result.scenes.len(),
                    layout.duration,
                    layout.items.len()
                );
                self.session.result = Some(result);
                self.state = WizardState::Complete;
                self.reply(vec![message])
            }
            Err(failure) => {
                tracing::error!(target: "wizard", session = %self.session.id, error = %failure, "media generation failed");
                self.state = WizardState::Failed;
                self.reply(vec![format!(
                    "{failure}. Send a new idea to start again."
                )])
            }
        }
    }
}

fn describe(err: &ProviderError) -> String {
    match err {
        ProviderError::Authentication(_) => format!("{err} (check your API key)"),
        _ => err.to_string(),
    }
}
