use project::ProjectDraft;
use providers::{ProviderError, ProviderSet, SoundRequest, SpeechRequest, VideoRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use timeline::{MediaType, Seconds, TimelineItem, Track};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::params::GenerationParams;
use crate::script::{GeneratedScript, Scene};

pub const VIDEO_TRACK: &str = "video-1";
pub const VOICEOVER_TRACK: &str = "audio-1";
pub const MUSIC_TRACK: &str = "audio-2";
pub const MUSIC_VOLUME: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Video,
    Speech,
    Sound,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Video => "video",
            Stage::Speech => "speech",
            Stage::Sound => "sound",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub stage: Stage,
    pub scene: u32,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("writing media failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The first step that failed. `scene` is `None` when the run was refused
/// before any provider call.
#[derive(Debug, Error)]
#[error("{stage} stage failed{}: {source}", scene_suffix(.scene))]
pub struct PipelineFailure {
    pub stage: Stage,
    pub scene: Option<u32>,
    #[source]
    pub source: PipelineError,
}

fn scene_suffix(scene: &Option<u32>) -> String {
    scene.map(|n| format!(" on scene {n}")).unwrap_or_default()
}

impl PipelineFailure {
    fn new(stage: Stage, scene: Option<u32>, source: impl Into<PipelineError>) -> Self {
        Self {
            stage,
            scene,
            source: source.into(),
        }
    }

    pub fn provider_error(&self) -> Option<&ProviderError> {
        match &self.source {
            PipelineError::Provider(err) => Some(err),
            PipelineError::Io(_) => None,
        }
    }
}

/// Everything produced for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMedia {
    pub number: u32,
    pub duration: Seconds,
    pub visual_prompt: String,
    pub video_url: String,
    pub voiceover: Option<PathBuf>,
    pub sound: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub session_id: Uuid,
    pub script: GeneratedScript,
    pub params: GenerationParams,
    pub scenes: Vec<SceneMedia>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineLayout {
    pub tracks: Vec<Track>,
    pub items: Vec<TimelineItem>,
    pub duration: Seconds,
}

impl GenerationResult {
    /// Scenes end to end: video on the video track, voiceover and music on
    /// their audio tracks, aligned to the scene start.
    pub fn to_timeline(&self) -> TimelineLayout {
        let mut items = Vec::new();
        let mut start = 0.0;
        for scene in &self.scenes {
            items.push(
                TimelineItem::new(
                    VIDEO_TRACK,
                    MediaType::Video,
                    format!("Scene {}", scene.number),
                    start,
                    scene.duration,
                )
                .with_src(scene.video_url.clone()),
            );
            if let Some(path) = &scene.voiceover {
                items.push(
                    TimelineItem::new(
                        VOICEOVER_TRACK,
                        MediaType::Audio,
                        format!("Voiceover {}", scene.number),
                        start,
                        scene.duration,
                    )
                    .with_src(path.display().to_string()),
                );
            }
            if let Some(path) = &scene.sound {
                items.push(
                    TimelineItem::new(
                        MUSIC_TRACK,
                        MediaType::Audio,
                        format!("Music {}", scene.number),
                        start,
                        scene.duration,
                    )
                    .with_src(path.display().to_string())
                    .with_volume(MUSIC_VOLUME),
                );
            }
            start += scene.duration;
        }
        TimelineLayout {
            tracks: Track::default_layout(),
            items,
            duration: start,
        }
    }

    pub fn to_project_draft(&self, name: impl Into<String>) -> ProjectDraft {
        let layout = self.to_timeline();
        ProjectDraft::new(name, layout.duration, layout.items)
    }
}

fn wants_voiceover<'a>(scene: &'a Scene, params: &GenerationParams) -> Option<&'a str> {
    scene
        .voiceover
        .as_deref()
        .filter(|text| params.include_voiceover && !text.trim().is_empty())
}

fn wants_music<'a>(scene: &'a Scene, params: &GenerationParams) -> Option<&'a str> {
    scene
        .music
        .as_deref()
        .filter(|prompt| params.include_music && !prompt.trim().is_empty())
}

/// Turns an approved script into media, one provider call at a time.
pub struct MediaPipeline {
    providers: ProviderSet,
    media_dir: PathBuf,
}

impl MediaPipeline {
    pub fn new(providers: ProviderSet, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            providers,
            media_dir: media_dir.into(),
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Checks that every provider the script needs is configured.
    pub fn preflight(
        &self,
        script: &GeneratedScript,
        params: &GenerationParams,
    ) -> Result<(), PipelineFailure> {
        self.providers
            .require_video()
            .map_err(|e| PipelineFailure::new(Stage::Video, None, e))?;
        if script.scenes.iter().any(|s| wants_voiceover(s, params).is_some()) {
            self.providers
                .require_speech()
                .map_err(|e| PipelineFailure::new(Stage::Speech, None, e))?;
        }
        if script.scenes.iter().any(|s| wants_music(s, params).is_some()) {
            self.providers
                .require_sound()
                .map_err(|e| PipelineFailure::new(Stage::Sound, None, e))?;
        }
        Ok(())
    }

    fn total_steps(script: &GeneratedScript, params: &GenerationParams) -> usize {
        script
            .scenes
            .iter()
            .map(|s| {
                1 + usize::from(wants_voiceover(s, params).is_some())
                    + usize::from(wants_music(s, params).is_some())
            })
            .sum()
    }

    pub async fn run(
        &self,
        session_id: Uuid,
        script: &GeneratedScript,
        params: &GenerationParams,
        progress: Option<&UnboundedSender<ProgressEvent>>,
    ) -> Result<GenerationResult, PipelineFailure> {
        self.preflight(script, params)?;

        let total = Self::total_steps(script, params).max(1);
        let mut completed = 0usize;
        let mut report = |stage: Stage, scene: u32| {
            completed += 1;
            let percent = (completed * 100 / total).min(100) as u8;
            tracing::debug!(target: "pipeline", %stage, scene, percent, "step finished");
            if let Some(tx) = progress {
                let _ = tx.send(ProgressEvent {
                    percent,
                    stage,
                    scene,
                });
            }
        };

        let session_dir = self.media_dir.join(session_id.to_string());
        let mut scenes = Vec::with_capacity(script.scenes.len());
        tracing::info!(
            target: "pipeline",
            session = %session_id,
            scenes = script.scenes.len(),
            steps = total,
            "starting media generation"
        );

        // files are named by position; scene numbers come from the model and may repeat
        for (index, scene) in script.scenes.iter().enumerate() {
            let n = scene.number;
            let slot = index + 1;

            let video = self
                .providers
                .require_video()
                .map_err(|e| PipelineFailure::new(Stage::Video, Some(n), e))?;
            let mut request = VideoRequest::new(
                format!("{}, {} style", scene.visual_prompt.trim(), script.style),
                scene.duration,
            );
            request.aspect_ratio = Some("16:9".to_string());
            let generated = video.generate(&request).await.map_err(|e| {
                tracing::warn!(target: "pipeline", scene = n, error = %e, "video generation failed");
                PipelineFailure::new(Stage::Video, Some(n), e)
            })?;
            report(Stage::Video, n);

            let mut voiceover = None;
            if let Some(text) = wants_voiceover(scene, params) {
                let speech = self
                    .providers
                    .require_speech()
                    .map_err(|e| PipelineFailure::new(Stage::Speech, Some(n), e))?;
                let audio = speech
                    .synthesize(&SpeechRequest::new(text))
                    .await
                    .map_err(|e| {
                        tracing::warn!(target: "pipeline", scene = n, error = %e, "speech synthesis failed");
                        PipelineFailure::new(Stage::Speech, Some(n), e)
                    })?;
                let path = session_dir.join(format!("scene-{slot}-voice.mp3"));
                write_media(&path, &audio.bytes)
                    .await
                    .map_err(|e| PipelineFailure::new(Stage::Speech, Some(n), e))?;
                voiceover = Some(path);
                report(Stage::Speech, n);
            }

            let mut sound = None;
            if let Some(prompt) = wants_music(scene, params) {
                let provider = self
                    .providers
                    .require_sound()
                    .map_err(|e| PipelineFailure::new(Stage::Sound, Some(n), e))?;
                let mut request = SoundRequest::new(prompt);
                request.duration_secs = Some(scene.duration);
                let audio = provider.generate(&request).await.map_err(|e| {
                    tracing::warn!(target: "pipeline", scene = n, error = %e, "sound generation failed");
                    PipelineFailure::new(Stage::Sound, Some(n), e)
                })?;
                let path = session_dir.join(format!("scene-{slot}-sound.mp3"));
                write_media(&path, &audio.bytes)
                    .await
                    .map_err(|e| PipelineFailure::new(Stage::Sound, Some(n), e))?;
                sound = Some(path);
                report(Stage::Sound, n);
            }

            scenes.push(SceneMedia {
                number: n,
                duration: scene.duration,
                visual_prompt: scene.visual_prompt.clone(),
                video_url: generated.url,
                voiceover,
                sound,
            });
        }

        tracing::info!(target: "pipeline", session = %session_id, "media generation finished");
        Ok(GenerationResult {
            session_id,
            script: script.clone(),
            params: params.clone(),
            scenes,
        })
    }
}

async fn write_media(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;

    fn sample() -> (GeneratedScript, GenerationParams) {
        let script = parse_script(&providers::mock_script_reply()).unwrap();
        (script, GenerationParams::from_concept("a city waking up", 15))
    }

    #[test]
    fn steps_follow_toggles() {
        let (script, mut params) = sample();
        assert_eq!(MediaPipeline::total_steps(&script, &params), 3 + 2 + 2);
        params.include_music = false;
        assert_eq!(MediaPipeline::total_steps(&script, &params), 3 + 2);
        params.include_voiceover = false;
        assert_eq!(MediaPipeline::total_steps(&script, &params), 3);
    }

    #[test]
    fn preflight_names_the_missing_stage() {
        let (script, params) = sample();
        let mut providers = ProviderSet::mock();
        providers.speech = None;
        let pipeline = MediaPipeline::new(providers, "/tmp/unused");
        let failure = pipeline.preflight(&script, &params).unwrap_err();
        assert_eq!(failure.stage, Stage::Speech);
        assert!(failure.scene.is_none());
        assert!(matches!(
            failure.provider_error(),
            Some(ProviderError::MissingApiKey { provider: "ElevenLabs", .. })
        ));

        let mut quiet = params.clone();
        quiet.include_voiceover = false;
        quiet.include_music = false;
        let mut video_only = ProviderSet::mock();
        video_only.speech = None;
        video_only.sound = None;
        assert!(MediaPipeline::new(video_only, "/tmp/unused")
            .preflight(&script, &quiet)
            .is_ok());
    }

    #[test]
    fn timeline_lays_scenes_end_to_end() {
        let (script, params) = sample();
        let result = GenerationResult {
            session_id: Uuid::new_v4(),
            params,
            scenes: vec![
                SceneMedia {
                    number: 1,
                    duration: 4.0,
                    visual_prompt: "a".into(),
                    video_url: "mock://1".into(),
                    voiceover: Some(PathBuf::from("/m/scene-1-voice.mp3")),
                    sound: Some(PathBuf::from("/m/scene-1-sound.mp3")),
                },
                SceneMedia {
                    number: 2,
                    duration: 6.0,
                    visual_prompt: "b".into(),
                    video_url: "mock://2".into(),
                    voiceover: None,
                    sound: None,
                },
            ],
            script,
        };
        let layout = result.to_timeline();
        assert_eq!(layout.duration, 10.0);
        assert_eq!(layout.items.len(), 4);
        let second = layout
            .items
            .iter()
            .find(|i| i.name == "Scene 2")
            .unwrap();
        assert_eq!(second.start, 4.0);
        assert_eq!(second.track_id.as_str(), VIDEO_TRACK);
        let music = layout
            .items
            .iter()
            .find(|i| i.track_id.as_str() == MUSIC_TRACK)
            .unwrap();
        assert_eq!(music.volume, Some(MUSIC_VOLUME));

        let draft = result.to_project_draft("City");
        assert_eq!(draft.name, "City");
        assert_eq!(draft.duration, 10.0);
        assert!(draft.id.is_none());
    }

    #[test]
    fn failure_message_names_stage_and_scene() {
        let failure = PipelineFailure::new(Stage::Speech, Some(2), ProviderError::failed("boom"));
        assert_eq!(failure.to_string(), "speech stage failed on scene 2: boom");
    }
}
