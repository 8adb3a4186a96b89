//! Chat-driven video generation: parameters, scripts, the media pipeline and
//! the audio library.

pub mod library;
pub mod params;
pub mod pipeline;
pub mod script;
pub mod wizard;

pub use library::{generated_video_item, search_result_to_item, MediaLibrary, SEARCH_CACHE_TTL};
pub use params::{extract_duration, extract_style, is_affirmative, is_restart, GenerationParams};
pub use pipeline::{
    GenerationResult, MediaPipeline, PipelineError, PipelineFailure, ProgressEvent, SceneMedia,
    Stage, TimelineLayout, MUSIC_TRACK, VIDEO_TRACK, VOICEOVER_TRACK,
};
pub use script::{
    parse_script, revision_messages, script_request_messages, GeneratedScript, Scene,
};
pub use wizard::{ChatSession, GenerationWizard, WizardError, WizardReply, WizardState};
