use once_cell::sync::Lazy;
use providers::ChatMessage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write as _;

use crate::params::{GenerationParams, DEFAULT_DURATION_SECS};

static FENCED_JSON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("fenced json pattern")
});

const SYSTEM_PROMPT: &str = "You are a creative director who writes short video scripts. \
Each script is split into scenes that will be rendered by a text-to-video model, so every \
visual prompt must describe one continuous shot in concrete visual terms (subject, setting, \
camera, lighting). Keep voiceover lines short enough to be spoken within the scene.";

const FORMAT_PROMPT: &str = r#"Return the script as JSON inside a ```json code block, using exactly this shape:
{
  "title": "short title",
  "logline": "one sentence summary",
  "style": "visual style",
  "duration": total seconds as a number,
  "scenes": [
    {
      "sceneNumber": 1,
      "visualPrompt": "what the camera sees",
      "voiceover": "narration for this scene, or omit",
      "music": "music or sound-effect prompt for this scene, or omit",
      "duration": seconds as a number
    }
  ]
}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub number: u32,
    pub visual_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voiceover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub title: String,
    pub logline: String,
    pub style: String,
    pub duration: f64,
    pub scenes: Vec<Scene>,
}

impl GeneratedScript {
    pub fn has_voiceover(&self) -> bool {
        self.scenes.iter().any(|s| s.voiceover.is_some())
    }

    pub fn has_music(&self) -> bool {
        self.scenes.iter().any(|s| s.music.is_some())
    }

    pub fn total_scene_duration(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration).sum()
    }

    /// Plain-text rendering shown to the user for review.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\"{}\" ({}, {:.0}s)", self.title, self.style, self.duration);
        if !self.logline.is_empty() {
            let _ = writeln!(out, "{}", self.logline);
        }
        for scene in &self.scenes {
            let _ = writeln!(
                out,
                "\nScene {} ({:.1}s): {}",
                scene.number, scene.duration, scene.visual_prompt
            );
            if let Some(vo) = &scene.voiceover {
                let _ = writeln!(out, "  Voiceover: {vo}");
            }
            if let Some(music) = &scene.music {
                let _ = writeln!(out, "  Music: {music}");
            }
        }
        out.trim_end().to_string()
    }
}

/// Best-effort extraction of a script from a chat reply. Tries a fenced JSON
/// block first, then the outermost braces.
pub fn parse_script(text: &str) -> Option<GeneratedScript> {
    let mut candidates: Vec<&str> = FENCED_JSON_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if let (Some(open), Some(close)) = (text.find('{'), text.rfind('}')) {
        if open < close {
            candidates.push(&text[open..=close]);
        }
    }

    for candidate in candidates {
        let Ok(value) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        if let Some(script) = script_from_value(&value) {
            return Some(script);
        }
    }
    tracing::warn!(target: "wizard", "no usable script found in a {} byte reply", text.len());
    None
}

fn script_from_value(value: &Value) -> Option<GeneratedScript> {
    let mut obj = value.as_object()?;
    if !obj.contains_key("scenes") {
        obj = ["script", "data", "result"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_object))
            .filter(|inner| inner.contains_key("scenes"))?;
    }
    let raw_scenes = obj.get("scenes")?.as_array()?;

    struct Partial {
        number: u32,
        visual_prompt: String,
        voiceover: Option<String>,
        music: Option<String>,
        duration: Option<f64>,
    }

    let partials: Vec<Partial> = raw_scenes
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            let scene = raw.as_object()?;
            let visual_prompt = text_field(
                scene,
                &[
                    "visualPrompt",
                    "visual_prompt",
                    "videoPrompt",
                    "video_prompt",
                    "visual",
                    "visualDescription",
                    "visual_description",
                    "prompt",
                    "description",
                ],
            )?;
            Some(Partial {
                number: number_field(scene, &["sceneNumber", "scene_number", "number", "scene", "id"])
                    .filter(|n| *n >= 1.0)
                    .map(|n| n as u32)
                    .unwrap_or(index as u32 + 1),
                visual_prompt,
                voiceover: text_field(
                    scene,
                    &["voiceover", "voiceOver", "voice_over", "narration", "voiceoverText"],
                ),
                music: text_field(
                    scene,
                    &["music", "musicPrompt", "music_prompt", "sound", "soundEffect", "sfx", "audio"],
                ),
                duration: number_field(scene, &["duration", "durationSeconds", "duration_seconds"])
                    .filter(|d| *d > 0.0),
            })
        })
        .collect();
    if partials.is_empty() {
        return None;
    }

    let known: f64 = partials.iter().filter_map(|p| p.duration).sum();
    let missing = partials.iter().filter(|p| p.duration.is_none()).count();
    let declared = number_field(obj, &["duration", "totalDuration", "total_duration", "durationSeconds"])
        .filter(|d| *d > 0.0);
    let total = declared.unwrap_or(if missing == 0 {
        known
    } else {
        DEFAULT_DURATION_SECS as f64
    });
    let fill = if missing > 0 {
        let remaining = total - known;
        if remaining > 0.0 {
            remaining / missing as f64
        } else {
            total / partials.len() as f64
        }
    } else {
        0.0
    };

    let scenes: Vec<Scene> = partials
        .into_iter()
        .map(|p| Scene {
            number: p.number,
            visual_prompt: p.visual_prompt,
            voiceover: p.voiceover,
            music: p.music,
            duration: p.duration.unwrap_or(fill),
        })
        .collect();

    Some(GeneratedScript {
        title: text_field(obj, &["title", "name"]).unwrap_or_else(|| "Untitled".to_string()),
        logline: text_field(obj, &["logline", "logLine", "log_line", "tagline", "summary"])
            .unwrap_or_default(),
        style: text_field(obj, &["style", "visualStyle", "visual_style"])
            .unwrap_or_else(|| "cinematic".to_string()),
        duration: total,
        scenes,
    })
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Accepts numbers and numeric strings such as `"5"` or `"5s"`.
fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches(|c: char| c.is_alphabetic() || c.is_whitespace())
            .parse()
            .ok(),
        _ => None,
    })
}

fn request_prompt(params: &GenerationParams) -> String {
    let mut prompt = format!(
        "Write a script for a {}-second {} video about: {}\n",
        params.duration_secs, params.style, params.concept
    );
    let _ = writeln!(
        prompt,
        "Use about {} scenes whose durations add up to {} seconds.",
        params.suggested_scene_count(),
        params.duration_secs
    );
    if params.include_voiceover {
        prompt.push_str("Give each scene a short voiceover line.\n");
    } else {
        prompt.push_str("Do not include any voiceover.\n");
    }
    if params.include_music {
        prompt.push_str("Give scenes a music or sound-effect prompt where it helps the mood.\n");
    } else {
        prompt.push_str("Do not include music or sound prompts.\n");
    }
    prompt.push('\n');
    prompt.push_str(FORMAT_PROMPT);
    prompt
}

pub fn script_request_messages(params: &GenerationParams) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(request_prompt(params)),
    ]
}

/// Replays the original request and the current script, then asks for a revised one.
pub fn revision_messages(
    params: &GenerationParams,
    script: &GeneratedScript,
    feedback: &str,
) -> Vec<ChatMessage> {
    let current = serde_json::to_string_pretty(&script_to_wire(script)).unwrap_or_default();
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(request_prompt(params)),
        ChatMessage::assistant(format!("```json\n{current}\n```")),
        ChatMessage::user(format!(
            "Revise the script with this feedback: {}\nReturn the complete revised script in the same JSON shape.",
            feedback.trim()
        )),
    ]
}

fn script_to_wire(script: &GeneratedScript) -> Value {
    serde_json::json!({
        "title": script.title,
        "logline": script.logline,
        "style": script.style,
        "duration": script.duration,
        "scenes": script.scenes.iter().map(|s| serde_json::json!({
            "sceneNumber": s.number,
            "visualPrompt": s.visual_prompt,
            "voiceover": s.voiceover,
            "music": s.music,
            "duration": s.duration,
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_with_camel_case() {
        let reply = providers::mock_script_reply();
        let script = parse_script(&reply).unwrap();
        assert_eq!(script.title, "Mock Story");
        assert_eq!(script.scenes.len(), 3);
        assert_eq!(script.scenes[1].voiceover.as_deref(), Some("Some begin with a single cup."));
        assert!(script.scenes[1].music.is_none());
        assert_eq!(script.duration, 15.0);
    }

    #[test]
    fn bare_braces_with_snake_case_and_gaps() {
        let reply = r#"Sure! {"title": "Tides", "total_duration": 20,
            "scenes": [
              {"visual_prompt": "waves at night", "voice_over": "The sea remembers.", "duration": "8s"},
              {"visual_description": "gulls over a pier"},
              {"voiceover": "orphan line with no visual"}
            ]} Hope you like it."#;
        let script = parse_script(reply).unwrap();
        assert_eq!(script.scenes.len(), 2);
        assert_eq!(script.scenes[0].number, 1);
        assert_eq!(script.scenes[0].duration, 8.0);
        assert_eq!(script.scenes[1].number, 2);
        assert_eq!(script.scenes[1].duration, 12.0);
        assert_eq!(script.style, "cinematic");
    }

    #[test]
    fn scene_numbers_are_kept_as_given() {
        let reply = r#"```json
{"title":"x","duration":10,"scenes":[{"sceneNumber":3,"visualPrompt":"a"},{"sceneNumber":7,"visualPrompt":"b"}]}
```"#;
        let script = parse_script(reply).unwrap();
        let numbers: Vec<u32> = script.scenes.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![3, 7]);
        assert_eq!(script.scenes[0].duration, 5.0);
    }

    #[test]
    fn unusable_replies_give_none() {
        assert!(parse_script("I'm sorry, I can't help with that.").is_none());
        assert!(parse_script("```json\n{\"title\": \"no scenes\"}\n```").is_none());
        assert!(parse_script("{\"scenes\": [{\"voiceover\": \"only audio\"}]}").is_none());
        assert!(parse_script("{ not json }").is_none());
    }

    #[test]
    fn nested_script_object_is_unwrapped() {
        let reply = r#"{"script": {"title": "Wrapped", "scenes": [{"prompt": "a door opens", "duration": 4}]}}"#;
        let script = parse_script(reply).unwrap();
        assert_eq!(script.title, "Wrapped");
        assert_eq!(script.duration, 4.0);
    }

    #[test]
    fn revision_replays_the_current_script() {
        let params = GenerationParams::from_concept("a robot learns to paint", 30);
        let script = parse_script(&providers::mock_script_reply()).unwrap();
        let messages = revision_messages(&params, &script, "make scene 2 brighter");
        assert_eq!(messages.len(), 4);
        assert!(messages[2].content.contains("Mock Story"));
        assert!(messages[3].content.contains("make scene 2 brighter"));
        let replayed = parse_script(&messages[2].content).unwrap();
        assert_eq!(replayed, script);
    }

    #[test]
    fn request_mentions_toggles() {
        let mut params = GenerationParams::from_concept("city at night", 30);
        params.include_voiceover = false;
        let messages = script_request_messages(&params);
        assert!(messages[1].content.contains("Do not include any voiceover"));
        assert!(messages[1].content.contains("city at night"));
    }
}
