use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_DURATION_SECS: u32 = 30;
pub const MIN_DURATION_SECS: u32 = 5;
pub const MAX_DURATION_SECS: u32 = 300;
pub const DEFAULT_STYLE: &str = "cinematic";

pub const KNOWN_STYLES: &[&str] = &[
    "cinematic",
    "documentary",
    "animated",
    "anime",
    "cartoon",
    "minimalist",
    "vintage",
    "retro",
    "noir",
    "playful",
    "corporate",
    "dramatic",
    "dreamy",
    "realistic",
];

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,4}(?:\.\d+)?)\s*(seconds?|secs?|s|minutes?|mins?|m)\b")
        .expect("duration pattern")
});
static NO_VOICEOVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(no|without|skip|drop|remove)\s+(the\s+)?(voice[\s-]?overs?|narration|narrator|voice)\b")
        .expect("voiceover pattern")
});
static WITH_VOICEOVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(with|add|include|keep)\s+(a\s+|the\s+)?(voice[\s-]?overs?|narration|narrator)\b")
        .expect("voiceover pattern")
});
static NO_MUSIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(no|without|skip|drop|remove)\s+(the\s+)?(background\s+)?(music|soundtrack|sound)\b")
        .expect("music pattern")
});
static WITH_MUSIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(with|add|include|keep)\s+(some\s+|the\s+)?(background\s+)?(music|soundtrack)\b")
        .expect("music pattern")
});

/// What the user asked for, refined over the confirmation turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub concept: String,
    pub duration_secs: u32,
    pub style: String,
    pub include_voiceover: bool,
    pub include_music: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            concept: String::new(),
            duration_secs: DEFAULT_DURATION_SECS,
            style: DEFAULT_STYLE.to_string(),
            include_voiceover: true,
            include_music: true,
        }
    }
}

impl GenerationParams {
    pub fn from_concept(text: &str, default_duration_secs: u32) -> Self {
        let mut params = Self {
            concept: text.trim().to_string(),
            duration_secs: clamp_duration(default_duration_secs),
            ..Self::default()
        };
        params.absorb(text);
        params
    }

    /// Picks up durations, style words and voiceover/music toggles from free
    /// text. Returns whether anything changed.
    pub fn absorb(&mut self, text: &str) -> bool {
        let before = self.clone();

        if let Some(secs) = extract_duration(text) {
            self.duration_secs = secs;
        }
        if let Some(style) = extract_style(text) {
            self.style = style.to_string();
        }
        if NO_VOICEOVER_RE.is_match(text) {
            self.include_voiceover = false;
        } else if WITH_VOICEOVER_RE.is_match(text) {
            self.include_voiceover = true;
        }
        if NO_MUSIC_RE.is_match(text) {
            self.include_music = false;
        } else if WITH_MUSIC_RE.is_match(text) {
            self.include_music = true;
        }

        *self != before
    }

    /// Rough scene count: one scene per five seconds.
    pub fn suggested_scene_count(&self) -> u32 {
        (self.duration_secs / 5).clamp(1, 12)
    }
}

impl fmt::Display for GenerationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        writeln!(f, "Concept: {}", self.concept)?;
        writeln!(f, "Duration: {} seconds", self.duration_secs)?;
        writeln!(f, "Style: {}", self.style)?;
        writeln!(f, "Voiceover: {}", yes_no(self.include_voiceover))?;
        write!(f, "Music: {}", yes_no(self.include_music))
    }
}

fn clamp_duration(secs: u32) -> u32 {
    secs.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
}

pub fn extract_duration(text: &str) -> Option<u32> {
    let caps = DURATION_RE.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_ascii_lowercase();
    let secs = if unit.starts_with('m') { value * 60.0 } else { value };
    Some(clamp_duration(secs.round() as u32))
}

pub fn extract_style(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .find_map(|word| KNOWN_STYLES.iter().copied().find(|s| *s == word))
}

fn normalise(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '\'')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_affirmative(text: &str) -> bool {
    const PHRASES: &[&str] = &[
        "yes", "y", "yeah", "yep", "yup", "sure", "ok", "okay", "go", "go ahead", "do it",
        "looks good", "sounds good", "lgtm", "generate", "proceed", "confirm", "confirmed",
        "let's go", "lets go", "perfect", "great", "continue", "approve", "approved",
    ];
    let norm = normalise(text);
    if norm.is_empty() {
        return false;
    }
    PHRASES.contains(&norm.as_str())
        || norm.starts_with("yes ")
        || norm.starts_with("ok ")
        || norm.starts_with("okay ")
        || norm.starts_with("looks good")
        || norm.starts_with("sounds good")
}

pub fn is_restart(text: &str) -> bool {
    let norm = normalise(text);
    ["start over", "restart", "start again", "begin again", "new video", "reset"]
        .iter()
        .any(|p| norm.contains(p))
}
