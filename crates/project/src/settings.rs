use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub replicate: Option<String>,
    pub elevenlabs: Option<String>,
    pub freesound: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSettings {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Preferences {
    pub chat_model: String,
    pub video_model: String,
    pub voice_id: String,
    pub default_duration_secs: u32,
    pub video_timeout_secs: u64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            chat_model: "gpt-4o-mini".into(),
            video_model: "minimax/video-01".into(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".into(),
            default_duration_secs: 30,
            video_timeout_secs: 15 * 60,
        }
    }
}

/// Everything the CLI reads from `settings.json`. Keys are stored in plain text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_keys: ApiKeys,
    pub backend: BackendSettings,
    pub preferences: Preferences,
}

impl Settings {
    pub fn default_path() -> PathBuf {
        crate::app_data_dir().join(SETTINGS_FILE)
    }

    /// Missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Environment variables win over the file.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let take = |name: &str, slot: &mut Option<String>| {
            if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                tracing::debug!(target: "settings", "{} taken from environment", name);
                *slot = Some(value);
            }
        };
        take("OPENAI_API_KEY", &mut self.api_keys.openai);
        take("REPLICATE_API_TOKEN", &mut self.api_keys.replicate);
        take("ELEVENLABS_API_KEY", &mut self.api_keys.elevenlabs);
        take("FREESOUND_API_KEY", &mut self.api_keys.freesound);
        take("STORYREEL_BACKEND_URL", &mut self.backend.url);
        take("STORYREEL_BACKEND_KEY", &mut self.backend.anon_key);
    }

    /// Sets a value by dotted name, e.g. `api_keys.openai` or `preferences.voice_id`.
    /// An empty value clears optional keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let opt = || {
            let v = value.trim();
            (!v.is_empty()).then(|| v.to_string())
        };
        match key {
            "api_keys.openai" => self.api_keys.openai = opt(),
            "api_keys.replicate" => self.api_keys.replicate = opt(),
            "api_keys.elevenlabs" => self.api_keys.elevenlabs = opt(),
            "api_keys.freesound" => self.api_keys.freesound = opt(),
            "backend.url" => self.backend.url = opt(),
            "backend.anon_key" => self.backend.anon_key = opt(),
            "preferences.chat_model" => self.preferences.chat_model = value.trim().to_string(),
            "preferences.video_model" => self.preferences.video_model = value.trim().to_string(),
            "preferences.voice_id" => self.preferences.voice_id = value.trim().to_string(),
            "preferences.default_duration_secs" => {
                self.preferences.default_duration_secs = value
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} expects whole seconds"))?
            }
            "preferences.video_timeout_secs" => {
                self.preferences.video_timeout_secs = value
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} expects whole seconds"))?
            }
            other => bail!("unknown setting '{other}'"),
        }
        Ok(())
    }

    /// `key = value` lines with secrets masked.
    pub fn display_lines(&self) -> Vec<String> {
        let secret = |v: &Option<String>| v.as_deref().map(mask).unwrap_or_else(|| "(unset)".into());
        vec![
            format!("api_keys.openai = {}", secret(&self.api_keys.openai)),
            format!("api_keys.replicate = {}", secret(&self.api_keys.replicate)),
            format!("api_keys.elevenlabs = {}", secret(&self.api_keys.elevenlabs)),
            format!("api_keys.freesound = {}", secret(&self.api_keys.freesound)),
            format!(
                "backend.url = {}",
                self.backend.url.as_deref().unwrap_or("(unset, using local store)")
            ),
            format!("backend.anon_key = {}", secret(&self.backend.anon_key)),
            format!("preferences.chat_model = {}", self.preferences.chat_model),
            format!("preferences.video_model = {}", self.preferences.video_model),
            format!("preferences.voice_id = {}", self.preferences.voice_id),
            format!(
                "preferences.default_duration_secs = {}",
                self.preferences.default_duration_secs
            ),
            format!(
                "preferences.video_timeout_secs = {}",
                self.preferences.video_timeout_secs
            ),
        ]
    }
}

/// Keeps the last four characters visible.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".into();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}
