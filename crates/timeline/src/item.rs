use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::Seconds;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Image,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Image => "image",
        }
    }

    pub fn default_color(&self) -> &'static str {
        match self {
            MediaType::Video => "#3b82f6",
            MediaType::Audio => "#10b981",
            MediaType::Image => "#f59e0b",
        }
    }

    /// Whether clips of this type contribute to the audio mix.
    pub fn is_audible(&self) -> bool {
        matches!(self, MediaType::Video | MediaType::Audio)
    }

    pub fn is_visual(&self) -> bool {
        matches!(self, MediaType::Video | MediaType::Image)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            "image" => Ok(MediaType::Image),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// A single timed media clip placed on a track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineItem {
    pub id: ItemId,
    pub track_id: TrackId,
    pub start: Seconds,
    pub duration: Seconds,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
}

impl TimelineItem {
    pub fn new(
        track_id: impl Into<TrackId>,
        media_type: MediaType,
        name: impl Into<String>,
        start: Seconds,
        duration: Seconds,
    ) -> Self {
        Self {
            id: ItemId::new(),
            track_id: track_id.into(),
            start,
            duration,
            media_type,
            name: name.into(),
            color: media_type.default_color().to_string(),
            src: None,
            thumbnail: None,
            volume: None,
        }
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn end(&self) -> Seconds {
        self.start + self.duration
    }

    pub fn contains(&self, t: Seconds) -> bool {
        t >= self.start && t < self.end()
    }

    /// Same-track clips whose ranges share a positive-length span.
    pub fn overlaps(&self, other: &TimelineItem) -> bool {
        self.track_id == other.track_id
            && self.start < other.end()
            && other.start < self.end()
    }

    pub fn apply_patch(&mut self, patch: &ItemPatch) {
        if let Some(track_id) = &patch.track_id {
            self.track_id = track_id.clone();
        }
        if let Some(start) = patch.start {
            self.start = start;
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(src) = &patch.src {
            self.src = Some(src.clone());
        }
        if let Some(thumbnail) = &patch.thumbnail {
            self.thumbnail = Some(thumbnail.clone());
        }
        if let Some(volume) = patch.volume {
            self.volume = Some(volume);
        }
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Partial update merged into an existing item; `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ItemPatch {
    #[serde(default)]
    pub track_id: Option<TrackId>,
    #[serde(default)]
    pub start: Option<Seconds>,
    #[serde(default)]
    pub duration: Option<Seconds>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub volume: Option<f32>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self == &ItemPatch::default()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
}

impl Default for TrackKind {
    fn default() -> Self {
        Self::Video
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    #[serde(default)]
    pub kind: TrackKind,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_track_volume")]
    pub volume: f32,
}

fn default_track_volume() -> f32 {
    1.0
}

impl Track {
    pub fn new(id: impl Into<TrackId>, name: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            muted: false,
            volume: default_track_volume(),
        }
    }

    pub fn default_layout() -> Vec<Track> {
        vec![
            Track::new("video-1", "Video 1", TrackKind::Video),
            Track::new("audio-1", "Voiceover", TrackKind::Audio),
            Track::new("audio-2", "Music", TrackKind::Audio),
        ]
    }

    /// Track inferred for an item whose track is not declared anywhere.
    pub fn for_item(item: &TimelineItem) -> Self {
        let kind = match item.media_type {
            MediaType::Audio => TrackKind::Audio,
            MediaType::Video | MediaType::Image => TrackKind::Video,
        };
        Track::new(item.track_id.clone(), item.track_id.to_string(), kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_requires_same_track_and_shared_span() {
        let a = TimelineItem::new("video-1", MediaType::Video, "a", 0.0, 5.0);
        let b = TimelineItem::new("video-1", MediaType::Video, "b", 4.0, 5.0);
        let touching = TimelineItem::new("video-1", MediaType::Video, "c", 5.0, 2.0);
        let other_track = TimelineItem::new("video-2", MediaType::Video, "d", 1.0, 2.0);

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&touching));
        assert!(!a.overlaps(&other_track));
    }

    #[test]
    fn patch_merges_only_given_fields() {
        let mut item = TimelineItem::new("audio-1", MediaType::Audio, "voice", 2.0, 3.0)
            .with_src("voice.mp3");
        let patch = ItemPatch {
            start: Some(4.0),
            volume: Some(0.25),
            ..Default::default()
        };
        item.apply_patch(&patch);

        assert_eq!(item.start, 4.0);
        assert_eq!(item.duration, 3.0);
        assert_eq!(item.volume, Some(0.25));
        assert_eq!(item.src.as_deref(), Some("voice.mp3"));
        assert_eq!(item.name, "voice");
    }

    #[test]
    fn item_serializes_type_field() {
        let item = TimelineItem::new("video-1", MediaType::Image, "still", 0.0, 1.0);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["track_id"], "video-1");
        assert!(json.get("src").is_none());
    }

    #[test]
    fn media_type_parses_case_insensitively() {
        assert_eq!("Video".parse::<MediaType>().unwrap(), MediaType::Video);
        assert!("gif".parse::<MediaType>().is_err());
    }
}
