use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use timeline::{ItemId, MediaType, TimelineItem, TrackId};

use crate::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub duration: f64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the editor hands to a store when saving.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDraft {
    /// `None` creates a new project; `Some` overwrites an existing one.
    pub id: Option<String>,
    pub name: String,
    pub duration: f64,
    pub items: Vec<TimelineItem>,
}

impl ProjectDraft {
    pub fn new(name: impl Into<String>, duration: f64, items: Vec<TimelineItem>) -> Self {
        Self {
            id: None,
            name: name.into(),
            duration,
            items,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Row shape of the `timeline_items` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineItemRow {
    pub id: String,
    pub project_id: String,
    pub track_id: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(rename = "type")]
    pub item_type: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub volume: Option<f32>,
    /// Order the editor had the item in; loads sort by it.
    #[serde(default)]
    pub position: i64,
}

impl TimelineItemRow {
    pub fn from_item(project_id: &str, position: usize, item: &TimelineItem) -> Self {
        Self {
            id: item.id.to_string(),
            project_id: project_id.to_string(),
            track_id: item.track_id.to_string(),
            start_time: item.start,
            duration: item.duration,
            item_type: item.media_type.as_str().to_string(),
            name: item.name.clone(),
            color: item.color.clone(),
            src: item.src.clone(),
            thumbnail: item.thumbnail.clone(),
            volume: item.volume,
            position: position as i64,
        }
    }

    pub fn into_item(self) -> Result<TimelineItem, StoreError> {
        let id: ItemId = self
            .id
            .parse()
            .map_err(|e| StoreError::InvalidRow(format!("item id {}: {e}", self.id)))?;
        let media_type: MediaType = self.item_type.parse().map_err(StoreError::InvalidRow)?;
        Ok(TimelineItem {
            id,
            track_id: TrackId::new(self.track_id),
            start: self.start_time,
            duration: self.duration,
            media_type,
            name: self.name,
            color: self.color,
            src: self.src,
            thumbnail: self.thumbnail,
            volume: self.volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_conversion_keeps_every_field() {
        let item = TimelineItem::new("audio-2", MediaType::Audio, "bed", 3.5, 12.0)
            .with_src("file:///tmp/bed.mp3")
            .with_volume(0.4);
        let row = TimelineItemRow::from_item("p1", 0, &item);
        assert_eq!(row.item_type, "audio");
        assert_eq!(row.project_id, "p1");
        assert_eq!(row.into_item().unwrap(), item);
    }

    #[test]
    fn bad_type_is_reported() {
        let item = TimelineItem::new("video-1", MediaType::Video, "shot", 0.0, 1.0);
        let mut row = TimelineItemRow::from_item("p1", 0, &item);
        row.item_type = "hologram".into();
        assert!(matches!(row.into_item(), Err(StoreError::InvalidRow(_))));
    }
}
