use std::time::Duration;

use crate::{
    active_items_at, audible_mix_at, overlapping_pairs, visible_item_at, AudibleItem,
    CommandHistory, ItemId, ItemPatch, PlaybackClock, PlaybackEnd, PlaybackTick, Seconds,
    TimelineCommand, TimelineError, TimelineItem, TimelineState, Track, TrackId,
};

pub const DEFAULT_DURATION: Seconds = 60.0;

/// Mutable editor state: clips, tracks, the total duration and the playback cursor.
///
/// Every mutation goes through [`TimelineCommand`] so it can be undone. No
/// overlap or bounds checks are applied to clips; [`TimelineEditor::overlaps`]
/// reports collisions instead.
#[derive(Debug, Clone)]
pub struct TimelineEditor {
    state: TimelineState,
    history: CommandHistory,
    clock: PlaybackClock,
}

impl Default for TimelineEditor {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION)
    }
}

impl TimelineEditor {
    pub fn new(duration: Seconds) -> Self {
        Self {
            state: TimelineState {
                items: Vec::new(),
                tracks: Track::default_layout(),
            },
            history: CommandHistory::default(),
            clock: PlaybackClock::new(duration),
        }
    }

    /// Rebuilds an editor from stored parts. Tracks referenced by items but
    /// missing from `tracks` are appended so every item stays addressable.
    pub fn from_parts(duration: Seconds, mut tracks: Vec<Track>, items: Vec<TimelineItem>) -> Self {
        if tracks.is_empty() {
            tracks = Track::default_layout();
        }
        for item in &items {
            if !tracks.iter().any(|t| t.id == item.track_id) {
                tracing::debug!(target: "timeline", "adding implicit track {}", item.track_id);
                tracks.push(Track::for_item(item));
            }
        }
        Self {
            state: TimelineState { items, tracks },
            history: CommandHistory::default(),
            clock: PlaybackClock::new(duration),
        }
    }

    pub fn state(&self) -> &TimelineState {
        &self.state
    }

    pub fn items(&self) -> &[TimelineItem] {
        &self.state.items
    }

    pub fn item(&self, item_id: ItemId) -> Option<&TimelineItem> {
        self.state.items.iter().find(|i| i.id == item_id)
    }

    pub fn items_on_track<'a>(&'a self, track_id: &'a TrackId) -> impl Iterator<Item = &'a TimelineItem> + 'a {
        self.state.items.iter().filter(move |i| &i.track_id == track_id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.state.tracks
    }

    pub fn track(&self, track_id: &TrackId) -> Option<&Track> {
        self.state.track(track_id)
    }

    pub fn duration(&self) -> Seconds {
        self.clock.duration()
    }

    pub fn set_duration(&mut self, duration: Seconds) {
        self.clock.set_duration(duration);
    }

    /// End of the last clip; may exceed the configured duration.
    pub fn content_end(&self) -> Seconds {
        self.state
            .items
            .iter()
            .map(TimelineItem::end)
            .fold(0.0, f64::max)
    }

    pub fn apply(&mut self, command: TimelineCommand) -> Result<(), TimelineError> {
        self.history.apply(&mut self.state, command)
    }

    pub fn add_item(&mut self, item: TimelineItem) -> Result<ItemId, TimelineError> {
        let item_id = item.id;
        self.apply(TimelineCommand::AddItem {
            item,
            position: None,
        })?;
        Ok(item_id)
    }

    pub fn remove_item(&mut self, item_id: ItemId) -> Result<TimelineItem, TimelineError> {
        let removed = self
            .item(item_id)
            .cloned()
            .ok_or(TimelineError::ItemNotFound(item_id))?;
        self.apply(TimelineCommand::RemoveItem { item_id })?;
        Ok(removed)
    }

    pub fn update_item(&mut self, item_id: ItemId, patch: &ItemPatch) -> Result<(), TimelineError> {
        let mut updated = self
            .item(item_id)
            .cloned()
            .ok_or(TimelineError::ItemNotFound(item_id))?;
        updated.apply_patch(patch);
        self.apply(TimelineCommand::UpdateItem { item: updated })
    }

    /// Repositions a clip, optionally onto another track. Start is clamped at zero.
    pub fn move_item(
        &mut self,
        item_id: ItemId,
        start: Seconds,
        track_id: Option<TrackId>,
    ) -> Result<(), TimelineError> {
        let patch = ItemPatch {
            start: Some(start.max(0.0)),
            track_id,
            ..Default::default()
        };
        self.update_item(item_id, &patch)
    }

    pub fn upsert_track(&mut self, track: Track) -> Result<(), TimelineError> {
        self.apply(TimelineCommand::UpsertTrack {
            track,
            position: None,
        })
    }

    pub fn remove_track(&mut self, track_id: TrackId) -> Result<(), TimelineError> {
        self.apply(TimelineCommand::RemoveTrack { track_id })
    }

    pub fn set_track_muted(&mut self, track_id: &TrackId, muted: bool) -> Result<(), TimelineError> {
        let mut track = self
            .track(track_id)
            .cloned()
            .ok_or_else(|| TimelineError::TrackNotFound(track_id.clone()))?;
        track.muted = muted;
        self.upsert_track(track)
    }

    pub fn set_track_volume(&mut self, track_id: &TrackId, volume: f32) -> Result<(), TimelineError> {
        if !volume.is_finite() || volume < 0.0 {
            return Err(TimelineError::InvalidOp(format!("invalid track volume {volume}")));
        }
        let mut track = self
            .track(track_id)
            .cloned()
            .ok_or_else(|| TimelineError::TrackNotFound(track_id.clone()))?;
        track.volume = volume;
        self.upsert_track(track)
    }

    pub fn undo(&mut self) -> Result<(), TimelineError> {
        self.history.undo(&mut self.state)
    }

    pub fn redo(&mut self) -> Result<(), TimelineError> {
        self.history.redo(&mut self.state)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn overlaps(&self) -> Vec<(ItemId, ItemId)> {
        overlapping_pairs(&self.state.items)
    }

    pub fn active_items_at(&self, t: Seconds) -> Vec<&TimelineItem> {
        active_items_at(&self.state.items, t)
    }

    pub fn visible_item_at(&self, t: Seconds) -> Option<&TimelineItem> {
        visible_item_at(&self.state.items, &self.state.tracks, t)
    }

    pub fn audible_mix_at(&self, t: Seconds) -> Vec<AudibleItem> {
        audible_mix_at(&self.state.items, &self.state.tracks, t)
    }

    pub fn cursor(&self) -> Seconds {
        self.clock.position()
    }

    pub fn seek(&mut self, t: Seconds) {
        self.clock.seek_to(t);
    }

    pub fn play(&mut self) {
        self.clock.play();
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn toggle_playback(&mut self) {
        if self.clock.is_playing() {
            self.clock.pause();
        } else {
            self.clock.play();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn set_playback_end(&mut self, end: PlaybackEnd) {
        self.clock.set_end(end);
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.clock.set_rate(rate);
    }

    pub fn advance(&mut self, dt: Duration) -> PlaybackTick {
        self.clock.advance(dt)
    }
}
