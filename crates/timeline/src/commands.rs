use serde::{Deserialize, Serialize};

use crate::{ItemId, TimelineError, TimelineItem, Track, TrackId};

/// Items and tracks as edited by commands. Item order is insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimelineState {
    pub items: Vec<TimelineItem>,
    pub tracks: Vec<Track>,
}

impl TimelineState {
    pub fn track(&self, track_id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == track_id)
    }

    pub fn item_index(&self, item_id: ItemId) -> Option<usize> {
        self.items.iter().position(|i| i.id == item_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TimelineCommand {
    AddItem {
        item: TimelineItem,
        #[serde(default)]
        position: Option<usize>,
    },
    RemoveItem {
        item_id: ItemId,
    },
    UpdateItem {
        item: TimelineItem,
    },
    UpsertTrack {
        track: Track,
        #[serde(default)]
        position: Option<usize>,
    },
    RemoveTrack {
        track_id: TrackId,
    },
}

/// Applies `command` and returns the command that undoes it.
pub fn apply_command(
    state: &mut TimelineState,
    command: TimelineCommand,
) -> Result<TimelineCommand, TimelineError> {
    match command {
        TimelineCommand::AddItem { item, position } => add_item(state, item, position),
        TimelineCommand::RemoveItem { item_id } => remove_item(state, item_id),
        TimelineCommand::UpdateItem { item } => update_item(state, item),
        TimelineCommand::UpsertTrack { track, position } => upsert_track(state, track, position),
        TimelineCommand::RemoveTrack { track_id } => remove_track(state, track_id),
    }
}

fn add_item(
    state: &mut TimelineState,
    item: TimelineItem,
    position: Option<usize>,
) -> Result<TimelineCommand, TimelineError> {
    if state.item_index(item.id).is_some() {
        return Err(TimelineError::ItemExists(item.id));
    }
    if state.track(&item.track_id).is_none() {
        return Err(TimelineError::TrackNotFound(item.track_id));
    }
    let item_id = item.id;
    let idx = position
        .unwrap_or(state.items.len())
        .min(state.items.len());
    state.items.insert(idx, item);
    Ok(TimelineCommand::RemoveItem { item_id })
}

fn remove_item(
    state: &mut TimelineState,
    item_id: ItemId,
) -> Result<TimelineCommand, TimelineError> {
    let idx = state
        .item_index(item_id)
        .ok_or(TimelineError::ItemNotFound(item_id))?;
    let item = state.items.remove(idx);
    Ok(TimelineCommand::AddItem {
        item,
        position: Some(idx),
    })
}

fn update_item(
    state: &mut TimelineState,
    item: TimelineItem,
) -> Result<TimelineCommand, TimelineError> {
    let idx = state
        .item_index(item.id)
        .ok_or(TimelineError::ItemNotFound(item.id))?;
    if state.track(&item.track_id).is_none() {
        return Err(TimelineError::TrackNotFound(item.track_id));
    }
    let previous = std::mem::replace(&mut state.items[idx], item);
    Ok(TimelineCommand::UpdateItem { item: previous })
}

fn upsert_track(
    state: &mut TimelineState,
    track: Track,
    position: Option<usize>,
) -> Result<TimelineCommand, TimelineError> {
    if let Some(idx) = state.tracks.iter().position(|t| t.id == track.id) {
        let previous = std::mem::replace(&mut state.tracks[idx], track);
        Ok(TimelineCommand::UpsertTrack {
            track: previous,
            position: None,
        })
    } else {
        let track_id = track.id.clone();
        let idx = position
            .unwrap_or(state.tracks.len())
            .min(state.tracks.len());
        state.tracks.insert(idx, track);
        Ok(TimelineCommand::RemoveTrack { track_id })
    }
}

fn remove_track(
    state: &mut TimelineState,
    track_id: TrackId,
) -> Result<TimelineCommand, TimelineError> {
    let idx = state
        .tracks
        .iter()
        .position(|t| t.id == track_id)
        .ok_or_else(|| TimelineError::TrackNotFound(track_id.clone()))?;
    if state.items.iter().any(|i| i.track_id == track_id) {
        return Err(TimelineError::InvalidOp(format!(
            "track {track_id} still has items"
        )));
    }
    let track = state.tracks.remove(idx);
    Ok(TimelineCommand::UpsertTrack {
        track,
        position: Some(idx),
    })
}

#[derive(Debug, Default, Clone)]
pub struct CommandHistory {
    undo_stack: Vec<TimelineCommand>,
    redo_stack: Vec<TimelineCommand>,
}

impl CommandHistory {
    pub fn apply(
        &mut self,
        state: &mut TimelineState,
        command: TimelineCommand,
    ) -> Result<(), TimelineError> {
        let inverse = apply_command(state, command)?;
        self.undo_stack.push(inverse);
        self.redo_stack.clear();
        Ok(())
    }

    pub fn undo(&mut self, state: &mut TimelineState) -> Result<(), TimelineError> {
        let command = self
            .undo_stack
            .pop()
            .ok_or(TimelineError::HistoryEmpty("undo stack"))?;
        let inverse = apply_command(state, command)?;
        self.redo_stack.push(inverse);
        Ok(())
    }

    pub fn redo(&mut self, state: &mut TimelineState) -> Result<(), TimelineError> {
        let command = self
            .redo_stack
            .pop()
            .ok_or(TimelineError::HistoryEmpty("redo stack"))?;
        let inverse = apply_command(state, command)?;
        self.undo_stack.push(inverse);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MediaType, TrackKind};

    fn state_with_tracks() -> TimelineState {
        TimelineState {
            items: Vec::new(),
            tracks: Track::default_layout(),
        }
    }

    #[test]
    fn remove_then_undo_restores_original_position() {
        let mut state = state_with_tracks();
        let mut history = CommandHistory::default();
        let items: Vec<_> = (0..3)
            .map(|i| TimelineItem::new("video-1", MediaType::Video, format!("clip {i}"), i as f64, 1.0))
            .collect();
        for item in &items {
            history
                .apply(&mut state, TimelineCommand::AddItem { item: item.clone(), position: None })
                .unwrap();
        }

        history
            .apply(&mut state, TimelineCommand::RemoveItem { item_id: items[1].id })
            .unwrap();
        assert_eq!(state.items.len(), 2);

        history.undo(&mut state).unwrap();
        assert_eq!(state.items, items);

        history.redo(&mut state).unwrap();
        assert_eq!(state.items.len(), 2);
        assert!(state.item_index(items[1].id).is_none());
    }

    #[test]
    fn add_to_unknown_track_is_rejected() {
        let mut state = state_with_tracks();
        let item = TimelineItem::new("overlay-9", MediaType::Image, "logo", 0.0, 2.0);
        let err = apply_command(&mut state, TimelineCommand::AddItem { item, position: None })
            .unwrap_err();
        assert!(matches!(err, TimelineError::TrackNotFound(_)));
    }

    #[test]
    fn removing_a_used_track_fails() {
        let mut state = state_with_tracks();
        let item = TimelineItem::new("audio-2", MediaType::Audio, "bed", 0.0, 10.0);
        apply_command(&mut state, TimelineCommand::AddItem { item, position: None }).unwrap();

        let err = apply_command(
            &mut state,
            TimelineCommand::RemoveTrack { track_id: TrackId::from("audio-2") },
        )
        .unwrap_err();
        assert!(matches!(err, TimelineError::InvalidOp(_)));
    }

    #[test]
    fn track_upsert_inverse_restores_previous() {
        let mut state = state_with_tracks();
        let mut muted = state.tracks[1].clone();
        muted.muted = true;
        let inverse = apply_command(
            &mut state,
            TimelineCommand::UpsertTrack { track: muted, position: None },
        )
        .unwrap();
        assert!(state.tracks[1].muted);

        apply_command(&mut state, inverse).unwrap();
        assert!(!state.tracks[1].muted);
        assert_eq!(state.tracks[1].kind, TrackKind::Audio);
    }

    #[test]
    fn empty_history_reports_stack() {
        let mut state = state_with_tracks();
        let mut history = CommandHistory::default();
        let err = history.undo(&mut state).unwrap_err();
        assert!(matches!(err, TimelineError::HistoryEmpty("undo stack")));
    }
}
