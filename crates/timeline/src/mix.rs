use serde::Serialize;

use crate::{ItemId, Seconds, TimelineItem, Track, TrackId};

/// One clip contributing to the audio mix at a given instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudibleItem {
    pub item_id: ItemId,
    pub track_id: TrackId,
    pub gain: f32,
    /// Time into the clip's media.
    pub offset: Seconds,
}

pub fn effective_gain(item: &TimelineItem, track: Option<&Track>) -> f32 {
    let clip = item.volume.unwrap_or(1.0).clamp(0.0, 1.0);
    match track {
        Some(t) if t.muted => 0.0,
        Some(t) => clip * t.volume.clamp(0.0, 1.0),
        None => clip,
    }
}

pub fn active_items_at(items: &[TimelineItem], t: Seconds) -> Vec<&TimelineItem> {
    items.iter().filter(|i| i.contains(t)).collect()
}

/// Every pair of same-track items whose spans intersect, in item order.
pub fn overlapping_pairs(items: &[TimelineItem]) -> Vec<(ItemId, ItemId)> {
    let mut out = Vec::new();
    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            if a.overlaps(b) {
                out.push((a.id, b.id));
            }
        }
    }
    out
}

/// Top-most visual clip at `t`: higher track index wins, then the later start.
pub fn visible_item_at<'a>(
    items: &'a [TimelineItem],
    tracks: &[Track],
    t: Seconds,
) -> Option<&'a TimelineItem> {
    let track_rank = |item: &TimelineItem| {
        tracks
            .iter()
            .position(|tr| tr.id == item.track_id)
            .unwrap_or(0)
    };
    items
        .iter()
        .filter(|i| i.media_type.is_visual() && i.contains(t))
        .max_by(|a, b| {
            track_rank(a)
                .cmp(&track_rank(b))
                .then(a.start.total_cmp(&b.start))
        })
}

pub fn audible_mix_at(items: &[TimelineItem], tracks: &[Track], t: Seconds) -> Vec<AudibleItem> {
    items
        .iter()
        .filter(|i| i.media_type.is_audible() && i.contains(t))
        .map(|i| {
            let track = tracks.iter().find(|tr| tr.id == i.track_id);
            AudibleItem {
                item_id: i.id,
                track_id: i.track_id.clone(),
                gain: effective_gain(i, track),
                offset: t - i.start,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MediaType, TrackKind};

    #[test]
    fn muted_track_silences_clip() {
        let mut track = Track::new("audio-1", "Voice", TrackKind::Audio);
        let item = TimelineItem::new("audio-1", MediaType::Audio, "vo", 0.0, 4.0).with_volume(0.8);
        assert!((effective_gain(&item, Some(&track)) - 0.8).abs() < f32::EPSILON);

        track.muted = true;
        assert_eq!(effective_gain(&item, Some(&track)), 0.0);
    }

    #[test]
    fn gain_is_clamped_and_scaled_by_track() {
        let mut track = Track::new("audio-2", "Music", TrackKind::Audio);
        track.volume = 0.5;
        let loud = TimelineItem::new("audio-2", MediaType::Audio, "bed", 0.0, 4.0).with_volume(3.0);
        assert!((effective_gain(&loud, Some(&track)) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn images_are_not_in_the_mix() {
        let tracks = Track::default_layout();
        let items = vec![
            TimelineItem::new("video-1", MediaType::Image, "still", 0.0, 5.0),
            TimelineItem::new("audio-1", MediaType::Audio, "vo", 1.0, 5.0),
        ];
        let mix = audible_mix_at(&items, &tracks, 2.0);
        assert_eq!(mix.len(), 1);
        assert_eq!(mix[0].item_id, items[1].id);
        assert!((mix[0].offset - 1.0).abs() < 1e-9);
    }

    #[test]
    fn higher_track_is_visible() {
        let tracks = vec![
            Track::new("video-1", "Base", TrackKind::Video),
            Track::new("video-2", "Overlay", TrackKind::Video),
        ];
        let items = vec![
            TimelineItem::new("video-2", MediaType::Image, "logo", 0.0, 3.0),
            TimelineItem::new("video-1", MediaType::Video, "shot", 0.0, 10.0),
        ];
        assert_eq!(visible_item_at(&items, &tracks, 1.0).unwrap().name, "logo");
        assert_eq!(visible_item_at(&items, &tracks, 5.0).unwrap().name, "shot");
        assert!(visible_item_at(&items, &tracks, 12.0).is_none());
    }

    #[test]
    fn overlaps_are_reported_per_track() {
        let items = vec![
            TimelineItem::new("video-1", MediaType::Video, "a", 0.0, 4.0),
            TimelineItem::new("video-1", MediaType::Video, "b", 3.0, 4.0),
            TimelineItem::new("audio-1", MediaType::Audio, "c", 0.0, 10.0),
        ];
        let pairs = overlapping_pairs(&items);
        assert_eq!(pairs, vec![(items[0].id, items[1].id)]);
    }
}
