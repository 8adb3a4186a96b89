use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use timeline::{
    MediaType, PlaybackDriver, PlaybackEnd, TimelineEditor, TimelineItem, TrackId, DEFAULT_TICK,
};

fn sample_items(n: usize) -> Vec<TimelineItem> {
    (0..n)
        .map(|i| {
            let (track, kind) = match i % 3 {
                0 => ("video-1", MediaType::Video),
                1 => ("audio-1", MediaType::Audio),
                _ => ("video-1", MediaType::Image),
            };
            TimelineItem::new(track, kind, format!("item {i}"), i as f64 * 2.0, 1.5 + i as f64)
                .with_src(format!("https://cdn.example.com/{i}.bin"))
                .with_volume(0.1 * i as f32)
        })
        .collect()
}

#[test]
fn adding_n_items_keeps_all_fields() {
    let mut editor = TimelineEditor::new(120.0);
    let items = sample_items(7);
    for item in &items {
        editor.add_item(item.clone()).unwrap();
    }

    assert_eq!(editor.items().len(), items.len());
    for item in &items {
        assert_eq!(editor.item(item.id), Some(item));
    }
}

#[test]
fn removing_one_item_leaves_others_untouched() {
    let mut editor = TimelineEditor::new(120.0);
    let items = sample_items(5);
    for item in &items {
        editor.add_item(item.clone()).unwrap();
    }

    let removed = editor.remove_item(items[2].id).unwrap();
    assert_eq!(removed, items[2]);
    assert_eq!(editor.items().len(), 4);

    let expected: Vec<_> = items
        .iter()
        .filter(|i| i.id != items[2].id)
        .cloned()
        .collect();
    assert_eq!(editor.items(), expected.as_slice());
}

#[test]
fn removing_unknown_item_changes_nothing() {
    let mut editor = TimelineEditor::new(10.0);
    let item = TimelineItem::new("video-1", MediaType::Video, "a", 0.0, 1.0);
    editor.add_item(item.clone()).unwrap();

    let ghost = TimelineItem::new("video-1", MediaType::Video, "ghost", 0.0, 1.0);
    assert!(editor.remove_item(ghost.id).is_err());
    assert_eq!(editor.items(), &[item]);
}

#[test]
fn cursor_never_exceeds_duration_and_resets() {
    let mut editor = TimelineEditor::new(2.0);
    editor.play();

    let mut saw_reset = false;
    for _ in 0..25 {
        let tick = editor.advance(DEFAULT_TICK);
        assert!(tick.position <= editor.duration());
        if tick.wrapped {
            assert_eq!(tick.position, 0.0);
            saw_reset = true;
        }
    }
    assert!(saw_reset);
    assert_eq!(editor.cursor(), 0.0);
    assert!(!editor.is_playing());
}

#[test]
fn muting_a_track_removes_it_from_the_mix() {
    let mut editor = TimelineEditor::new(30.0);
    let voice = TimelineItem::new("audio-1", MediaType::Audio, "vo", 0.0, 10.0);
    let music = TimelineItem::new("audio-2", MediaType::Audio, "bed", 0.0, 10.0).with_volume(0.5);
    editor.add_item(voice.clone()).unwrap();
    editor.add_item(music.clone()).unwrap();

    editor.set_track_muted(&TrackId::from("audio-2"), true).unwrap();
    let mix = editor.audible_mix_at(3.0);
    let music_gain = mix.iter().find(|m| m.item_id == music.id).unwrap().gain;
    let voice_gain = mix.iter().find(|m| m.item_id == voice.id).unwrap().gain;
    assert_eq!(music_gain, 0.0);
    assert_eq!(voice_gain, 1.0);

    editor.undo().unwrap();
    let mix = editor.audible_mix_at(3.0);
    let music_gain = mix.iter().find(|m| m.item_id == music.id).unwrap().gain;
    assert!((music_gain - 0.5).abs() < f32::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn driver_plays_to_the_end_and_stops() {
    let editor = Arc::new(Mutex::new(TimelineEditor::new(1.0)));
    editor.lock().play();

    let positions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&positions);
    let driver = PlaybackDriver::spawn(Arc::clone(&editor), DEFAULT_TICK, move |tick| {
        sink.lock().push(tick.position);
    });
    driver.join().await;

    let positions = positions.lock();
    assert_eq!(positions.len(), 10);
    assert!(positions.iter().all(|p| *p <= 1.0));
    assert_eq!(*positions.last().unwrap(), 0.0);
    assert!(!editor.lock().is_playing());
}

#[tokio::test(start_paused = true)]
async fn stopping_the_driver_freezes_the_cursor() {
    let editor = Arc::new(Mutex::new(TimelineEditor::new(60.0)));
    {
        let mut e = editor.lock();
        e.set_playback_end(PlaybackEnd::Loop);
        e.play();
    }
    let driver = PlaybackDriver::spawn(Arc::clone(&editor), DEFAULT_TICK, |_| {});
    tokio::time::sleep(Duration::from_millis(550)).await;
    driver.stop().await;

    let frozen = editor.lock().cursor();
    assert!(frozen > 0.0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(editor.lock().cursor(), frozen);
}
