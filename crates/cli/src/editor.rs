use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use parking_lot::Mutex;
use project::{Project, ProjectDraft};
use std::sync::Arc;
use std::time::Duration;
use timeline::{
    ItemId, ItemPatch, MediaType, PlaybackDriver, PlaybackEnd, Timecode, TimelineEditor,
    TimelineItem, TrackId, DEFAULT_TICK,
};
use tracing::info;

use crate::app::App;

#[derive(Subcommand)]
pub enum EditorAction {
    /// Add a clip
    Add {
        /// Clip name
        name: String,

        /// Media type (video, audio, image)
        #[arg(long = "type", default_value = "video")]
        media_type: String,

        /// Track id
        #[arg(long, default_value = "video-1")]
        track: String,

        /// Start position (SS, MM:SS or MM:SS.t)
        #[arg(long, default_value = "0")]
        start: String,

        /// Length in seconds
        #[arg(long, default_value = "5")]
        duration: f64,

        /// Media URL or path
        #[arg(long)]
        src: Option<String>,

        /// Clip volume (0.0 - 1.0)
        #[arg(long)]
        volume: Option<f32>,
    },

    /// Remove a clip by id
    Remove { id: String },

    /// Reposition a clip, optionally onto another track
    Move {
        id: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        track: Option<String>,
    },

    /// Change clip fields
    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        duration: Option<f64>,

        #[arg(long)]
        src: Option<String>,

        #[arg(long)]
        volume: Option<f32>,

        #[arg(long)]
        color: Option<String>,
    },

    /// List tracks and clips
    List,

    /// Play the timeline in real time (Ctrl-C to stop)
    Play {
        /// Start position
        #[arg(long, default_value = "0")]
        from: String,

        /// Loop instead of stopping at the end
        #[arg(long = "loop")]
        looping: bool,
    },

    /// Report clips that overlap on the same track
    Overlaps,
}

impl EditorAction {
    fn mutates(&self) -> bool {
        matches!(
            self,
            EditorAction::Add { .. }
                | EditorAction::Remove { .. }
                | EditorAction::Move { .. }
                | EditorAction::Update { .. }
        )
    }
}

/// An editor plus the stored project it came from, if any.
pub struct OpenEditor {
    pub project: Option<Project>,
    pub editor: TimelineEditor,
}

pub async fn open_editor(app: &App, project_id: Option<&str>) -> Result<OpenEditor> {
    let Some(id) = project_id else {
        return Ok(OpenEditor {
            project: None,
            editor: TimelineEditor::default(),
        });
    };
    let session = app.session().await?;
    let (project, items) = app
        .store
        .load_project(session.as_ref(), id)
        .await
        .with_context(|| format!("loading project {id}"))?;
    let editor = TimelineEditor::from_parts(project.duration, Vec::new(), items);
    Ok(OpenEditor {
        project: Some(project),
        editor,
    })
}

pub async fn save_editor(app: &App, open: &OpenEditor) -> Result<Project> {
    let session = app.session().await?;
    let mut draft = ProjectDraft::new(
        open.project
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "Untitled".to_string()),
        open.editor.duration(),
        open.editor.items().to_vec(),
    );
    if let Some(project) = &open.project {
        draft = draft.with_id(project.id.clone());
    }
    let saved = app
        .store
        .save_project(session.as_ref(), &draft)
        .await
        .context("saving project")?;
    info!("saved project {} ({} clips)", saved.id, draft.items.len());
    Ok(saved)
}

fn parse_time(s: &str) -> Result<f64> {
    Timecode::parse(s)
        .map(|tc| tc.to_seconds())
        .map_err(|e| anyhow!(e))
}

fn parse_id(s: &str) -> Result<ItemId> {
    s.parse::<ItemId>()
        .with_context(|| format!("'{s}' is not a clip id"))
}

pub async fn editor_command(app: &App, project_id: Option<String>, action: EditorAction) -> Result<()> {
    let mut open = open_editor(app, project_id.as_deref()).await?;
    let mutates = action.mutates();

    match action {
        EditorAction::Add {
            name,
            media_type,
            track,
            start,
            duration,
            src,
            volume,
        } => {
            let media_type: MediaType = media_type.parse().map_err(|e: String| anyhow!(e))?;
            if duration <= 0.0 {
                bail!("duration must be positive");
            }
            let mut item = TimelineItem::new(track.as_str(), media_type, name, parse_time(&start)?, duration);
            if let Some(src) = src {
                item = item.with_src(src);
            }
            if let Some(volume) = volume {
                item = item.with_volume(volume);
            }
            let id = open.editor.add_item(item)?;
            println!("Added {id}");
        }
        EditorAction::Remove { id } => {
            let removed = open.editor.remove_item(parse_id(&id)?)?;
            println!("Removed {} ({})", removed.id, removed.name);
        }
        EditorAction::Move { id, start, track } => {
            let id = parse_id(&id)?;
            open.editor
                .move_item(id, parse_time(&start)?, track.map(TrackId::new))?;
            println!("Moved {id}");
        }
        EditorAction::Update {
            id,
            name,
            duration,
            src,
            volume,
            color,
        } => {
            let id = parse_id(&id)?;
            let patch = ItemPatch {
                name,
                duration,
                src,
                volume,
                color,
                ..Default::default()
            };
            if patch.is_empty() {
                bail!("nothing to update");
            }
            open.editor.update_item(id, &patch)?;
            println!("Updated {id}");
        }
        EditorAction::List => print_timeline(&open),
        EditorAction::Play { from, looping } => {
            play(open.editor, parse_time(&from)?, looping).await;
            return Ok(());
        }
        EditorAction::Overlaps => {
            let pairs = open.editor.overlaps();
            if pairs.is_empty() {
                println!("No overlapping clips.");
            }
            for (a, b) in pairs {
                let name = |id: ItemId| {
                    open.editor
                        .item(id)
                        .map(|i| i.name.clone())
                        .unwrap_or_default()
                };
                println!("{} ({}) overlaps {} ({})", a, name(a), b, name(b));
            }
        }
    }

    if mutates {
        let saved = save_editor(app, &open).await?;
        println!("Saved project {}", saved.id);
    }
    Ok(())
}

pub fn print_timeline(open: &OpenEditor) {
    let editor = &open.editor;
    match &open.project {
        Some(p) => println!(
            "{} [{}] {}",
            p.name,
            p.id,
            Timecode::from_seconds(editor.duration())
        ),
        None => println!("New project {}", Timecode::from_seconds(editor.duration())),
    }
    for track in editor.tracks() {
        let flags = if track.muted { " (muted)" } else { "" };
        println!("  {} \"{}\"{}", track.id, track.name, flags);
        for item in editor.items_on_track(&track.id) {
            println!(
                "    {}  {}-{}  {:<5}  {}",
                item.id,
                Timecode::from_seconds(item.start),
                Timecode::from_seconds(item.end()),
                item.media_type.as_str(),
                item.name
            );
        }
    }
    if editor.items().is_empty() {
        println!("  (no clips)");
    }
}

async fn play(mut editor: TimelineEditor, from: f64, looping: bool) {
    if looping {
        editor.set_playback_end(PlaybackEnd::Loop);
    }
    editor.seek(from);
    editor.play();
    let editor = Arc::new(Mutex::new(editor));

    let view = Arc::clone(&editor);
    let driver = PlaybackDriver::spawn(Arc::clone(&editor), DEFAULT_TICK, move |tick| {
        let editor = view.lock();
        let showing = editor
            .visible_item_at(tick.position)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "-".to_string());
        let audible = editor.audible_mix_at(tick.position).len();
        print!(
            "\r{}  {}  ({} audible)      ",
            Timecode::from_seconds(tick.position),
            showing,
            audible
        );
        use std::io::Write as _;
        let _ = std::io::stdout().flush();
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                driver.stop().await;
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if driver.is_finished() {
                    break;
                }
            }
        }
    }
    println!();
}
