use thiserror::Error;

mod item;
pub use item::*;
mod commands;
pub use commands::*;
mod editor;
pub use editor::*;
mod mix;
pub use mix::*;
mod playback;
pub use playback::*;
mod timecode;
pub use timecode::*;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("invalid operation: {0}")]
    InvalidOp(String),
    #[error("item already exists: {0}")]
    ItemExists(ItemId),
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),
    #[error("track not found: {0}")]
    TrackNotFound(TrackId),
    #[error("history empty: {0}")]
    HistoryEmpty(&'static str),
}

pub type Seconds = f64; // timeline time, fractional seconds from zero
