use std::path::PathBuf;
use thiserror::Error;

mod auth;
mod cache;
mod db;
mod hosted;
mod models;
mod settings;
mod store;

pub use auth::{validate_credentials, AuthClient, AuthError, Session, SessionFile, SignUpOutcome};
pub use cache::{CacheError, MediaCache, DEFAULT_CACHE_TTL};
pub use db::ProjectDb;
pub use hosted::{HostedBackend, HostedStore};
pub use models::{Project, ProjectDraft, TimelineItemRow};
pub use settings::{mask, ApiKeys, BackendSettings, Preferences, Settings, SETTINGS_FILE};
pub use store::{require_session, ProjectStore};

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    base.join("storyreel")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("project not found: {0}")]
    NotFound(String),
    #[error("project {project_id} was saved but its timeline items were not: {message}")]
    PartialSave { project_id: String, message: String },
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },
    #[error("invalid row: {0}")]
    InvalidRow(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
