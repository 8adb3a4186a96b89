use async_trait::async_trait;
use timeline::TimelineItem;

use crate::{Project, ProjectDraft, Session, StoreError};

/// Project and timeline persistence. Every call needs a signed-in session;
/// without one it returns [`StoreError::NotAuthenticated`].
#[async_trait]
pub trait ProjectStore: Send + Sync {
    fn name(&self) -> &str;

    async fn save_project(
        &self,
        session: Option<&Session>,
        draft: &ProjectDraft,
    ) -> Result<Project, StoreError>;

    async fn load_project(
        &self,
        session: Option<&Session>,
        project_id: &str,
    ) -> Result<(Project, Vec<TimelineItem>), StoreError>;

    /// Most recently updated first.
    async fn list_projects(&self, session: Option<&Session>) -> Result<Vec<Project>, StoreError>;

    async fn delete_project(
        &self,
        session: Option<&Session>,
        project_id: &str,
    ) -> Result<(), StoreError>;

    async fn get_preferences(
        &self,
        session: Option<&Session>,
    ) -> Result<serde_json::Value, StoreError>;

    async fn set_preferences(
        &self,
        session: Option<&Session>,
        preferences: &serde_json::Value,
    ) -> Result<(), StoreError>;
}

/// An expired session counts as signed out.
pub fn require_session(session: Option<&Session>) -> Result<&Session, StoreError> {
    match session {
        Some(s) if !s.is_expired(chrono::Utc::now()) => Ok(s),
        _ => Err(StoreError::NotAuthenticated),
    }
}
