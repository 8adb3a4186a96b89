use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use timeline::TimelineItem;
use uuid::Uuid;

use crate::{
    require_session, BackendSettings, Project, ProjectDraft, ProjectStore, Session, StoreError,
    TimelineItemRow,
};

/// Connection details for the hosted database/auth service.
#[derive(Clone)]
pub struct HostedBackend {
    base_url: String,
    anon_key: String,
    client: Client,
}

impl HostedBackend {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            client,
        }
    }

    /// `None` when no backend URL is configured.
    pub fn from_settings(settings: &BackendSettings) -> Option<Self> {
        let url = settings.url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        Some(Self::new(url, settings.anon_key.clone().unwrap_or_default()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds a request carrying the project key, authorised as `bearer` or anonymously.
    pub fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    fn table(&self, method: Method, table: &str, session: &Session) -> RequestBuilder {
        self.request(method, &format!("rest/v1/{table}"), Some(&session.access_token))
    }
}

/// [`ProjectStore`] backed by the hosted REST tables.
pub struct HostedStore {
    backend: HostedBackend,
}

impl HostedStore {
    pub fn new(backend: HostedBackend) -> Self {
        Self { backend }
    }

    async fn replace_items(
        &self,
        session: &Session,
        project_id: &str,
        items: &[TimelineItem],
    ) -> Result<(), StoreError> {
        let response = self
            .backend
            .table(Method::DELETE, "timeline_items", session)
            .query(&[("project_id", eq(project_id))])
            .send()
            .await?;
        check_status(response).await?;

        if items.is_empty() {
            return Ok(());
        }
        let rows: Vec<TimelineItemRow> = items
            .iter()
            .enumerate()
            .map(|(position, item)| TimelineItemRow::from_item(project_id, position, item))
            .collect();
        let response = self
            .backend
            .table(Method::POST, "timeline_items", session)
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for HostedStore {
    fn name(&self) -> &str {
        "hosted"
    }

    async fn save_project(
        &self,
        session: Option<&Session>,
        draft: &ProjectDraft,
    ) -> Result<Project, StoreError> {
        let session = require_session(session)?;
        let now = Utc::now();

        let mut saved: Vec<Project> = Vec::new();
        if let Some(id) = draft.id.as_deref() {
            let response = self
                .backend
                .table(Method::PATCH, "projects", session)
                .query(&[("id", eq(id)), ("user_id", eq(&session.user_id))])
                .header("Prefer", "return=representation")
                .json(&json!({
                    "name": draft.name,
                    "duration": draft.duration,
                    "updated_at": now,
                }))
                .send()
                .await?;
            saved = read_json(response).await?;
        }
        let project = match saved.pop() {
            Some(project) => project,
            None => {
                let id = draft
                    .id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let response = self
                    .backend
                    .table(Method::POST, "projects", session)
                    .header("Prefer", "return=representation")
                    .json(&new_project_body(&id, &session.user_id, draft, now))
                    .send()
                    .await?;
                let mut inserted: Vec<Project> = read_json(response).await?;
                inserted.pop().ok_or_else(|| StoreError::Backend {
                    status: 200,
                    message: "insert returned no project row".into(),
                })?
            }
        };

        if let Err(err) = self.replace_items(session, &project.id, &draft.items).await {
            tracing::warn!(target: "store", "project {} saved without items: {}", project.id, err);
            return Err(StoreError::PartialSave {
                project_id: project.id,
                message: err.to_string(),
            });
        }
        tracing::debug!(target: "store", "saved project {} ({} items) to hosted backend", project.id, draft.items.len());
        Ok(project)
    }

    async fn load_project(
        &self,
        session: Option<&Session>,
        project_id: &str,
    ) -> Result<(Project, Vec<TimelineItem>), StoreError> {
        let session = require_session(session)?;
        let response = self
            .backend
            .table(Method::GET, "projects", session)
            .query(&[
                ("select", "*".to_string()),
                ("id", eq(project_id)),
                ("user_id", eq(&session.user_id)),
            ])
            .send()
            .await?;
        let mut projects: Vec<Project> = read_json(response).await?;
        let project = projects
            .pop()
            .ok_or_else(|| StoreError::NotFound(project_id.to_string()))?;

        let response = self
            .backend
            .table(Method::GET, "timeline_items", session)
            .query(&[
                ("select", "*".to_string()),
                ("project_id", eq(project_id)),
                ("order", "position.asc".to_string()),
            ])
            .send()
            .await?;
        let rows: Vec<TimelineItemRow> = read_json(response).await?;
        let items = rows
            .into_iter()
            .map(TimelineItemRow::into_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((project, items))
    }

    async fn list_projects(&self, session: Option<&Session>) -> Result<Vec<Project>, StoreError> {
        let session = require_session(session)?;
        let response = self
            .backend
            .table(Method::GET, "projects", session)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", eq(&session.user_id)),
                ("order", "updated_at.desc".to_string()),
            ])
            .send()
            .await?;
        read_json(response).await
    }

    async fn delete_project(
        &self,
        session: Option<&Session>,
        project_id: &str,
    ) -> Result<(), StoreError> {
        let session = require_session(session)?;
        // ownership first, so a foreign id never loses its items
        let response = self
            .backend
            .table(Method::GET, "projects", session)
            .query(&[
                ("select", "id".to_string()),
                ("id", eq(project_id)),
                ("user_id", eq(&session.user_id)),
            ])
            .send()
            .await?;
        let owned: Vec<serde_json::Value> = read_json(response).await?;
        if owned.is_empty() {
            return Err(StoreError::NotFound(project_id.to_string()));
        }

        let response = self
            .backend
            .table(Method::DELETE, "timeline_items", session)
            .query(&[("project_id", eq(project_id))])
            .send()
            .await?;
        check_status(response).await?;

        let response = self
            .backend
            .table(Method::DELETE, "projects", session)
            .query(&[("id", eq(project_id)), ("user_id", eq(&session.user_id))])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let deleted: Vec<Project> = read_json(response).await?;
        if deleted.is_empty() {
            return Err(StoreError::NotFound(project_id.to_string()));
        }
        Ok(())
    }

    async fn get_preferences(
        &self,
        session: Option<&Session>,
    ) -> Result<serde_json::Value, StoreError> {
        let session = require_session(session)?;
        let response = self
            .backend
            .table(Method::GET, "user_preferences", session)
            .query(&[
                ("select", "preferences".to_string()),
                ("user_id", eq(&session.user_id)),
            ])
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = read_json(response).await?;
        Ok(preferences_from_rows(rows))
    }

    async fn set_preferences(
        &self,
        session: Option<&Session>,
        preferences: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let session = require_session(session)?;
        let response = self
            .backend
            .table(Method::POST, "user_preferences", session)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&json!({
                "user_id": session.user_id,
                "preferences": preferences,
                "updated_at": Utc::now(),
            }))
            .send()
            .await?;
        check_status(response).await
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn new_project_body(
    id: &str,
    user_id: &str,
    draft: &ProjectDraft,
    now: chrono::DateTime<Utc>,
) -> serde_json::Value {
    json!({
        "id": id,
        "name": draft.name,
        "duration": draft.duration,
        "user_id": user_id,
        "created_at": now,
        "updated_at": now,
    })
}

fn preferences_from_rows(rows: Vec<serde_json::Value>) -> serde_json::Value {
    rows.into_iter()
        .next()
        .and_then(|mut row| row.get_mut("preferences").map(serde_json::Value::take))
        .filter(|v| v.is_object())
        .unwrap_or_else(|| json!({}))
}

fn backend_error(status: u16, body: &str) -> StoreError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("msg"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    match status {
        401 | 403 => StoreError::NotAuthenticated,
        _ => StoreError::Backend { status, message },
    }
}

async fn check_status(response: Response) -> Result<(), StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(backend_error(status.as_u16(), &body))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(backend_error(status.as_u16(), &body));
    }
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let backend = HostedBackend::new("https://db.example.com/", "anon");
        assert_eq!(backend.base_url(), "https://db.example.com");
    }

    #[test]
    fn unconfigured_backend_is_none() {
        assert!(HostedBackend::from_settings(&BackendSettings::default()).is_none());
        let settings = BackendSettings {
            url: Some("https://db.example.com".into()),
            anon_key: Some("anon".into()),
        };
        assert!(HostedBackend::from_settings(&settings).is_some());
    }

    #[test]
    fn auth_failures_map_to_not_authenticated() {
        assert!(matches!(
            backend_error(401, r#"{"message":"JWT expired"}"#),
            StoreError::NotAuthenticated
        ));
        match backend_error(409, r#"{"message":"duplicate key"}"#) {
            StoreError::Backend { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "duplicate key");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_preferences_row_is_empty_object() {
        assert_eq!(preferences_from_rows(Vec::new()), json!({}));
        let rows = vec![json!({"preferences": {"voice": "rachel"}})];
        assert_eq!(preferences_from_rows(rows), json!({"voice": "rachel"}));
    }

    #[test]
    fn project_body_carries_owner() {
        let draft = ProjectDraft::new("Launch", 42.0, Vec::new());
        let body = new_project_body("p1", "u1", &draft, Utc::now());
        assert_eq!(body["user_id"], "u1");
        assert_eq!(body["duration"], 42.0);
        assert_eq!(body["created_at"], body["updated_at"]);
    }
}
