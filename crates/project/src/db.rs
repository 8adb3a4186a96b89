use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use timeline::TimelineItem;
use uuid::Uuid;

use crate::{require_session, Project, ProjectDraft, ProjectStore, Session, StoreError, TimelineItemRow};

/// Local SQLite store with the same tables as the hosted backend.
pub struct ProjectDb {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl ProjectDb {
    pub fn open_or_create(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        // Recommended PRAGMAs for local interactive app DB
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save_project_for(&self, user_id: &str, draft: &ProjectDraft) -> Result<Project, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = next_update_stamp(&tx)?;

        let (id, created_at) = match draft.id.as_deref() {
            Some(id) => {
                let existing: Option<(String, i64)> = tx
                    .query_row(
                        "SELECT user_id, created_at FROM projects WHERE id = ?1",
                        params![id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                match existing {
                    Some((owner, _)) if owner != user_id => {
                        return Err(StoreError::NotFound(id.to_string()));
                    }
                    Some((_, created_at)) => {
                        tx.execute(
                            "UPDATE projects SET name = ?2, duration = ?3, updated_at = ?4 WHERE id = ?1",
                            params![id, draft.name, draft.duration, now],
                        )?;
                        (id.to_string(), created_at)
                    }
                    None => {
                        insert_project_row(&tx, id, user_id, draft, now)?;
                        (id.to_string(), now)
                    }
                }
            }
            None => {
                let id = Uuid::new_v4().to_string();
                insert_project_row(&tx, &id, user_id, draft, now)?;
                (id, now)
            }
        };

        tx.execute(
            "DELETE FROM timeline_items WHERE project_id = ?1",
            params![id],
        )?;
        for (position, item) in draft.items.iter().enumerate() {
            let row = TimelineItemRow::from_item(&id, position, item);
            tx.execute(
                "INSERT INTO timeline_items(id, project_id, track_id, start_time, duration, type, name, color, src, thumbnail, volume, position) \
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    row.id,
                    row.project_id,
                    row.track_id,
                    row.start_time,
                    row.duration,
                    row.item_type,
                    row.name,
                    row.color,
                    row.src,
                    row.thumbnail,
                    row.volume,
                    row.position,
                ],
            )?;
        }
        tx.commit()?;

        tracing::debug!(target: "store", "saved project {} ({} items)", id, draft.items.len());
        Ok(Project {
            id,
            name: draft.name.clone(),
            duration: draft.duration,
            user_id: user_id.to_string(),
            created_at: millis_to_datetime(created_at),
            updated_at: millis_to_datetime(now),
        })
    }

    pub fn load_project_for(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<(Project, Vec<TimelineItem>), StoreError> {
        let conn = self.conn.lock();
        let project = conn
            .query_row(
                "SELECT id, name, duration, user_id, created_at, updated_at FROM projects WHERE id = ?1 AND user_id = ?2",
                params![project_id, user_id],
                project_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(project_id.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT id, project_id, track_id, start_time, duration, type, name, color, src, thumbnail, volume, position \
             FROM timeline_items WHERE project_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok(TimelineItemRow {
                id: row.get(0)?,
                project_id: row.get(1)?,
                track_id: row.get(2)?,
                start_time: row.get(3)?,
                duration: row.get(4)?,
                item_type: row.get(5)?,
                name: row.get(6)?,
                color: row.get(7)?,
                src: row.get(8)?,
                thumbnail: row.get(9)?,
                volume: row.get::<_, Option<f64>>(10)?.map(|v| v as f32),
                position: row.get(11)?,
            })
        })?;
        let mut items = Vec::new();
        for r in rows {
            items.push(r?.into_item()?);
        }
        Ok((project, items))
    }

    pub fn list_projects_for(&self, user_id: &str) -> Result<Vec<Project>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, duration, user_id, created_at, updated_at FROM projects \
             WHERE user_id = ?1 ORDER BY updated_at DESC, created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], project_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn delete_project_for(&self, user_id: &str, project_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let owned: Option<String> = tx
            .query_row(
                "SELECT id FROM projects WHERE id = ?1 AND user_id = ?2",
                params![project_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        if owned.is_none() {
            return Err(StoreError::NotFound(project_id.to_string()));
        }
        tx.execute(
            "DELETE FROM timeline_items WHERE project_id = ?1",
            params![project_id],
        )?;
        tx.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_preferences_for(&self, user_id: &str) -> Result<serde_json::Value, StoreError> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT preferences_json FROM user_preferences WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw
            .and_then(|r| serde_json::from_str(&r).ok())
            .unwrap_or_else(|| serde_json::Value::Object(Default::default())))
    }

    pub fn set_preferences_for(
        &self,
        user_id: &str,
        preferences: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp_millis();
        self.conn.lock().execute(
            "INSERT INTO user_preferences(user_id, preferences_json, updated_at) VALUES(?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET preferences_json = excluded.preferences_json, updated_at = excluded.updated_at",
            params![user_id, preferences.to_string(), now],
        )?;
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for ProjectDb {
    fn name(&self) -> &str {
        "local"
    }

    async fn save_project(
        &self,
        session: Option<&Session>,
        draft: &ProjectDraft,
    ) -> Result<Project, StoreError> {
        let session = require_session(session)?;
        self.save_project_for(&session.user_id, draft)
    }

    async fn load_project(
        &self,
        session: Option<&Session>,
        project_id: &str,
    ) -> Result<(Project, Vec<TimelineItem>), StoreError> {
        let session = require_session(session)?;
        self.load_project_for(&session.user_id, project_id)
    }

    async fn list_projects(&self, session: Option<&Session>) -> Result<Vec<Project>, StoreError> {
        let session = require_session(session)?;
        self.list_projects_for(&session.user_id)
    }

    async fn delete_project(
        &self,
        session: Option<&Session>,
        project_id: &str,
    ) -> Result<(), StoreError> {
        let session = require_session(session)?;
        self.delete_project_for(&session.user_id, project_id)
    }

    async fn get_preferences(
        &self,
        session: Option<&Session>,
    ) -> Result<serde_json::Value, StoreError> {
        let session = require_session(session)?;
        self.get_preferences_for(&session.user_id)
    }

    async fn set_preferences(
        &self,
        session: Option<&Session>,
        preferences: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let session = require_session(session)?;
        self.set_preferences_for(&session.user_id, preferences)
    }
}

fn insert_project_row(
    tx: &Transaction<'_>,
    id: &str,
    user_id: &str,
    draft: &ProjectDraft,
    now: i64,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO projects(id, name, duration, user_id, created_at, updated_at) VALUES(?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, draft.name, draft.duration, user_id, now],
    )?;
    Ok(())
}

/// Millisecond stamp strictly after every stored `updated_at`, so listing order
/// follows save order even within one millisecond.
fn next_update_stamp(tx: &Transaction<'_>) -> Result<i64, StoreError> {
    let latest: i64 = tx.query_row(
        "SELECT COALESCE(MAX(updated_at), 0) FROM projects",
        [],
        |row| row.get(0),
    )?;
    Ok(Utc::now().timestamp_millis().max(latest + 1))
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn project_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        duration: row.get(2)?,
        user_id: row.get(3)?,
        created_at: millis_to_datetime(row.get(4)?),
        updated_at: millis_to_datetime(row.get(5)?),
    })
}

fn apply_migrations(conn: &Connection) -> Result<(), StoreError> {
    // Simple migration tracking by name
    conn.execute_batch(include_str!("../migrations/V0001__init.sql"))?;
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params!["V0001__init"],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeline::MediaType;

    fn open_temp() -> (tempfile::TempDir, ProjectDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = ProjectDb::open_or_create(&dir.path().join("nested/app.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn overwrite_replaces_items() {
        let (_dir, db) = open_temp();
        let first = vec![
            TimelineItem::new("video-1", MediaType::Video, "a", 0.0, 2.0),
            TimelineItem::new("video-1", MediaType::Video, "b", 2.0, 2.0),
        ];
        let saved = db
            .save_project_for("u1", &ProjectDraft::new("Demo", 30.0, first))
            .unwrap();

        let second = vec![TimelineItem::new("audio-1", MediaType::Audio, "vo", 0.0, 5.0)];
        let updated = db
            .save_project_for(
                "u1",
                &ProjectDraft::new("Demo v2", 45.0, second.clone()).with_id(saved.id.clone()),
            )
            .unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.created_at, saved.created_at);
        assert!(updated.updated_at > saved.updated_at);

        let (project, items) = db.load_project_for("u1", &saved.id).unwrap();
        assert_eq!(project.name, "Demo v2");
        assert_eq!(project.duration, 45.0);
        assert_eq!(items, second);
    }

    #[test]
    fn other_users_cannot_see_or_overwrite() {
        let (_dir, db) = open_temp();
        let saved = db
            .save_project_for("owner", &ProjectDraft::new("Mine", 10.0, Vec::new()))
            .unwrap();

        assert!(matches!(
            db.load_project_for("intruder", &saved.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            db.save_project_for(
                "intruder",
                &ProjectDraft::new("Theirs", 10.0, Vec::new()).with_id(saved.id.clone())
            ),
            Err(StoreError::NotFound(_))
        ));
        assert!(db.list_projects_for("intruder").unwrap().is_empty());
    }

    #[test]
    fn preferences_default_to_empty_object() {
        let (_dir, db) = open_temp();
        assert_eq!(db.get_preferences_for("u1").unwrap(), serde_json::json!({}));
        db.set_preferences_for("u1", &serde_json::json!({"voice": "rachel"}))
            .unwrap();
        db.set_preferences_for("u1", &serde_json::json!({"voice": "adam"}))
            .unwrap();
        assert_eq!(db.get_preferences_for("u1").unwrap()["voice"], "adam");
    }
}
