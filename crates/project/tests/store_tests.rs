use project::{ProjectDb, ProjectDraft, ProjectStore, Session, StoreError};
use timeline::{MediaType, TimelineItem};

fn open_db() -> (tempfile::TempDir, ProjectDb) {
    let dir = tempfile::tempdir().unwrap();
    let db = ProjectDb::open_or_create(&dir.path().join("storyreel.db")).unwrap();
    (dir, db)
}

fn sample_items() -> Vec<TimelineItem> {
    vec![
        TimelineItem::new("video-1", MediaType::Video, "Opening shot", 0.0, 5.0)
            .with_src("https://cdn.example.com/scene-1.mp4"),
        TimelineItem::new("audio-1", MediaType::Audio, "Narration", 0.0, 4.5)
            .with_src("file:///tmp/scene-1-voice.mp3"),
        TimelineItem::new("audio-2", MediaType::Audio, "Ambience", 0.0, 5.0).with_volume(0.5),
    ]
}

#[tokio::test]
async fn saving_without_a_session_is_not_authenticated() {
    let (_dir, db) = open_db();
    let draft = ProjectDraft::new("Untitled", 60.0, sample_items());

    let err = db.save_project(None, &draft).await.unwrap_err();
    assert!(matches!(err, StoreError::NotAuthenticated));
    assert!(matches!(
        db.list_projects(None).await,
        Err(StoreError::NotAuthenticated)
    ));
    assert!(matches!(
        db.get_preferences(None).await,
        Err(StoreError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn expired_session_counts_as_signed_out() {
    let (_dir, db) = open_db();
    let mut session = Session::local("ana");
    session.expires_at = chrono::Utc::now() - chrono::Duration::minutes(1);

    let draft = ProjectDraft::new("Late", 10.0, Vec::new());
    assert!(matches!(
        db.save_project(Some(&session), &draft).await,
        Err(StoreError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn save_load_list_delete_round_trip() {
    let (_dir, db) = open_db();
    let session = Session::local("ana");
    let items = sample_items();

    let first = db
        .save_project(Some(&session), &ProjectDraft::new("First", 30.0, items.clone()))
        .await
        .unwrap();
    let second = db
        .save_project(Some(&session), &ProjectDraft::new("Second", 15.0, Vec::new()))
        .await
        .unwrap();

    let (project, loaded) = db.load_project(Some(&session), &first.id).await.unwrap();
    assert_eq!(project.name, "First");
    assert_eq!(project.user_id, "ana");
    assert_eq!(loaded, items);

    let listed = db.list_projects(Some(&session)).await.unwrap();
    let ids: Vec<_> = listed.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);

    db.delete_project(Some(&session), &first.id).await.unwrap();
    assert!(matches!(
        db.load_project(Some(&session), &first.id).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        db.delete_project(Some(&session), &first.id).await,
        Err(StoreError::NotFound(_))
    ));
    assert_eq!(db.list_projects(Some(&session)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn preferences_are_per_user() {
    let (_dir, db) = open_db();
    let ana = Session::local("ana");
    let ben = Session::local("ben");

    db.set_preferences(Some(&ana), &serde_json::json!({"style": "noir"}))
        .await
        .unwrap();
    assert_eq!(
        db.get_preferences(Some(&ana)).await.unwrap()["style"],
        "noir"
    );
    assert_eq!(
        db.get_preferences(Some(&ben)).await.unwrap(),
        serde_json::json!({})
    );
}
