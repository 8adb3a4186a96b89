use anyhow::{Context, Result};
use project::{
    AuthClient, HostedBackend, HostedStore, MediaCache, ProjectDb, ProjectStore, Session,
    SessionFile, Settings,
};
use providers::{ProviderSet, ProvidersConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DB_FILE: &str = "storyreel.db";
const SESSION_FILE: &str = "session.json";
const CACHE_FILE: &str = "media-cache.json";

/// Settings, storage and session wiring shared by every subcommand.
pub struct App {
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub data_dir: PathBuf,
    pub session_file: SessionFile,
    pub hosted: Option<HostedBackend>,
    pub store: Arc<dyn ProjectStore>,
}

impl App {
    pub fn load() -> Result<Self> {
        let data_dir = project::app_data_dir();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating {}", data_dir.display()))?;
        let settings_path = Settings::default_path();
        let mut settings = Settings::load(&settings_path)?;
        settings.apply_env();

        let hosted = HostedBackend::from_settings(&settings.backend);
        let store: Arc<dyn ProjectStore> = match &hosted {
            Some(backend) => {
                debug!("using hosted backend at {}", backend.base_url());
                Arc::new(HostedStore::new(backend.clone()))
            }
            None => {
                let db_path = data_dir.join(DB_FILE);
                debug!("using local database {:?}", db_path);
                Arc::new(ProjectDb::open_or_create(&db_path)?)
            }
        };

        Ok(Self {
            session_file: SessionFile::new(data_dir.join(SESSION_FILE)),
            settings,
            settings_path,
            data_dir,
            hosted,
            store,
        })
    }

    pub fn is_local(&self) -> bool {
        self.hosted.is_none()
    }

    pub fn auth_client(&self) -> Option<AuthClient> {
        self.hosted.clone().map(AuthClient::new)
    }

    /// The session to hand to the store. Local mode always has one; hosted
    /// mode refreshes an expired session once before giving up.
    pub async fn session(&self) -> Result<Option<Session>> {
        let Some(client) = self.auth_client() else {
            return Ok(Some(Session::local(local_user())));
        };
        let Some(session) = self.session_file.load()? else {
            return Ok(None);
        };
        if !session.is_expired(chrono::Utc::now()) {
            return Ok(Some(session));
        }
        if session.refresh_token.is_empty() {
            return Ok(None);
        }
        match client.refresh(&session).await {
            Ok(fresh) => {
                self.session_file.save(&fresh)?;
                debug!("refreshed session for {}", fresh.email);
                Ok(Some(fresh))
            }
            Err(e) => {
                warn!("session refresh failed: {}", e);
                Ok(None)
            }
        }
    }

    pub fn providers(&self, mock: bool) -> Result<ProviderSet> {
        if mock {
            return Ok(ProviderSet::mock());
        }
        let keys = &self.settings.api_keys;
        let prefs = &self.settings.preferences;
        let config = ProvidersConfig {
            openai_key: keys.openai.clone(),
            replicate_token: keys.replicate.clone(),
            elevenlabs_key: keys.elevenlabs.clone(),
            freesound_key: keys.freesound.clone(),
            chat_model: Some(prefs.chat_model.clone()),
            video_model: Some(prefs.video_model.clone()),
            voice_id: Some(prefs.voice_id.clone()),
            video_timeout: Some(Duration::from_secs(prefs.video_timeout_secs)),
        };
        Ok(ProviderSet::from_config(&config)?)
    }

    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }

    pub fn cache(&self) -> MediaCache {
        MediaCache::open(self.data_dir.join(CACHE_FILE))
    }
}

fn local_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "local".to_string())
}
