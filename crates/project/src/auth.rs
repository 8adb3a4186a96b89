use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::hosted::HostedBackend;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("auth backend error ({status}): {message}")]
    Backend { status: u16, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A signed-in user as issued by the hosted backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Session for the offline SQLite store; never hits the network.
    pub fn local(user: impl Into<String>) -> Self {
        let user = user.into();
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            email: format!("{user}@localhost"),
            user_id: user,
            expires_at: Utc::now() + Duration::days(365 * 100),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_local(&self) -> bool {
        self.access_token.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    /// The backend wants the address confirmed before issuing a session.
    ConfirmationRequired { email: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, fallback_email: &str) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(self.expires_in.unwrap_or(3600)));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user_id: self.user.id,
            email: self.user.email.unwrap_or_else(|| fallback_email.to_string()),
            expires_at,
        }
    }
}

/// Email/password auth delegated to the hosted backend's session API.
#[derive(Clone)]
pub struct AuthClient {
    backend: HostedBackend,
}

impl AuthClient {
    pub fn new(backend: HostedBackend) -> Self {
        Self { backend }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        validate_credentials(email, password)?;
        let response = self
            .backend
            .request(reqwest::Method::POST, "auth/v1/signup", None)
            .json(&json!({ "email": email.trim(), "password": password }))
            .send()
            .await?;
        let body = read_auth_body(response).await?;
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            tracing::info!(target: "auth", "signed up and signed in {}", email.trim());
            Ok(SignUpOutcome::SignedIn(token.into_session(email.trim())))
        } else {
            tracing::info!(target: "auth", "sign-up for {} awaits confirmation", email.trim());
            Ok(SignUpOutcome::ConfirmationRequired {
                email: email.trim().to_string(),
            })
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        validate_credentials(email, password)?;
        let response = self
            .backend
            .request(reqwest::Method::POST, "auth/v1/token?grant_type=password", None)
            .json(&json!({ "email": email.trim(), "password": password }))
            .send()
            .await?;
        let body = read_auth_body(response).await?;
        let token: TokenResponse = serde_json::from_value(body)?;
        tracing::info!(target: "auth", "signed in {}", email.trim());
        Ok(token.into_session(email.trim()))
    }

    pub async fn refresh(&self, session: &Session) -> Result<Session, AuthError> {
        let response = self
            .backend
            .request(reqwest::Method::POST, "auth/v1/token?grant_type=refresh_token", None)
            .json(&json!({ "refresh_token": session.refresh_token }))
            .send()
            .await?;
        let body = read_auth_body(response).await?;
        let token: TokenResponse = serde_json::from_value(body)?;
        Ok(token.into_session(&session.email))
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        if session.is_local() {
            return Ok(());
        }
        let response = self
            .backend
            .request(reqwest::Method::POST, "auth/v1/logout", Some(&session.access_token))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Backend {
                status: status.as_u16(),
                message,
            });
        }
        tracing::info!(target: "auth", "signed out {}", session.email);
        Ok(())
    }
}

async fn read_auth_body(response: reqwest::Response) -> Result<serde_json::Value, AuthError> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_success() {
        return Ok(serde_json::from_str(&text)?);
    }
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
    let code = parsed
        .get("error")
        .or_else(|| parsed.get("error_code"))
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if code == "invalid_grant" || code == "invalid_credentials" {
        return Err(AuthError::InvalidCredentials);
    }
    let message = ["error_description", "msg", "message"]
        .iter()
        .find_map(|k| parsed.get(*k).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or(text);
    Err(AuthError::Backend {
        status: status.as_u16(),
        message,
    })
}

pub fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => {
            return Err(AuthError::Validation(format!(
                "'{email}' is not a valid email address"
            )))
        }
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// The current session persisted between CLI invocations.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>, AuthError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                tracing::warn!(target: "auth", "ignoring unreadable session file {:?}: {}", self.path, err);
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), AuthError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), AuthError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
