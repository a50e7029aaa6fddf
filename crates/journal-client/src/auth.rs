//! Who is signed in.
//!
//! Journal operations only ever ask [`AuthProvider::current_user_id`]. The
//! session itself comes from the hosted auth service ([`GoTrueClient`]) or is
//! pinned for local use with [`SessionAuth::signed_in`].

use std::sync::RwLock;

use journal_shared::UserId;
use journal_store::RemoteConfig;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::info;

use crate::error::{JournalError, Result};

pub trait AuthProvider: Send + Sync {
    /// `None` when nobody is signed in.
    fn current_user_id(&self) -> Option<UserId>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub email: Option<String>,
    /// Bearer token for the hosted store; `None` for local sessions.
    pub access_token: Option<String>,
}

impl Session {
    pub fn local(user_id: UserId) -> Self {
        Self {
            user_id,
            email: None,
            access_token: None,
        }
    }
}

/// Holds the current session and broadcasts sign-in/sign-out.
pub struct SessionAuth {
    session: RwLock<Option<Session>>,
    changes: watch::Sender<Option<UserId>>,
}

impl SessionAuth {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            session: RwLock::new(None),
            changes,
        }
    }

    pub fn signed_in(session: Session) -> Self {
        let auth = Self::new();
        auth.sign_in(session);
        auth
    }

    pub fn sign_in(&self, session: Session) {
        let user_id = session.user_id.clone();
        match self.session.write() {
            Ok(mut guard) => *guard = Some(session),
            Err(poisoned) => *poisoned.into_inner() = Some(session),
        }
        info!(user = %user_id.short(), "signed in");
        self.changes.send_replace(Some(user_id));
    }

    pub fn sign_out(&self) {
        match self.session.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        info!("signed out");
        self.changes.send_replace(None);
    }

    pub fn session(&self) -> Option<Session> {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Stream of the signed-in user id; the current value is visible
    /// immediately to new subscribers.
    pub fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.changes.subscribe()
    }
}

impl Default for SessionAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for SessionAuth {
    fn current_user_id(&self) -> Option<UserId> {
        self.session().map(|s| s.user_id)
    }
}

// ---------------------------------------------------------------------------
// Hosted auth service
// ---------------------------------------------------------------------------

/// Minimal client for the hosted auth service (GoTrue).
pub struct GoTrueClient {
    http: reqwest::Client,
    config: RemoteConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

impl GoTrueClient {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let resp = self
            .http
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| JournalError::Auth(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(JournalError::Auth(format!("{status}: {body}")));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| JournalError::Auth(format!("unexpected token response: {e}")))?;
        session_from_token(token)
    }

    /// Revoke the session server-side. Local state is the caller's to clear.
    pub async fn sign_out(&self, session: &Session) -> Result<()> {
        let Some(token) = session.access_token.as_deref() else {
            return Ok(());
        };
        let resp = self
            .http
            .post(self.config.auth_url("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| JournalError::Auth(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(JournalError::Auth(format!("logout returned {}", resp.status())));
        }
        Ok(())
    }
}

fn session_from_token(token: TokenResponse) -> Result<Session> {
    let user_id = UserId::new(token.user.id)
        .ok_or_else(|| JournalError::Auth("token response carried an empty user id".into()))?;
    Ok(Session {
        user_id,
        email: token.user.email,
        access_token: Some(token.access_token),
    })
}
