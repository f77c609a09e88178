//! Session Store - Authenticated client sessions
//!
//! Sessions are keyed by their token and expire after an idle timeout.
//! Timeout sessions can be persisted to a JSON file so logins survive a
//! restart of the service.

use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const UNIQUE_ID_LEN: usize = 10;
pub const TOKEN_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceType {
    /// Lives until logout or idle timeout.
    Timeout,
    /// Created for a single request and never persisted.
    SingleRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub unique_id: String,
    pub session_token: String,
    pub csrf_token: String,
    pub username: String,
    pub client_ip: Option<String>,
    pub last_updated: Instant,
    pub persistence: PersistenceType,
}

/// On-disk form of a session. Every field is optional so that one damaged
/// record does not reject the whole file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionRecord {
    unique_id: Option<String>,
    session_token: Option<String>,
    csrf_token: Option<String>,
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_ip: Option<String>,
}

impl SessionRecord {
    fn into_session(self) -> Option<UserSession> {
        Some(UserSession {
            unique_id: self.unique_id?,
            session_token: self.session_token?,
            csrf_token: self.csrf_token?,
            username: self.username?,
            client_ip: self.client_ip,
            last_updated: Instant::now(),
            persistence: PersistenceType::Timeout,
        })
    }
}

impl From<&UserSession> for SessionRecord {
    fn from(session: &UserSession) -> Self {
        Self {
            unique_id: Some(session.unique_id.clone()),
            session_token: Some(session.session_token.clone()),
            csrf_token: Some(session.csrf_token.clone()),
            username: Some(session.username.clone()),
            client_ip: session.client_ip.clone(),
        }
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, UserSession>>,
    timeout: Duration,
    persist_path: Option<PathBuf>,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
            persist_path: None,
        }
    }

    /// File that [`SessionStore::persist`] writes to.
    pub fn with_persistence(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn generate(
        &self,
        username: &str,
        client_ip: Option<String>,
        persistence: PersistenceType,
    ) -> UserSession {
        let mut sessions = self.sessions.write().await;
        let mut session_token = random_string(TOKEN_LEN);
        while sessions.contains_key(&session_token) {
            session_token = random_string(TOKEN_LEN);
        }
        let mut unique_id = random_string(UNIQUE_ID_LEN);
        while sessions.values().any(|s| s.unique_id == unique_id) {
            unique_id = random_string(UNIQUE_ID_LEN);
        }

        let session = UserSession {
            unique_id,
            session_token: session_token.clone(),
            csrf_token: random_string(TOKEN_LEN),
            username: username.to_string(),
            client_ip,
            last_updated: Instant::now(),
            persistence,
        };
        sessions.insert(session_token, session.clone());
        info!("Created session {} for {}", session.unique_id, username);
        session
    }

    /// Session owning `token`, with its idle timer restarted.
    pub async fn login_by_token(&self, token: &str) -> Option<UserSession> {
        if token.len() != TOKEN_LEN {
            return None;
        }
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(token)?;
        session.last_updated = Instant::now();
        Some(session.clone())
    }

    pub async fn get_by_unique_id(&self, unique_id: &str) -> Option<UserSession> {
        self.sessions
            .read()
            .await
            .values()
            .find(|s| s.unique_id == unique_id)
            .cloned()
    }

    /// Remove the session with `unique_id`. Returns whether one existed.
    pub async fn remove(&self, unique_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.unique_id != unique_id);
        sessions.len() != before
    }

    pub async fn unique_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .await
            .values()
            .map(|s| s.unique_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Log a user out everywhere.
    pub async fn remove_for_user(&self, username: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.username != username);
        before - sessions.len()
    }

    /// Drop sessions idle for at least the timeout.
    pub async fn apply_timeouts(&self) -> usize {
        let now = Instant::now();
        let timeout = self.timeout;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| now.duration_since(s.last_updated) < timeout);
        let expired = before - sessions.len();
        if expired > 0 {
            debug!("Expired {} idle sessions", expired);
        }
        expired
    }

    /// Write all timeout sessions to `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let records: Vec<SessionRecord> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.persistence == PersistenceType::Timeout)
            .map(SessionRecord::from)
            .collect();

        let json = serde_json::to_string_pretty(&records).context("Failed to serialize sessions")?;
        fs::write(path.as_ref(), json)
            .await
            .context("Failed to write session file")?;
        Ok(())
    }

    /// Load sessions saved by [`SessionStore::save`]. A missing file loads
    /// nothing; incomplete records are skipped.
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(0);
        }

        let json = fs::read_to_string(path)
            .await
            .context("Failed to read session file")?;
        let records: Vec<SessionRecord> =
            serde_json::from_str(&json).context("Failed to deserialize session file")?;

        let mut sessions = self.sessions.write().await;
        let mut loaded = 0;
        for record in records {
            match record.into_session() {
                Some(session) => {
                    sessions.insert(session.session_token.clone(), session);
                    loaded += 1;
                }
                None => warn!("Skipping incomplete session record in {}", path.display()),
            }
        }
        Ok(loaded)
    }

    /// Save to the configured persistence file, if any.
    pub async fn persist(&self) -> Result<()> {
        match &self.persist_path {
            Some(path) => self.save(path).await,
            None => Ok(()),
        }
    }

    /// Apply timeouts once per second until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                if self.apply_timeouts().await > 0 {
                    if let Err(e) = self.persist().await {
                        warn!("Failed to persist sessions: {:#}", e);
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_generate_and_login() {
        let store = SessionStore::new(HOUR);
        let session = store.generate("root", None, PersistenceType::Timeout).await;
        assert_eq!(session.unique_id.len(), UNIQUE_ID_LEN);
        assert_eq!(session.session_token.len(), TOKEN_LEN);
        assert_eq!(session.csrf_token.len(), TOKEN_LEN);
        assert!(session.session_token.chars().all(|c| c.is_ascii_alphanumeric()));

        let found = store.login_by_token(&session.session_token).await.unwrap();
        assert_eq!(found.unique_id, session.unique_id);
        assert!(found.last_updated >= session.last_updated);

        assert!(store.login_by_token("short").await.is_none());
        assert!(store.login_by_token(&"x".repeat(TOKEN_LEN)).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_and_lookup() {
        let store = SessionStore::new(HOUR);
        let a = store.generate("root", None, PersistenceType::Timeout).await;
        let b = store.generate("operator", Some("10.0.0.2".into()), PersistenceType::Timeout).await;
        store.generate("root", None, PersistenceType::SingleRequest).await;

        assert_eq!(store.unique_ids().await.len(), 3);
        assert_eq!(store.get_by_unique_id(&b.unique_id).await.unwrap().username, "operator");

        assert!(store.remove(&b.unique_id).await);
        assert!(!store.remove(&b.unique_id).await);
        assert_eq!(store.remove_for_user("root").await, 2);
        assert!(store.get_by_unique_id(&a.unique_id).await.is_none());
        assert!(store.unique_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_timeouts() {
        let store = SessionStore::new(HOUR);
        store.generate("root", None, PersistenceType::Timeout).await;
        assert_eq!(store.apply_timeouts().await, 0);

        let store = SessionStore::new(Duration::ZERO);
        store.generate("root", None, PersistenceType::Timeout).await;
        assert_eq!(store.apply_timeouts().await, 1);
        assert!(store.unique_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_load_only_timeout_sessions() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sessions.json");

        let store = SessionStore::new(HOUR);
        let kept = store.generate("root", Some("10.0.0.1".into()), PersistenceType::Timeout).await;
        store.generate("root", None, PersistenceType::SingleRequest).await;
        assert_ok!(store.save(&path).await);

        let restored = SessionStore::new(HOUR);
        assert_eq!(restored.load(&path).await.unwrap(), 1);
        let session = restored.login_by_token(&kept.session_token).await.unwrap();
        assert_eq!(session.unique_id, kept.unique_id);
        assert_eq!(session.client_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(session.persistence, PersistenceType::Timeout);
    }

    #[tokio::test]
    async fn test_load_skips_incomplete_records() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sessions.json");
        let json = serde_json::json!([
            {"unique_id": "abcdefghij", "session_token": "aaaaaaaaaaaaaaaaaaaa",
             "csrf_token": "bbbbbbbbbbbbbbbbbbbb", "username": "root"},
            {"unique_id": "klmnopqrst", "session_token": "cccccccccccccccccccc"}
        ]);
        tokio::fs::write(&path, json.to_string()).await.unwrap();

        let store = SessionStore::new(HOUR);
        assert_eq!(store.load(&path).await.unwrap(), 1);
        assert_eq!(store.unique_ids().await, vec!["abcdefghij".to_string()]);

        assert_eq!(store.load(temp_dir.path().join("missing.json")).await.unwrap(), 0);
        tokio::fs::write(&path, "not json").await.unwrap();
        assert_err!(store.load(&path).await);
    }
}
