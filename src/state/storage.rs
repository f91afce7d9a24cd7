//! Session storage
//!
//! The [`SessionStore`] trait is the contract the dialogue driver relies on.
//! [`MemorySessionStore`] keeps sessions in process; the Redis-backed store
//! lives in [`super::redis_store`]. [`SessionJanitor`] periodically drops
//! abandoned sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use crate::utils::errors::{FormBuddyError, Result};
use super::context::ConversationSession;

/// Change applied to a stored session
pub type SessionMutator = Box<dyn FnOnce(&mut ConversationSession) + Send>;

/// Per-user session storage
///
/// Sessions for different users are independent. Expired sessions read as
/// absent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the open session for a user
    async fn get(&self, user_id: i64) -> Result<Option<ConversationSession>>;

    /// Store a new session; fails with `SessionAlreadyExists` if one is open
    async fn create(&self, session: ConversationSession) -> Result<ConversationSession>;

    /// Apply `mutator` to the open session; fails with `SessionNotFound`
    async fn update(&self, user_id: i64, mutator: SessionMutator) -> Result<ConversationSession>;

    /// Drop the session, if any
    async fn remove(&self, user_id: i64) -> Result<()>;

    /// Drop expired sessions, returning how many were removed
    async fn cleanup_expired(&self) -> Result<usize>;

    /// Number of open sessions
    async fn active_count(&self) -> Result<usize>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}

/// In-process session store
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<i64, ConversationSession>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user_id: i64) -> Result<Option<ConversationSession>> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(&user_id) {
                None => return Ok(None),
                Some(session) if !session.is_expired() => return Ok(Some(session.clone())),
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().await;
        if sessions.get(&user_id).map_or(false, ConversationSession::is_expired) {
            warn!(user_id = user_id, "Session has expired, removing");
            sessions.remove(&user_id);
        }
        Ok(sessions.get(&user_id).cloned())
    }

    async fn create(&self, session: ConversationSession) -> Result<ConversationSession> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&session.user_id) {
            if !existing.is_expired() {
                return Err(FormBuddyError::SessionAlreadyExists { user_id: session.user_id });
            }
        }

        debug!(user_id = session.user_id, step = %session.step, "Session created");
        sessions.insert(session.user_id, session.clone());
        Ok(session)
    }

    async fn update(&self, user_id: i64, mutator: SessionMutator) -> Result<ConversationSession> {
        let mut sessions = self.sessions.write().await;
        let expired = match sessions.get(&user_id) {
            Some(session) => session.is_expired(),
            None => return Err(FormBuddyError::SessionNotFound { user_id }),
        };
        if expired {
            sessions.remove(&user_id);
            return Err(FormBuddyError::SessionNotFound { user_id });
        }

        let session = sessions
            .get_mut(&user_id)
            .ok_or(FormBuddyError::SessionNotFound { user_id })?;
        mutator(session);
        debug!(user_id = user_id, step = %session.step, "Session updated");
        Ok(session.clone())
    }

    async fn remove(&self, user_id: i64) -> Result<()> {
        if self.sessions.write().await.remove(&user_id).is_some() {
            debug!("Deleted session for user {}", user_id);
        } else {
            debug!("No session to delete for user {}", user_id);
        }
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        let cleaned = before - sessions.len();

        if cleaned > 0 {
            info!("Cleaned up {} expired sessions", cleaned);
        }
        Ok(cleaned)
    }

    async fn active_count(&self) -> Result<usize> {
        let now = Utc::now();
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|session| !session.is_expired_at(now))
            .count())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Background task that drops expired sessions
pub struct SessionJanitor {
    store: Arc<dyn SessionStore>,
    cleanup_interval: Duration,
    cleanup_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SessionJanitor {
    pub fn new(store: Arc<dyn SessionStore>, cleanup_interval: Duration) -> Self {
        Self {
            store,
            cleanup_interval,
            cleanup_handle: None,
        }
    }

    /// Start automatic cleanup task
    pub fn start(&mut self) {
        if self.cleanup_handle.is_some() {
            warn!("Cleanup task is already running");
            return;
        }

        let store = self.store.clone();
        let interval = self.cleanup_interval;

        let handle = tokio::spawn(async move {
            let mut cleanup_interval = tokio::time::interval(interval);

            loop {
                cleanup_interval.tick().await;

                match store.cleanup_expired().await {
                    Ok(count) => {
                        if count > 0 {
                            info!(backend = store.backend(), "Cleanup task removed {} expired sessions", count);
                        }
                    }
                    Err(e) => {
                        error!(backend = store.backend(), "Cleanup task failed: {}", e);
                    }
                }
            }
        });

        self.cleanup_handle = Some(handle);
        info!("Started session cleanup task with interval {:?}", self.cleanup_interval);
    }

    /// Stop automatic cleanup task
    pub fn stop(&mut self) {
        if let Some(handle) = self.cleanup_handle.take() {
            handle.abort();
            info!("Stopped session cleanup task");
        }
    }

    pub fn is_running(&self) -> bool {
        self.cleanup_handle.is_some()
    }
}

impl std::fmt::Debug for SessionJanitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionJanitor")
            .field("backend", &self.store.backend())
            .field("cleanup_interval", &self.cleanup_interval)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for SessionJanitor {
    fn drop(&mut self) {
        self.stop();
    }
}
