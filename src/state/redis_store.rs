//! Redis-backed session store
//!
//! Sessions are stored as JSON under `{prefix}session:{user_id}` with a
//! server-side TTL, so abandoned sessions disappear without a cleanup pass.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, error, warn};
use crate::config::SessionConfig;
use crate::utils::errors::{FormBuddyError, Result};
use super::context::ConversationSession;
use super::storage::{SessionMutator, SessionStore};

/// Redis-based session store
#[derive(Clone)]
pub struct RedisSessionStore {
    connection_manager: redis::aio::ConnectionManager,
    prefix: String,
    default_ttl: u64,
}

impl RedisSessionStore {
    /// Connect to Redis using the session configuration
    pub async fn new(config: &SessionConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            connection_manager,
            prefix: config.prefix.clone(),
            default_ttl: config.ttl_seconds,
        })
    }

    /// Test Redis connection
    pub async fn test_connection(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn session_key(&self, user_id: i64) -> String {
        format!("{}session:{}", self.prefix, user_id)
    }

    /// Remaining lifetime in seconds; never below one
    fn ttl_seconds(&self, session: &ConversationSession) -> u64 {
        match session.expires_at {
            Some(expires_at) => (expires_at - chrono::Utc::now()).num_seconds().max(1) as u64,
            None => self.default_ttl,
        }
    }

    /// `SET` with an `NX`/`XX` condition; returns whether the write happened
    async fn write(&self, session: &ConversationSession, condition: &str) -> Result<bool> {
        let key = self.session_key(session.user_id);
        let serialized = serde_json::to_string(session).map_err(|e| {
            error!(user_id = session.user_id, error = %e, "Failed to serialize session");
            e
        })?;

        let mut conn = self.connection_manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(serialized)
            .arg(condition)
            .arg("EX")
            .arg(self.ttl_seconds(session))
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, user_id: i64) -> Result<Option<ConversationSession>> {
        let key = self.session_key(user_id);
        let mut conn = self.connection_manager.clone();

        let serialized: Option<String> = conn.get(&key).await?;
        let Some(data) = serialized else {
            debug!(user_id = user_id, "No session found in Redis");
            return Ok(None);
        };

        let session: ConversationSession = serde_json::from_str(&data).map_err(|e| {
            error!(user_id = user_id, error = %e, "Failed to deserialize session");
            e
        })?;

        if session.is_expired() {
            warn!(user_id = user_id, expires_at = ?session.expires_at, "Session has expired, removing");
            self.remove(user_id).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn create(&self, session: ConversationSession) -> Result<ConversationSession> {
        if self.write(&session, "NX").await? {
            debug!(user_id = session.user_id, step = %session.step, "Session saved to Redis");
            return Ok(session);
        }

        // The existing key may hold a session that expired by its own clock
        // but not yet by Redis' TTL.
        if self.get(session.user_id).await?.is_none() && self.write(&session, "NX").await? {
            return Ok(session);
        }

        Err(FormBuddyError::SessionAlreadyExists { user_id: session.user_id })
    }

    async fn update(&self, user_id: i64, mutator: SessionMutator) -> Result<ConversationSession> {
        let mut session = self
            .get(user_id)
            .await?
            .ok_or(FormBuddyError::SessionNotFound { user_id })?;

        mutator(&mut session);

        if self.write(&session, "XX").await? {
            debug!(user_id = user_id, step = %session.step, "Session updated in Redis");
            Ok(session)
        } else {
            Err(FormBuddyError::SessionNotFound { user_id })
        }
    }

    async fn remove(&self, user_id: i64) -> Result<()> {
        let key = self.session_key(user_id);
        let mut conn = self.connection_manager.clone();

        let deleted: u32 = conn.del(&key).await?;
        if deleted > 0 {
            debug!("Deleted session for user {}", user_id);
        } else {
            debug!("No session to delete for user {}", user_id);
        }
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        // Redis expires keys on its own
        Ok(0)
    }

    async fn active_count(&self) -> Result<usize> {
        let pattern = format!("{}session:*", self.prefix);
        let mut conn = self.connection_manager.clone();
        let mut keys: redis::AsyncIter<String> = conn.scan_match(&pattern).await?;
        let mut count = 0;
        while keys.next_item().await.is_some() {
            count += 1;
        }
        Ok(count)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("prefix", &self.prefix)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}
