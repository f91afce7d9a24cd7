//! Conversation session management
//!
//! This module holds the per-user state of an in-progress form: which step
//! the user is on, the answers collected so far and when the session expires.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};

use super::scenarios::Step;

/// In-progress form state for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    /// User ID this session belongs to
    pub user_id: i64,
    /// Form being filled in
    pub form_id: String,
    /// Step the user is currently answering
    pub step: Step,
    /// Answers collected so far, keyed by field name
    pub answers: HashMap<String, serde_json::Value>,
    /// User whose invite link started this session
    pub referrer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When this session is considered abandoned
    pub expires_at: Option<DateTime<Utc>>,
}

impl ConversationSession {
    /// Create a new session positioned at `initial_step`
    pub fn new(user_id: i64, form_id: &str, initial_step: Step, ttl: Option<Duration>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            form_id: form_id.to_string(),
            step: initial_step,
            answers: HashMap::new(),
            referrer_id: None,
            created_at: now,
            updated_at: now,
            expires_at: ttl.and_then(|ttl| now.checked_add_signed(ttl)),
        }
    }

    pub fn with_referrer(mut self, referrer_id: Option<i64>) -> Self {
        self.referrer_id = referrer_id;
        self
    }

    /// Record the answer for a field
    pub fn set_answer(&mut self, field: &str, value: serde_json::Value) {
        self.answers.insert(field.to_string(), value);
        self.touch();
    }

    /// Move to the given step
    pub fn advance_to(&mut self, step: Step) {
        self.step = step;
        self.touch();
    }

    /// Get string answer (convenience method)
    pub fn get_string(&self, field: &str) -> Option<String> {
        self.answers.get(field).and_then(|v| v.as_str()).map(str::to_string)
    }

    /// Get integer answer (convenience method)
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.answers.get(field).and_then(|v| v.as_i64())
    }

    /// Check if session has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires_at| now > expires_at)
    }

    /// Set custom expiry time
    pub fn set_expiry(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = Some(expires_at);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session() {
        let session = ConversationSession::new(123, "registration", Step::ask("first_name"), None);
        assert_eq!(session.user_id, 123);
        assert_eq!(session.form_id, "registration");
        assert_eq!(session.step, Step::ask("first_name"));
        assert!(session.answers.is_empty());
        assert!(session.expires_at.is_none());
        assert!(session.referrer_id.is_none());
    }

    #[test]
    fn test_answers() {
        let mut session = ConversationSession::new(123, "registration", Step::ask("first_name"), None);
        session.set_answer("first_name", serde_json::json!("John"));
        session.set_answer("age", serde_json::json!(25));

        assert_eq!(session.get_string("first_name"), Some("John".to_string()));
        assert_eq!(session.get_i64("age"), Some(25));
        assert_eq!(session.get_string("age"), None);
        assert_eq!(session.get_string("nonexistent"), None);
    }

    #[test]
    fn test_expiry() {
        let mut session = ConversationSession::new(123, "registration", Step::ask("first_name"), Some(Duration::hours(1)));
        assert!(!session.is_expired());
        assert!(session.is_expired_at(Utc::now() + Duration::hours(2)));

        session.set_expiry(Utc::now() - Duration::minutes(1));
        assert!(session.is_expired());
    }

    #[test]
    fn test_serde_roundtrip_preserves_step() {
        let session = ConversationSession::new(5, "registration", Step::ask("last_name"), None)
            .with_referrer(Some(77));
        let json = serde_json::to_string(&session).unwrap();
        let restored: ConversationSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }
}
