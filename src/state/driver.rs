//! Dialogue driver
//!
//! Ties the session store, the form's transition table and the persistence
//! sink together. Every public operation takes the user's lock for its whole
//! duration and always resolves to a [`Reply`]; store or sink failures are
//! logged and turned into a retry prompt instead of being returned.

use std::sync::Arc;
use chrono::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::database::PersistenceSink;
use crate::models::FormRecord;
use crate::utils::errors::{FormBuddyError, Result};
use crate::utils::logging::log_dialogue_event;
use super::context::ConversationSession;
use super::locks::UserLocks;
use super::scenarios::{FormDefinition, Step, Transition};
use super::storage::SessionStore;

const NO_SESSION_TEXT: &str = "Send /start to begin registration.";
const SAVE_FAILED_TEXT: &str = "Sorry, your data could not be saved. Please send your answer again.";
const UNAVAILABLE_TEXT: &str = "Something went wrong on our side. Please try again in a moment.";
const CANCELLED_TEXT: &str = "Registration cancelled. Send /start to begin again.";
const NOTHING_TO_CANCEL_TEXT: &str = "There is nothing to cancel.";
const ALREADY_REGISTERED_TEXT: &str = "You are already registered!";

/// A message addressed to one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub user_id: i64,
    pub text: String,
}

impl OutgoingMessage {
    pub fn new(user_id: i64, text: impl Into<String>) -> Self {
        Self { user_id, text: text.into() }
    }
}

/// What an operation did to the conversation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A new session was opened
    Started { step: Step },
    /// An open session was discarded and a fresh one opened
    Restarted { step: Step },
    /// Re-registration is disabled and the user already has a record
    AlreadyRegistered,
    /// Input accepted, session moved on
    Advanced { step: Step },
    /// Input rejected, session unchanged
    Rejected { step: Step, reason: String },
    /// Record stored and session closed
    Completed { record: FormRecord },
    /// Record could not be stored; session kept at `step`
    SaveFailed { step: Step },
    /// No open session for the user
    NoSession,
    Cancelled,
    Points(i64),
    /// The session store or sink failed before anything changed
    Unavailable,
}

/// Response to one inbound operation
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Message for the user who sent the input
    pub prompt: OutgoingMessage,
    /// Messages for other users, such as referral notices
    pub notifications: Vec<OutgoingMessage>,
    pub outcome: Outcome,
}

impl Reply {
    fn to_user(user_id: i64, text: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            prompt: OutgoingMessage::new(user_id, text),
            notifications: Vec::new(),
            outcome,
        }
    }
}

/// Driver behaviour switches
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// `None` keeps abandoned sessions until removed explicitly
    pub session_ttl: Option<Duration>,
    pub allow_reregistration: bool,
    pub referrals_enabled: bool,
    /// Used to build invite links
    pub bot_username: Option<String>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            session_ttl: Some(Duration::hours(24)),
            allow_reregistration: true,
            referrals_enabled: true,
            bot_username: None,
        }
    }
}

impl From<&Settings> for DriverOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            session_ttl: i64::try_from(settings.session.ttl_seconds).ok().and_then(Duration::try_seconds),
            allow_reregistration: settings.registration.allow_reregistration,
            referrals_enabled: settings.registration.referrals_enabled,
            bot_username: settings.bot.username.clone(),
        }
    }
}

/// Runs one form for every user
pub struct DialogueDriver {
    form: Arc<FormDefinition>,
    store: Arc<dyn SessionStore>,
    sink: Arc<dyn PersistenceSink>,
    locks: UserLocks,
    options: DriverOptions,
}

impl DialogueDriver {
    pub fn new(
        form: FormDefinition,
        store: Arc<dyn SessionStore>,
        sink: Arc<dyn PersistenceSink>,
        options: DriverOptions,
    ) -> Self {
        Self {
            form: Arc::new(form),
            store,
            sink,
            locks: UserLocks::new(),
            options,
        }
    }

    pub fn form(&self) -> &FormDefinition {
        &self.form
    }

    /// Open a session at the first step.
    ///
    /// `payload` is the deep-link argument of `/start`; when it names another
    /// registered user, that user is credited once this one finishes.
    pub async fn start(&self, user_id: i64, payload: Option<&str>) -> Reply {
        let _guard = self.locks.lock(user_id).await;
        self.process_start(user_id, payload)
            .await
            .unwrap_or_else(|e| self.unavailable(user_id, "start", e))
    }

    /// Feed one inbound text to the user's conversation
    pub async fn handle_message(&self, user_id: i64, raw_input: &str) -> Reply {
        let _guard = self.locks.lock(user_id).await;
        self.process_message(user_id, raw_input)
            .await
            .unwrap_or_else(|e| self.unavailable(user_id, "message", e))
    }

    /// Drop the user's open session, if any
    pub async fn cancel(&self, user_id: i64) -> Reply {
        let _guard = self.locks.lock(user_id).await;
        self.process_cancel(user_id)
            .await
            .unwrap_or_else(|e| self.unavailable(user_id, "cancel", e))
    }

    /// Report the user's referral points
    pub async fn points(&self, user_id: i64) -> Reply {
        match self.sink.points(user_id).await {
            Ok(points) => Reply::to_user(user_id, format!("Your points: {}", points), Outcome::Points(points)),
            Err(e) => self.unavailable(user_id, "points", e),
        }
    }

    /// Step the user is on, if a session is open
    pub async fn current_step(&self, user_id: i64) -> Result<Option<Step>> {
        Ok(self.store.get(user_id).await?.map(|session| session.step))
    }

    async fn process_start(&self, user_id: i64, payload: Option<&str>) -> Result<Reply> {
        let payload = payload.map(str::trim).filter(|p| !p.is_empty());
        let wants_referral = self.options.referrals_enabled && payload.is_some();

        let registered = if !self.options.allow_reregistration || wants_referral {
            self.sink.is_registered(user_id).await?
        } else {
            false
        };

        if registered && !self.options.allow_reregistration {
            info!(user_id = user_id, "Registered user sent /start again");
            let text = match self.invite_link(user_id) {
                Some(link) => format!("{}\nYour invite link:\n{}", ALREADY_REGISTERED_TEXT, link),
                None => ALREADY_REGISTERED_TEXT.to_string(),
            };
            return Ok(Reply::to_user(user_id, text, Outcome::AlreadyRegistered));
        }

        // Only first-time registrations count as referrals
        let referrer_id = match payload {
            Some(payload) if wants_referral && !registered => self.resolve_referrer(user_id, payload).await?,
            _ => None,
        };

        let first_step = self.form.first_step();
        let session = ConversationSession::new(user_id, &self.form.id, first_step.clone(), self.options.session_ttl)
            .with_referrer(referrer_id);

        let outcome = match self.store.create(session.clone()).await {
            Ok(_) => Outcome::Started { step: first_step.clone() },
            Err(FormBuddyError::SessionAlreadyExists { .. }) => {
                info!(user_id = user_id, "Session already open, restarting it");
                self.store.remove(user_id).await?;
                self.store.create(session).await?;
                Outcome::Restarted { step: first_step.clone() }
            }
            Err(e) => return Err(e),
        };

        log_dialogue_event(user_id, &self.form.id, "start", Some(first_step.to_string().as_str()));
        Ok(Reply::to_user(user_id, self.prompt(&first_step), outcome))
    }

    async fn process_message(&self, user_id: i64, raw_input: &str) -> Result<Reply> {
        let session = match self.store.get(user_id).await? {
            Some(session) => session,
            None => return Ok(self.no_session(user_id)),
        };

        if session.form_id != self.form.id {
            warn!(user_id = user_id, form = %session.form_id, "Session belongs to an unknown form, dropping it");
            self.store.remove(user_id).await?;
            return Ok(self.no_session(user_id));
        }

        match self.form.evaluate(&session.step, raw_input) {
            Transition::Rejected { reason } => {
                debug!(user_id = user_id, step = %session.step, "Input rejected");
                Ok(Reply::to_user(
                    user_id,
                    reason.clone(),
                    Outcome::Rejected { step: session.step, reason },
                ))
            }
            Transition::Accepted { field, value, next: Step::Done } => {
                self.complete(session, field, value).await
            }
            Transition::Accepted { field, value, next } => {
                let next_step = next.clone();
                let updated = self
                    .store
                    .update(user_id, Box::new(move |s: &mut ConversationSession| {
                        s.set_answer(&field, value);
                        s.advance_to(next_step);
                    }))
                    .await;

                match updated {
                    Ok(_) => {
                        log_dialogue_event(user_id, &self.form.id, "advance", Some(next.to_string().as_str()));
                        Ok(Reply::to_user(user_id, self.prompt(&next), Outcome::Advanced { step: next }))
                    }
                    Err(FormBuddyError::SessionNotFound { .. }) => Ok(self.no_session(user_id)),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Hand the finished record to the sink; the session survives a failed save
    async fn complete(&self, session: ConversationSession, field: String, value: serde_json::Value) -> Result<Reply> {
        let user_id = session.user_id;
        let mut answers = session.answers;
        answers.insert(field, value);

        let missing = self.form.missing_fields(&answers);
        if !missing.is_empty() {
            return Err(FormBuddyError::InvalidStateTransition {
                from: session.step.to_string(),
                to: format!("{} (missing {})", Step::Done, missing.join(", ")),
            });
        }

        let record = FormRecord::new(user_id, &self.form.id, answers, session.referrer_id);

        if let Err(e) = self.sink.save(record.clone()).await {
            warn!(user_id = user_id, error = %e, "Failed to save record, keeping session for retry");
            return Ok(Reply::to_user(user_id, SAVE_FAILED_TEXT, Outcome::SaveFailed { step: session.step }));
        }

        if let Err(e) = self.store.remove(user_id).await {
            error!(user_id = user_id, error = %e, "Record saved but session could not be removed");
        }
        log_dialogue_event(user_id, &self.form.id, "complete", None);

        let mut text = self.form.completion_message.clone();
        if let Some(link) = self.invite_link(user_id) {
            text.push_str(&format!("\nYour invite link:\n{}", link));
        }

        let mut reply = Reply::to_user(user_id, text, Outcome::Completed { record: record.clone() });
        if let Some(referrer_id) = record.referrer_id {
            if let Some(notice) = self.credit_referrer(referrer_id).await {
                reply.notifications.push(notice);
            }
        }

        Ok(reply)
    }

    async fn credit_referrer(&self, referrer_id: i64) -> Option<OutgoingMessage> {
        match self.sink.credit_referrer(referrer_id).await {
            Ok(Some(points)) => {
                info!(referrer_id = referrer_id, points = points, "Referral credited");
                Some(OutgoingMessage::new(
                    referrer_id,
                    format!("Someone registered with your invite link! Points: {}", points),
                ))
            }
            Ok(None) => {
                debug!(referrer_id = referrer_id, "Referrer no longer registered");
                None
            }
            Err(e) => {
                warn!(referrer_id = referrer_id, error = %e, "Failed to credit referrer");
                None
            }
        }
    }

    async fn process_cancel(&self, user_id: i64) -> Result<Reply> {
        if self.store.get(user_id).await?.is_none() {
            return Ok(Reply::to_user(user_id, NOTHING_TO_CANCEL_TEXT, Outcome::NoSession));
        }

        self.store.remove(user_id).await?;
        log_dialogue_event(user_id, &self.form.id, "cancel", None);
        Ok(Reply::to_user(user_id, CANCELLED_TEXT, Outcome::Cancelled))
    }

    async fn resolve_referrer(&self, user_id: i64, payload: &str) -> Result<Option<i64>> {
        let Ok(referrer_id) = payload.parse::<i64>() else {
            debug!(user_id = user_id, payload = payload, "Ignoring non-numeric start payload");
            return Ok(None);
        };

        if referrer_id == user_id || !self.sink.is_registered(referrer_id).await? {
            return Ok(None);
        }
        Ok(Some(referrer_id))
    }

    fn invite_link(&self, user_id: i64) -> Option<String> {
        if !self.options.referrals_enabled {
            return None;
        }
        self.options
            .bot_username
            .as_ref()
            .map(|username| format!("https://t.me/{}?start={}", username, user_id))
    }

    fn prompt(&self, step: &Step) -> String {
        self.form.prompt_for(step).unwrap_or(NO_SESSION_TEXT).to_string()
    }

    fn no_session(&self, user_id: i64) -> Reply {
        Reply::to_user(user_id, NO_SESSION_TEXT, Outcome::NoSession)
    }

    fn unavailable(&self, user_id: i64, operation: &str, e: FormBuddyError) -> Reply {
        error!(user_id = user_id, operation = operation, severity = %e.severity(), error = %e, "Dialogue operation failed");
        Reply::to_user(user_id, UNAVAILABLE_TEXT, Outcome::Unavailable)
    }
}

impl std::fmt::Debug for DialogueDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogueDriver")
            .field("form", &self.form.id)
            .field("store", &self.store.backend())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
