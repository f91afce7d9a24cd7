//! Test helpers
//!
//! Builds a dialogue driver over in-memory storage with a sink that can be
//! told to fail and counts successful saves.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use async_trait::async_trait;

use FormBuddy::database::{MemorySink, PersistenceSink};
use FormBuddy::models::FormRecord;
use FormBuddy::state::{registration_form, DialogueDriver, DriverOptions, MemorySessionStore, Reply};
use FormBuddy::{FormBuddyError, Result};

/// Sink wrapper that can reject saves on demand
#[derive(Debug, Default)]
pub struct FlakySink {
    inner: MemorySink,
    failing: AtomicBool,
    saves: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Saves that reached storage
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Saves attempted, including rejected ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn record(&self, user_id: i64) -> Option<FormRecord> {
        self.inner.record(user_id).await
    }
}

#[async_trait]
impl PersistenceSink for FlakySink {
    async fn save(&self, record: FormRecord) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FormBuddyError::Storage("sink unavailable".to_string()));
        }
        self.inner.save(record).await?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_registered(&self, user_id: i64) -> Result<bool> {
        self.inner.is_registered(user_id).await
    }

    async fn credit_referrer(&self, referrer_id: i64) -> Result<Option<i64>> {
        self.inner.credit_referrer(referrer_id).await
    }

    async fn points(&self, user_id: i64) -> Result<i64> {
        self.inner.points(user_id).await
    }
}

pub struct TestContext {
    pub driver: Arc<DialogueDriver>,
    pub store: Arc<MemorySessionStore>,
    pub sink: Arc<FlakySink>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_options(DriverOptions::default())
    }

    pub fn with_options(options: DriverOptions) -> Self {
        let store = Arc::new(MemorySessionStore::new());
        let sink = Arc::new(FlakySink::new());
        let form = registration_form().expect("registration form should build");
        let driver = Arc::new(DialogueDriver::new(form, store.clone(), sink.clone(), options));
        Self { driver, store, sink }
    }

    /// Send `/start` followed by each input, returning every reply
    pub async fn run(&self, user_id: i64, inputs: &[&str]) -> Vec<Reply> {
        let mut replies = vec![self.driver.start(user_id, None).await];
        for input in inputs {
            replies.push(self.driver.handle_message(user_id, input).await);
        }
        replies
    }
}
