//! Persistence sink
//!
//! Durable storage for finished forms. The dialogue driver only talks to
//! this trait; it never issues queries itself.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use crate::models::FormRecord;
use crate::utils::errors::Result;

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Store a finished record. Failures are reported, never retried here.
    async fn save(&self, record: FormRecord) -> Result<()>;

    /// Whether a record exists for the user
    async fn is_registered(&self, user_id: i64) -> Result<bool>;

    /// Add one referral point; `None` if the referrer is not registered
    async fn credit_referrer(&self, referrer_id: i64) -> Result<Option<i64>>;

    /// Referral points collected by the user
    async fn points(&self, user_id: i64) -> Result<i64>;
}

#[derive(Debug, Clone)]
struct StoredRecord {
    record: FormRecord,
    points: i64,
}

/// In-process sink, used when no database is configured
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<RwLock<HashMap<i64, StoredRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored record for a user
    pub async fn record(&self, user_id: i64) -> Option<FormRecord> {
        self.records.read().await.get(&user_id).map(|stored| stored.record.clone())
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn save(&self, record: FormRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let user_id = record.user_id;
        match records.get_mut(&user_id) {
            // keep earned points and the original referrer on re-registration
            Some(stored) => {
                let referrer_id = stored.record.referrer_id.or(record.referrer_id);
                stored.record = FormRecord { referrer_id, ..record };
            }
            None => {
                records.insert(user_id, StoredRecord { record, points: 0 });
            }
        }
        debug!(user_id = user_id, "Record stored in memory");
        Ok(())
    }

    async fn is_registered(&self, user_id: i64) -> Result<bool> {
        Ok(self.records.read().await.contains_key(&user_id))
    }

    async fn credit_referrer(&self, referrer_id: i64) -> Result<Option<i64>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(&referrer_id).map(|stored| {
            stored.points += 1;
            stored.points
        }))
    }

    async fn points(&self, user_id: i64) -> Result<i64> {
        Ok(self.records.read().await.get(&user_id).map_or(0, |stored| stored.points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: i64, first_name: &str, referrer_id: Option<i64>) -> FormRecord {
        let mut answers = HashMap::new();
        answers.insert("first_name".to_string(), serde_json::json!(first_name));
        FormRecord::new(user_id, "registration", answers, referrer_id)
    }

    #[tokio::test]
    async fn test_save_and_lookup() {
        let sink = MemorySink::new();
        assert!(!sink.is_registered(1).await.unwrap());

        sink.save(record(1, "Alice", None)).await.unwrap();
        assert!(sink.is_registered(1).await.unwrap());
        assert_eq!(sink.record(1).await.unwrap().get_string("first_name"), Some("Alice"));
        assert_eq!(sink.len().await, 1);
    }

    #[tokio::test]
    async fn test_referral_points() {
        let sink = MemorySink::new();
        assert_eq!(sink.credit_referrer(1).await.unwrap(), None);

        sink.save(record(1, "Alice", None)).await.unwrap();
        assert_eq!(sink.credit_referrer(1).await.unwrap(), Some(1));
        assert_eq!(sink.credit_referrer(1).await.unwrap(), Some(2));
        assert_eq!(sink.points(1).await.unwrap(), 2);
        assert_eq!(sink.points(99).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resave_keeps_points_and_referrer() {
        let sink = MemorySink::new();
        sink.save(record(1, "Alice", Some(5))).await.unwrap();
        sink.credit_referrer(1).await.unwrap();

        sink.save(record(1, "Alicia", None)).await.unwrap();
        let stored = sink.record(1).await.unwrap();
        assert_eq!(stored.get_string("first_name"), Some("Alicia"));
        assert_eq!(stored.referrer_id, Some(5));
        assert_eq!(sink.points(1).await.unwrap(), 1);
    }

    #[test]
    fn test_empty_sink() {
        let sink = MemorySink::new();
        assert!(tokio_test::block_on(sink.is_empty()));
        assert!(tokio_test::block_on(sink.record(1)).is_none());
    }
}
