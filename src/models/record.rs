//! Completed form record

use std::collections::{BTreeMap, HashMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All answers of a finished form, handed to the persistence sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRecord {
    pub user_id: i64,
    pub form_id: String,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub referrer_id: Option<i64>,
    pub completed_at: DateTime<Utc>,
}

impl FormRecord {
    pub fn new(
        user_id: i64,
        form_id: &str,
        answers: HashMap<String, serde_json::Value>,
        referrer_id: Option<i64>,
    ) -> Self {
        Self {
            user_id,
            form_id: form_id.to_string(),
            fields: answers.into_iter().collect(),
            referrer_id,
            completed_at: Utc::now(),
        }
    }

    pub fn get_string(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(|v| v.as_i64())
    }
}
