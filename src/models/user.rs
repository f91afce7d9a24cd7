//! Registered user model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use crate::models::record::FormRecord;
use crate::utils::errors::FormBuddyError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RegisteredUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub referrer_id: Option<i64>,
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row data taken from a finished registration form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegistration {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub referrer_id: Option<i64>,
}

impl TryFrom<&FormRecord> for NewRegistration {
    type Error = FormBuddyError;

    fn try_from(record: &FormRecord) -> Result<Self, Self::Error> {
        let missing = |field: &str| {
            FormBuddyError::InvalidInput(format!("Registration record is missing {}", field))
        };

        let age = record.get_i64("age").ok_or_else(|| missing("age"))?;
        Ok(Self {
            id: record.user_id,
            first_name: record.get_string("first_name").ok_or_else(|| missing("first_name"))?.to_string(),
            last_name: record.get_string("last_name").ok_or_else(|| missing("last_name"))?.to_string(),
            age: i32::try_from(age)
                .map_err(|_| FormBuddyError::InvalidInput(format!("Age out of range: {}", age)))?,
            referrer_id: record.referrer_id,
        })
    }
}
