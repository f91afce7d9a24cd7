//! Registered user repository implementation

use std::time::Instant;
use async_trait::async_trait;
use sqlx::PgPool;
use chrono::Utc;
use crate::database::sink::PersistenceSink;
use crate::models::{FormRecord, NewRegistration, RegisteredUser};
use crate::utils::errors::FormBuddyError;
use crate::utils::logging::log_storage_operation;

#[derive(Clone)]
#[derive(Debug)]
pub struct RegisteredUserRepository {
    pool: PgPool,
}

impl RegisteredUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a registration, keeping points and the first referrer
    pub async fn upsert(&self, registration: NewRegistration) -> Result<RegisteredUser, FormBuddyError> {
        let user = sqlx::query_as::<_, RegisteredUser>(
            r#"
            INSERT INTO registered_users (id, first_name, last_name, age, referrer_id, points, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6, $6)
            ON CONFLICT (id) DO UPDATE
            SET first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                age = EXCLUDED.age,
                referrer_id = COALESCE(registered_users.referrer_id, EXCLUDED.referrer_id),
                updated_at = EXCLUDED.updated_at
            RETURNING id, first_name, last_name, age, referrer_id, points, created_at, updated_at
            "#
        )
        .bind(registration.id)
        .bind(registration.first_name)
        .bind(registration.last_name)
        .bind(registration.age)
        .bind(registration.referrer_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<RegisteredUser>, FormBuddyError> {
        let user = sqlx::query_as::<_, RegisteredUser>(
            "SELECT id, first_name, last_name, age, referrer_id, points, created_at, updated_at FROM registered_users WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Add one referral point and return the new total
    pub async fn increment_points(&self, id: i64) -> Result<Option<i64>, FormBuddyError> {
        let points = sqlx::query_scalar::<_, i64>(
            "UPDATE registered_users SET points = points + 1, updated_at = $2 WHERE id = $1 RETURNING points"
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(points)
    }
}

#[async_trait]
impl PersistenceSink for RegisteredUserRepository {
    async fn save(&self, record: FormRecord) -> Result<(), FormBuddyError> {
        let registration = NewRegistration::try_from(&record)?;
        let started = Instant::now();
        let result = self.upsert(registration).await;
        log_storage_operation("upsert", "postgres", started.elapsed().as_millis() as u64, result.is_ok());
        result.map(|_| ())
    }

    async fn is_registered(&self, user_id: i64) -> Result<bool, FormBuddyError> {
        Ok(self.find_by_id(user_id).await?.is_some())
    }

    async fn credit_referrer(&self, referrer_id: i64) -> Result<Option<i64>, FormBuddyError> {
        self.increment_points(referrer_id).await
    }

    async fn points(&self, user_id: i64) -> Result<i64, FormBuddyError> {
        Ok(self.find_by_id(user_id).await?.map_or(0, |user| user.points))
    }
}
