//! 数据访问层
//! 以 trait 定义存储契约，提供 PostgreSQL 与内存两种实现

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        goal::{Goal, GoalInput},
        metric::{Metric, MetricKind},
        user::{AuthProviderLink, NewRefreshToken, NewUser, RefreshTokenRecord, User, UserUpdate},
        workout::{Workout, WorkoutInput},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn create(&self, user: NewUser) -> Result<User>;

    /// Create an account and its provider link in one step.
    async fn create_oauth_user(
        &self,
        user: NewUser,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<User>;

    /// Removes the user together with everything it owns.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn store(&self, token: NewRefreshToken) -> Result<()>;

    /// Look up a token by digest; revoked or expired records are not returned.
    async fn find_valid(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>>;

    /// Returns `false` when nothing was revoked (unknown or already revoked).
    async fn revoke(&self, token_hash: &str) -> Result<bool>;

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait AuthProviderRepository: Send + Sync {
    async fn find(&self, provider: &str, provider_user_id: &str)
        -> Result<Option<AuthProviderLink>>;

    async fn link(&self, user_id: Uuid, provider: &str, provider_user_id: &str) -> Result<()>;
}

/// User-scoped goals. Rows owned by another user behave as missing.
#[async_trait]
pub trait GoalRepository: Send + Sync {
    async fn create(&self, user_id: Uuid, goal: GoalInput) -> Result<Goal>;
    async fn list(&self, user_id: Uuid) -> Result<Vec<Goal>>;
    async fn update(&self, user_id: Uuid, goal_id: Uuid, goal: GoalInput) -> Result<Goal>;
    async fn delete(&self, user_id: Uuid, goal_id: Uuid) -> Result<()>;
    async fn delete_all(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait MetricRepository: Send + Sync {
    async fn create(&self, user_id: Uuid, kind: MetricKind, measurement: &str) -> Result<Metric>;
    async fn list(&self, user_id: Uuid, kind: MetricKind) -> Result<Vec<Metric>>;
    async fn update(
        &self,
        user_id: Uuid,
        kind: MetricKind,
        metric_id: Uuid,
        measurement: &str,
    ) -> Result<Metric>;
    async fn delete(&self, user_id: Uuid, kind: MetricKind, metric_id: Uuid) -> Result<()>;
    async fn delete_all(&self, user_id: Uuid, kind: MetricKind) -> Result<u64>;
}

#[async_trait]
pub trait WorkoutRepository: Send + Sync {
    async fn create(&self, user_id: Uuid, workout: WorkoutInput) -> Result<Workout>;
    async fn list(&self, user_id: Uuid) -> Result<Vec<Workout>>;
    async fn update(
        &self,
        user_id: Uuid,
        workout_id: Uuid,
        workout: WorkoutInput,
    ) -> Result<Workout>;
    async fn delete(&self, user_id: Uuid, workout_id: Uuid) -> Result<()>;
    async fn delete_all(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

/// 所有仓储的集合，注入到 AppState
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn UserRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub auth_providers: Arc<dyn AuthProviderRepository>,
    pub goals: Arc<dyn GoalRepository>,
    pub metrics: Arc<dyn MetricRepository>,
    pub workouts: Arc<dyn WorkoutRepository>,
    pub health: Arc<dyn HealthProbe>,
}

impl Store {
    pub fn postgres(pool: PgPool) -> Self {
        Self::from_backend(Arc::new(PgStore::new(pool)))
    }

    pub fn memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }

    /// Use one backend for every repository.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: UserRepository
            + RefreshTokenRepository
            + AuthProviderRepository
            + GoalRepository
            + MetricRepository
            + WorkoutRepository
            + HealthProbe
            + 'static,
    {
        Self {
            users: backend.clone(),
            refresh_tokens: backend.clone(),
            auth_providers: backend.clone(),
            goals: backend.clone(),
            metrics: backend.clone(),
            workouts: backend.clone(),
            health: backend,
        }
    }
}
