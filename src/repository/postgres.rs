//! PostgreSQL 存储实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    AuthProviderRepository, GoalRepository, HealthProbe, MetricRepository,
    RefreshTokenRepository, UserRepository, WorkoutRepository,
};
use crate::{
    error::{AppError, Result},
    models::{
        goal::{Goal, GoalInput},
        metric::{Metric, MetricKind},
        user::{AuthProviderLink, NewRefreshToken, NewUser, RefreshTokenRecord, User, UserUpdate},
        workout::{Workout, WorkoutInput},
    },
};

pub const DUPLICATE_EMAIL: &str = "Email already registered";
pub const DUPLICATE_GOAL: &str = "Cannot have duplicate goal names";

const USER_COLUMNS: &str = "id, first_name, middle_name, last_name, email, hashed_password, \
                            profile_image, is_admin, created_at, updated_at";

const GOAL_COLUMNS: &str = "id, user_id, name, description, goal_date, completion_date, notes, \
                            status, created_at, updated_at";

const WORKOUT_COLUMNS: &str = "id, user_id, title, description, duration_minutes, planned_date, \
                               date_completed, created_at, updated_at";

/// 唯一约束冲突转换为 Conflict，其他错误保持为数据库错误
fn map_unique(e: sqlx::Error, message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Persistence(e),
    }
}

pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

// ==================== Users ====================

#[async_trait]
impl UserRepository for PgStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, first_name, middle_name, last_name, email, hashed_password, profile_image)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.first_name)
        .bind(&user.middle_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.profile_image)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, DUPLICATE_EMAIL))
    }

    async fn create_oauth_user(
        &self,
        user: NewUser,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<User> {
        let mut tx = self.db.begin().await?;

        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, first_name, middle_name, last_name, email, hashed_password, profile_image)
            VALUES ($1, $2, $3, $4, $5, NULL, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.first_name)
        .bind(&user.middle_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.profile_image)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique(e, DUPLICATE_EMAIL))?;

        sqlx::query(
            "INSERT INTO auth_providers (user_id, provider, provider_user_id) VALUES ($1, $2, $3)",
        )
        .bind(created.id)
        .bind(provider)
        .bind(provider_user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, "Identity already linked"))?;

        tx.commit().await?;

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        Ok(user)
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                middle_name = COALESCE($3, middle_name),
                last_name = COALESCE($4, last_name),
                email = COALESCE($5, email),
                hashed_password = COALESCE($6, hashed_password),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.middle_name)
        .bind(&update.last_name)
        .bind(&update.email)
        .bind(&update.hashed_password)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_unique(e, DUPLICATE_EMAIL))?
        .ok_or_else(|| AppError::not_found("User"))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }
        Ok(())
    }
}

// ==================== Refresh Tokens ====================

#[async_trait]
impl RefreshTokenRepository for PgStore {
    /// 存储刷新令牌
    async fn store(&self, token: NewRefreshToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_hash, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.user_id)
        .bind(token.expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 根据哈希查找有效的刷新令牌
    async fn find_valid(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>> {
        let token = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT token_hash, user_id, expires_at, revoked_at, created_at
            FROM refresh_tokens
            WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        Ok(token)
    }

    /// 根据哈希撤销刷新令牌
    async fn revoke(&self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 撤销用户的所有刷新令牌
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// 清理过期的刷新令牌
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

// ==================== Auth Providers ====================

#[async_trait]
impl AuthProviderRepository for PgStore {
    async fn find(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<AuthProviderLink>> {
        let link = sqlx::query_as::<_, AuthProviderLink>(
            r#"
            SELECT user_id, provider, provider_user_id
            FROM auth_providers
            WHERE provider = $1 AND provider_user_id = $2
            "#,
        )
        .bind(provider)
        .bind(provider_user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(link)
    }

    async fn link(&self, user_id: Uuid, provider: &str, provider_user_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_providers (user_id, provider, provider_user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, provider_user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(provider_user_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

// ==================== Goals ====================

#[async_trait]
impl GoalRepository for PgStore {
    async fn create(&self, user_id: Uuid, goal: GoalInput) -> Result<Goal> {
        sqlx::query_as::<_, Goal>(&format!(
            r#"
            INSERT INTO goals (id, user_id, name, description, goal_date, completion_date, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&goal.name)
        .bind(&goal.description)
        .bind(goal.goal_date)
        .bind(goal.completion_date)
        .bind(&goal.notes)
        .bind(&goal.status)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, DUPLICATE_GOAL))
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Goal>> {
        let goals = sqlx::query_as::<_, Goal>(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = $1 ORDER BY goal_date, created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(goals)
    }

    async fn update(&self, user_id: Uuid, goal_id: Uuid, goal: GoalInput) -> Result<Goal> {
        sqlx::query_as::<_, Goal>(&format!(
            r#"
            UPDATE goals SET
                name = $3,
                description = $4,
                goal_date = $5,
                completion_date = $6,
                notes = $7,
                status = $8,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(goal_id)
        .bind(user_id)
        .bind(&goal.name)
        .bind(&goal.description)
        .bind(goal.goal_date)
        .bind(goal.completion_date)
        .bind(&goal.notes)
        .bind(&goal.status)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_unique(e, DUPLICATE_GOAL))?
        .ok_or_else(|| AppError::not_found("Goal"))
    }

    async fn delete(&self, user_id: Uuid, goal_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM goals WHERE id = $1 AND user_id = $2")
            .bind(goal_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Goal"));
        }
        Ok(())
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM goals WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

// ==================== Metrics ====================

// 表名来自 MetricKind 的固定集合，不接受外部输入
#[async_trait]
impl MetricRepository for PgStore {
    async fn create(&self, user_id: Uuid, kind: MetricKind, measurement: &str) -> Result<Metric> {
        let metric = sqlx::query_as::<_, Metric>(&format!(
            r#"
            INSERT INTO {table} (id, user_id, measurement)
            VALUES ($1, $2, $3::numeric)
            RETURNING id, user_id, measurement::text AS measurement, created_at, updated_at
            "#,
            table = kind.table()
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(measurement)
        .fetch_one(&self.db)
        .await?;

        Ok(metric)
    }

    async fn list(&self, user_id: Uuid, kind: MetricKind) -> Result<Vec<Metric>> {
        let metrics = sqlx::query_as::<_, Metric>(&format!(
            r#"
            SELECT id, user_id, measurement::text AS measurement, created_at, updated_at
            FROM {table}
            WHERE user_id = $1
            ORDER BY created_at
            "#,
            table = kind.table()
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(metrics)
    }

    async fn update(
        &self,
        user_id: Uuid,
        kind: MetricKind,
        metric_id: Uuid,
        measurement: &str,
    ) -> Result<Metric> {
        sqlx::query_as::<_, Metric>(&format!(
            r#"
            UPDATE {table} SET measurement = $3::numeric, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, measurement::text AS measurement, created_at, updated_at
            "#,
            table = kind.table()
        ))
        .bind(metric_id)
        .bind(user_id)
        .bind(measurement)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Metric"))
    }

    async fn delete(&self, user_id: Uuid, kind: MetricKind, metric_id: Uuid) -> Result<()> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1 AND user_id = $2",
            kind.table()
        ))
        .bind(metric_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Metric"));
        }
        Ok(())
    }

    async fn delete_all(&self, user_id: Uuid, kind: MetricKind) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE user_id = $1", kind.table()))
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

// ==================== Workouts ====================

#[async_trait]
impl WorkoutRepository for PgStore {
    async fn create(&self, user_id: Uuid, workout: WorkoutInput) -> Result<Workout> {
        let created = sqlx::query_as::<_, Workout>(&format!(
            r#"
            INSERT INTO workouts (id, user_id, title, description, duration_minutes, planned_date, date_completed)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {WORKOUT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&workout.title)
        .bind(&workout.description)
        .bind(workout.duration_minutes)
        .bind(workout.planned_date)
        .bind(workout.date_completed)
        .fetch_one(&self.db)
        .await?;

        Ok(created)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Workout>> {
        let workouts = sqlx::query_as::<_, Workout>(&format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts WHERE user_id = $1 ORDER BY planned_date, created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(workouts)
    }

    async fn update(
        &self,
        user_id: Uuid,
        workout_id: Uuid,
        workout: WorkoutInput,
    ) -> Result<Workout> {
        sqlx::query_as::<_, Workout>(&format!(
            r#"
            UPDATE workouts SET
                title = $3,
                description = $4,
                duration_minutes = $5,
                planned_date = $6,
                date_completed = $7,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {WORKOUT_COLUMNS}
            "#
        ))
        .bind(workout_id)
        .bind(user_id)
        .bind(&workout.title)
        .bind(&workout.description)
        .bind(workout.duration_minutes)
        .bind(workout.planned_date)
        .bind(workout.date_completed)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Workout"))
    }

    async fn delete(&self, user_id: Uuid, workout_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM workouts WHERE id = $1 AND user_id = $2")
            .bind(workout_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Workout"));
        }
        Ok(())
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM workouts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl HealthProbe for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
