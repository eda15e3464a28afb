//! 内存存储实现
//! 用于测试和本地运行（storage.backend = "memory"）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    postgres::{DUPLICATE_EMAIL, DUPLICATE_GOAL},
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

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
    links: HashMap<(String, String), AuthProviderLink>,
    goals: HashMap<Uuid, Goal>,
    metrics: HashMap<MetricKind, HashMap<Uuid, Metric>>,
    workouts: HashMap<Uuid, Workout>,
}

impl State {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn insert_user(&mut self, user: NewUser) -> Result<User> {
        let email = user.email.to_lowercase();
        if self.email_taken(&email, None) {
            return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            first_name: user.first_name,
            middle_name: user.middle_name,
            last_name: user.last_name,
            email,
            hashed_password: user.hashed_password,
            profile_image: user.profile_image,
            is_admin: false,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(created.id, created.clone());
        Ok(created)
    }

    fn goal_name_taken(&self, user_id: Uuid, name: &str, except: Option<Uuid>) -> bool {
        self.goals
            .values()
            .any(|g| g.user_id == user_id && g.name == name && Some(g.id) != except)
    }
}

/// Map-backed store sharing one lock across all repositories.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant or drop the admin flag. There is no API for this.
    pub async fn set_admin(&self, user_id: Uuid, is_admin: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("User"))?;
        user.is_admin = is_admin;
        Ok(())
    }

    /// Backdate a stored refresh token's expiry.
    pub async fn expire_refresh_token(&self, token_hash: &str, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state
            .refresh_tokens
            .get_mut(token_hash)
            .ok_or_else(|| AppError::not_found("Refresh token"))?;
        record.expires_at = at;
        Ok(())
    }

    pub async fn refresh_token_count(&self) -> usize {
        self.state.read().await.refresh_tokens.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        self.state.write().await.insert_user(user)
    }

    async fn create_oauth_user(
        &self,
        user: NewUser,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<User> {
        let mut state = self.state.write().await;

        let key = (provider.to_string(), provider_user_id.to_string());
        if state.links.contains_key(&key) {
            return Err(AppError::Conflict("Identity already linked".to_string()));
        }

        let created = state.insert_user(user)?;
        state.links.insert(
            key,
            AuthProviderLink {
                user_id: created.id,
                provider: provider.to_string(),
                provider_user_id: provider_user_id.to_string(),
            },
        );
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_lowercase();
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<User> {
        let mut state = self.state.write().await;

        if let Some(email) = &update.email {
            if state.email_taken(email, Some(id)) {
                return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
            }
        }

        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("User"))?;

        if let Some(v) = update.first_name {
            user.first_name = v;
        }
        if let Some(v) = update.middle_name {
            user.middle_name = Some(v);
        }
        if let Some(v) = update.last_name {
            user.last_name = v;
        }
        if let Some(v) = update.email {
            user.email = v;
        }
        if let Some(v) = update.hashed_password {
            user.hashed_password = Some(v);
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;

        if state.users.remove(&id).is_none() {
            return Err(AppError::not_found("User"));
        }

        // 与外键级联删除保持一致
        state.refresh_tokens.retain(|_, t| t.user_id != id);
        state.links.retain(|_, l| l.user_id != id);
        state.goals.retain(|_, g| g.user_id != id);
        state.workouts.retain(|_, w| w.user_id != id);
        for table in state.metrics.values_mut() {
            table.retain(|_, m| m.user_id != id);
        }
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryStore {
    async fn store(&self, token: NewRefreshToken) -> Result<()> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&token.user_id) {
            return Err(AppError::Storage(format!(
                "refresh token references unknown user {}",
                token.user_id
            )));
        }

        state.refresh_tokens.insert(
            token.token_hash.clone(),
            RefreshTokenRecord {
                token_hash: token.token_hash,
                user_id: token.user_id,
                expires_at: token.expires_at,
                revoked_at: None,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn find_valid(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>> {
        let state = self.state.read().await;
        Ok(state
            .refresh_tokens
            .get(token_hash)
            .filter(|t| t.is_valid_at(now))
            .cloned())
    }

    async fn revoke(&self, token_hash: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.refresh_tokens.get_mut(token_hash) {
            Some(record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut revoked = 0;
        for record in state.refresh_tokens.values_mut() {
            if record.user_id == user_id && record.revoked_at.is_none() {
                record.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|_, t| t.expires_at > now);
        Ok((before - state.refresh_tokens.len()) as u64)
    }
}

#[async_trait]
impl AuthProviderRepository for MemoryStore {
    async fn find(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<AuthProviderLink>> {
        let state = self.state.read().await;
        Ok(state
            .links
            .get(&(provider.to_string(), provider_user_id.to_string()))
            .cloned())
    }

    async fn link(&self, user_id: Uuid, provider: &str, provider_user_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .links
            .entry((provider.to_string(), provider_user_id.to_string()))
            .or_insert_with(|| AuthProviderLink {
                user_id,
                provider: provider.to_string(),
                provider_user_id: provider_user_id.to_string(),
            });
        Ok(())
    }
}

#[async_trait]
impl GoalRepository for MemoryStore {
    async fn create(&self, user_id: Uuid, goal: GoalInput) -> Result<Goal> {
        let mut state = self.state.write().await;

        if state.goal_name_taken(user_id, &goal.name, None) {
            return Err(AppError::Conflict(DUPLICATE_GOAL.to_string()));
        }

        let now = Utc::now();
        let created = Goal {
            id: Uuid::new_v4(),
            user_id,
            name: goal.name,
            description: goal.description,
            goal_date: goal.goal_date,
            completion_date: goal.completion_date,
            notes: goal.notes,
            status: goal.status,
            created_at: now,
            updated_at: now,
        };
        state.goals.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Goal>> {
        let state = self.state.read().await;
        let mut goals: Vec<Goal> = state
            .goals
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();
        goals.sort_by_key(|g| (g.goal_date, g.created_at));
        Ok(goals)
    }

    async fn update(&self, user_id: Uuid, goal_id: Uuid, goal: GoalInput) -> Result<Goal> {
        let mut state = self.state.write().await;

        if state.goal_name_taken(user_id, &goal.name, Some(goal_id)) {
            return Err(AppError::Conflict(DUPLICATE_GOAL.to_string()));
        }

        let existing = state
            .goals
            .get_mut(&goal_id)
            .filter(|g| g.user_id == user_id)
            .ok_or_else(|| AppError::not_found("Goal"))?;

        existing.name = goal.name;
        existing.description = goal.description;
        existing.goal_date = goal.goal_date;
        existing.completion_date = goal.completion_date;
        existing.notes = goal.notes;
        existing.status = goal.status;
        existing.updated_at = Utc::now();

        Ok(existing.clone())
    }

    async fn delete(&self, user_id: Uuid, goal_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        match state.goals.get(&goal_id) {
            Some(g) if g.user_id == user_id => {
                state.goals.remove(&goal_id);
                Ok(())
            }
            _ => Err(AppError::not_found("Goal")),
        }
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.goals.len();
        state.goals.retain(|_, g| g.user_id != user_id);
        Ok((before - state.goals.len()) as u64)
    }
}

#[async_trait]
impl MetricRepository for MemoryStore {
    async fn create(&self, user_id: Uuid, kind: MetricKind, measurement: &str) -> Result<Metric> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let created = Metric {
            id: Uuid::new_v4(),
            user_id,
            measurement: measurement.to_string(),
            created_at: now,
            updated_at: now,
        };
        state
            .metrics
            .entry(kind)
            .or_default()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn list(&self, user_id: Uuid, kind: MetricKind) -> Result<Vec<Metric>> {
        let state = self.state.read().await;
        let mut metrics: Vec<Metric> = state
            .metrics
            .get(&kind)
            .map(|table| {
                table
                    .values()
                    .filter(|m| m.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        metrics.sort_by_key(|m| m.created_at);
        Ok(metrics)
    }

    async fn update(
        &self,
        user_id: Uuid,
        kind: MetricKind,
        metric_id: Uuid,
        measurement: &str,
    ) -> Result<Metric> {
        let mut state = self.state.write().await;
        let metric = state
            .metrics
            .get_mut(&kind)
            .and_then(|table| table.get_mut(&metric_id))
            .filter(|m| m.user_id == user_id)
            .ok_or_else(|| AppError::not_found("Metric"))?;

        metric.measurement = measurement.to_string();
        metric.updated_at = Utc::now();
        Ok(metric.clone())
    }

    async fn delete(&self, user_id: Uuid, kind: MetricKind, metric_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let table = state
            .metrics
            .get_mut(&kind)
            .ok_or_else(|| AppError::not_found("Metric"))?;

        match table.get(&metric_id) {
            Some(m) if m.user_id == user_id => {
                table.remove(&metric_id);
                Ok(())
            }
            _ => Err(AppError::not_found("Metric")),
        }
    }

    async fn delete_all(&self, user_id: Uuid, kind: MetricKind) -> Result<u64> {
        let mut state = self.state.write().await;
        let Some(table) = state.metrics.get_mut(&kind) else {
            return Ok(0);
        };
        let before = table.len();
        table.retain(|_, m| m.user_id != user_id);
        Ok((before - table.len()) as u64)
    }
}

#[async_trait]
impl WorkoutRepository for MemoryStore {
    async fn create(&self, user_id: Uuid, workout: WorkoutInput) -> Result<Workout> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let created = Workout {
            id: Uuid::new_v4(),
            user_id,
            title: workout.title,
            description: workout.description,
            duration_minutes: workout.duration_minutes,
            planned_date: workout.planned_date,
            date_completed: workout.date_completed,
            created_at: now,
            updated_at: now,
        };
        state.workouts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Workout>> {
        let state = self.state.read().await;
        let mut workouts: Vec<Workout> = state
            .workouts
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        workouts.sort_by_key(|w| (w.planned_date, w.created_at));
        Ok(workouts)
    }

    async fn update(
        &self,
        user_id: Uuid,
        workout_id: Uuid,
        workout: WorkoutInput,
    ) -> Result<Workout> {
        let mut state = self.state.write().await;
        let existing = state
            .workouts
            .get_mut(&workout_id)
            .filter(|w| w.user_id == user_id)
            .ok_or_else(|| AppError::not_found("Workout"))?;

        existing.title = workout.title;
        existing.description = workout.description;
        existing.duration_minutes = workout.duration_minutes;
        existing.planned_date = workout.planned_date;
        existing.date_completed = workout.date_completed;
        existing.updated_at = Utc::now();

        Ok(existing.clone())
    }

    async fn delete(&self, user_id: Uuid, workout_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        match state.workouts.get(&workout_id) {
            Some(w) if w.user_id == user_id => {
                state.workouts.remove(&workout_id);
                Ok(())
            }
            _ => Err(AppError::not_found("Workout")),
        }
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.workouts.len();
        state.workouts.retain(|_, w| w.user_id != user_id);
        Ok((before - state.workouts.len()) as u64)
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Store;
    use chrono::{Duration, NaiveDate};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            first_name: "jane".to_string(),
            middle_name: None,
            last_name: "doe".to_string(),
            email: email.to_string(),
            hashed_password: Some("$argon2id$stub".to_string()),
            profile_image: None,
        }
    }

    fn goal(name: &str) -> GoalInput {
        GoalInput {
            name: name.to_string(),
            description: "desc".to_string(),
            goal_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            completion_date: None,
            notes: None,
            status: "in_progress".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = Store::memory();
        store.users.create(new_user("jane@example.com")).await.unwrap();

        let err = store
            .users
            .create(new_user("JANE@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 409);
    }

    #[tokio::test]
    async fn test_refresh_token_validity_filter() {
        let store = Store::memory();
        let user = store.users.create(new_user("jane@example.com")).await.unwrap();
        let now = Utc::now();

        store
            .refresh_tokens
            .store(NewRefreshToken {
                token_hash: "abc".to_string(),
                user_id: user.id,
                expires_at: now + Duration::days(60),
            })
            .await
            .unwrap();

        assert!(store.refresh_tokens.find_valid("abc", now).await.unwrap().is_some());
        assert!(store
            .refresh_tokens
            .find_valid("abc", now + Duration::days(61))
            .await
            .unwrap()
            .is_none());

        assert!(store.refresh_tokens.revoke("abc").await.unwrap());
        assert!(!store.refresh_tokens.revoke("abc").await.unwrap());
        assert!(store.refresh_tokens.find_valid("abc", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_goals_are_scoped_to_owner() {
        let store = Store::memory();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        let created = store.goals.create(owner, goal("run")).await.unwrap();

        let err = store
            .goals
            .update(other, created.id, goal("swim"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 404);
        assert_eq!(store.goals.delete(other, created.id).await.unwrap_err().code(), 404);
        assert_eq!(store.goals.list(other).await.unwrap().len(), 0);
        assert_eq!(store.goals.list(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_goal_name_per_user() {
        let store = Store::memory();
        let owner = Uuid::new_v4();

        store.goals.create(owner, goal("run")).await.unwrap();
        assert_eq!(
            store.goals.create(owner, goal("run")).await.unwrap_err().code(),
            409
        );
        // 其他用户可以使用同名目标
        assert!(store.goals.create(Uuid::new_v4(), goal("run")).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let backend = Arc::new(MemoryStore::new());
        let store = Store::from_backend(backend.clone());
        let user = store.users.create(new_user("jane@example.com")).await.unwrap();

        store
            .refresh_tokens
            .store(NewRefreshToken {
                token_hash: "abc".to_string(),
                user_id: user.id,
                expires_at: Utc::now() + Duration::days(1),
            })
            .await
            .unwrap();
        store.goals.create(user.id, goal("run")).await.unwrap();

        store.users.delete(user.id).await.unwrap();

        assert_eq!(backend.refresh_token_count().await, 0);
        assert!(store.goals.list(user.id).await.unwrap().is_empty());
    }
}
