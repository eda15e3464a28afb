//! 账户服务：注册、登录、资料更新与注销

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::password::{PasswordError, PasswordHasher},
    error::{AppError, Result},
    models::{
        auth::{EmailCheckRequest, LoginRequest, RegisterRequest, UpdateUserRequest},
        blank_to_none,
        user::{NewUser, User, UserUpdate},
    },
    repository::UserRepository,
    services::session_service::{Session, SessionService},
    telemetry,
};

/// Verified against when the email is unknown, so both failure paths cost a hash.
const TIMING_PAD_PASSWORD: &str = "fithub-timing-pad-password";

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<SessionService>,
    hasher: Arc<PasswordHasher>,
    password_min_length: usize,
    timing_pad_hash: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<SessionService>,
        hasher: Arc<PasswordHasher>,
        password_min_length: usize,
    ) -> Result<Self> {
        let timing_pad_hash = hasher.hash(TIMING_PAD_PASSWORD)?;

        Ok(Self {
            users,
            sessions,
            hasher,
            password_min_length,
            timing_pad_hash,
        })
    }

    pub fn sessions(&self) -> &Arc<SessionService> {
        &self.sessions
    }

    /// 注册新用户并签发会话
    pub async fn register(&self, req: RegisterRequest) -> Result<(User, Session)> {
        req.validate()?;
        PasswordHasher::validate_password_policy(&req.password, self.password_min_length)?;

        let hashed_password = self.hash_password(req.password).await?;

        let user = self
            .users
            .create(NewUser {
                first_name: req.first_name.trim().to_lowercase(),
                middle_name: blank_to_none(req.middle_name).map(|m| m.trim().to_lowercase()),
                last_name: req.last_name.trim().to_lowercase(),
                email: req.email.trim().to_lowercase(),
                hashed_password: Some(hashed_password),
                profile_image: None,
            })
            .await?;

        let session = self.sessions.issue_session(user.id, user.is_admin).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok((user, session))
    }

    /// 用户登录
    ///
    /// Unknown email, wrong password, a password-less account and an
    /// unparsable stored hash all fail with the same `IncorrectLogin`.
    pub async fn login(&self, req: LoginRequest) -> Result<(User, Session)> {
        req.validate()?;

        let user = self
            .users
            .find_by_email(&req.email.trim().to_lowercase())
            .await?;

        let stored_hash = user
            .as_ref()
            .and_then(|u| u.hashed_password.clone())
            .unwrap_or_else(|| self.timing_pad_hash.clone());

        let matched = self.verify_password(req.password, stored_hash).await?;

        let user = match user {
            Some(user) if matched && user.hashed_password.is_some() => user,
            _ => {
                metrics::counter!(telemetry::LOGIN_ATTEMPTS_TOTAL, "outcome" => "failure")
                    .increment(1);
                return Err(AppError::IncorrectLogin);
            }
        };

        let session = self.sessions.issue_session(user.id, user.is_admin).await?;

        metrics::counter!(telemetry::LOGIN_ATTEMPTS_TOTAL, "outcome" => "success").increment(1);
        tracing::info!(user_id = %user.id, "User logged in");
        Ok((user, session))
    }

    /// 更新用户资料；空字段保持不变
    pub async fn update(&self, user_id: Uuid, req: UpdateUserRequest) -> Result<User> {
        req.validate()?;

        let hashed_password = match blank_to_none(req.password) {
            Some(password) => {
                PasswordHasher::validate_password_policy(&password, self.password_min_length)?;
                Some(self.hash_password(password).await?)
            }
            None => None,
        };

        let update = UserUpdate {
            first_name: blank_to_none(req.first_name).map(|v| v.trim().to_lowercase()),
            middle_name: blank_to_none(req.middle_name).map(|v| v.trim().to_lowercase()),
            last_name: blank_to_none(req.last_name).map(|v| v.trim().to_lowercase()),
            email: blank_to_none(req.email).map(|v| v.trim().to_lowercase()),
            hashed_password,
        };

        if update.is_empty() {
            return self.find_user(user_id).await;
        }

        let user = self.users.update(user_id, update).await?;
        tracing::info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    /// 删除账户：先撤销全部刷新令牌，再删除用户及其数据
    pub async fn delete(&self, user_id: Uuid) -> Result<()> {
        self.sessions.revoke_all(user_id).await?;
        self.users.delete(user_id).await?;

        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    /// 邮箱是否尚未注册（注册表单实时校验）
    pub async fn email_available(&self, req: EmailCheckRequest) -> Result<bool> {
        req.validate()?;
        let email = req.email.trim().to_lowercase();
        Ok(self.users.find_by_email(&email).await?.is_none())
    }

    pub async fn find_user(&self, user_id: Uuid) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    // Argon2 计算放到阻塞线程池，避免占用异步 worker
    async fn hash_password(&self, password: String) -> Result<String> {
        let hasher = Arc::clone(&self.hasher);
        let hashed = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))??;
        Ok(hashed)
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool> {
        let hasher = Arc::clone(&self.hasher);
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))?;

        match verified {
            Ok(matched) => Ok(matched),
            Err(PasswordError::MalformedHash(reason)) => {
                tracing::warn!(%reason, "Stored password hash is malformed");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
