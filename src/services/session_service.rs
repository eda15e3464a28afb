//! 会话服务：签发访问令牌/刷新令牌、刷新与撤销

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::jwt::{generate_refresh_token, hash_refresh_token, JwtService},
    error::{AppError, Result},
    models::user::NewRefreshToken,
    repository::{RefreshTokenRepository, UserRepository},
    telemetry,
};

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionService {
    jwt: Arc<JwtService>,
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    refresh_ttl: Duration,
}

impl SessionService {
    pub fn new(
        jwt: Arc<JwtService>,
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            jwt,
            users,
            refresh_tokens,
            refresh_ttl,
        }
    }

    /// Issue an access token and a persisted refresh token.
    ///
    /// Nothing is returned unless the refresh token record was stored.
    pub async fn issue_session(&self, user_id: Uuid, is_admin: bool) -> Result<Session> {
        let access_token = self.jwt.issue_access_token(user_id, is_admin)?;
        let refresh_token = generate_refresh_token()?;

        self.refresh_tokens
            .store(NewRefreshToken {
                token_hash: hash_refresh_token(&refresh_token),
                user_id,
                expires_at: Utc::now() + self.refresh_ttl,
            })
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to store refresh token");
                e
            })?;

        metrics::counter!(telemetry::SESSIONS_ISSUED_TOTAL).increment(1);
        tracing::debug!(user_id = %user_id, "Session issued");

        Ok(Session {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a new access token. The refresh token
    /// itself is not rotated.
    pub async fn refresh(&self, presented: &str) -> Result<String> {
        let record = self
            .refresh_tokens
            .find_valid(&hash_refresh_token(presented), Utc::now())
            .await?
            .ok_or_else(invalid_refresh_token)?;

        // 以用户当前的管理员标记签发
        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or_else(invalid_refresh_token)?;

        let access_token = self.jwt.issue_access_token(user.id, user.is_admin)?;

        tracing::debug!(user_id = %user.id, "Access token refreshed");
        Ok(access_token)
    }

    /// Revoke a refresh token. Unknown or already revoked tokens succeed.
    pub async fn revoke(&self, presented: &str) -> Result<()> {
        let revoked = self
            .refresh_tokens
            .revoke(&hash_refresh_token(presented))
            .await?;

        tracing::debug!(revoked, "Refresh token revocation processed");
        Ok(())
    }

    /// 撤销用户的所有刷新令牌
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64> {
        let revoked = self.refresh_tokens.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "Revoked all refresh tokens");
        Ok(revoked)
    }

    /// 清理过期的刷新令牌
    pub async fn purge_expired(&self) -> Result<u64> {
        self.refresh_tokens.delete_expired(Utc::now()).await
    }

    /// Periodically delete expired refresh token records.
    pub fn spawn_reaper(self: &Arc<Self>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match service.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "Purged expired refresh tokens"),
                    Err(e) => tracing::warn!(error = %e, "Failed to purge expired refresh tokens"),
                }
            }
        })
    }
}

fn invalid_refresh_token() -> AppError {
    AppError::InvalidCredential("Invalid refresh token".to_string())
}
