//! 数据库连接池与迁移管理
//! 提供 PostgreSQL 连接池、迁移执行和就绪检查

use crate::{config::DatabaseConfig, repository::HealthProbe};
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Upper bound on a readiness probe.
pub const READINESS_TIMEOUT: Duration = Duration::from_secs(3);

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let db_url = config.url.expose_secret();

    tracing::debug!("Creating database connection pool...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect(db_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create database pool: {}", e);
            DbError::ConnectionFailed(e.to_string())
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool created successfully"
    );

    Ok(pool)
}

/// 运行数据库迁移
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            DbError::MigrationFailed(e.to_string())
        })?;

    tracing::info!("Migrations completed successfully");
    Ok(())
}

/// 存储就绪检查，超过 3 秒视为不可用
pub async fn readiness(probe: &dyn HealthProbe) -> HealthStatus {
    match tokio::time::timeout(READINESS_TIMEOUT, probe.ping()).await {
        Ok(Ok(())) => {
            tracing::debug!("Storage readiness check: OK");
            HealthStatus::Healthy
        }
        Ok(Err(e)) => {
            tracing::warn!("Storage readiness check failed: {}", e);
            HealthStatus::Unhealthy(e.to_string())
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = READINESS_TIMEOUT.as_secs(),
                "Storage readiness check timed out"
            );
            HealthStatus::Unhealthy("timed out".to_string())
        }
    }
}

/// 数据库错误类型
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// 健康状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use async_trait::async_trait;

    struct SlowProbe;

    #[async_trait]
    impl HealthProbe for SlowProbe {
        async fn ping(&self) -> crate::error::Result<()> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        }
    }

    struct BrokenProbe;

    #[async_trait]
    impl HealthProbe for BrokenProbe {
        async fn ping(&self) -> crate::error::Result<()> {
            Err(AppError::Storage("connection refused".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_times_out() {
        let status = readiness(&SlowProbe).await;
        assert_eq!(status, HealthStatus::Unhealthy("timed out".to_string()));
    }

    #[tokio::test]
    async fn test_readiness_reports_probe_error() {
        let status = readiness(&BrokenProbe).await;
        assert!(!status.is_healthy());
    }
}
