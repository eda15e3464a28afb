//! 健康检查处理器

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::{
    db::{self, HealthStatus},
    middleware::AppState,
};

/// 就绪探针：存储在 3 秒内可用时返回 "OK"
pub async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    match db::readiness(state.store.health.as_ref()).await {
        HealthStatus::Healthy => (StatusCode::OK, "OK").into_response(),
        HealthStatus::Unhealthy(reason) => {
            tracing::warn!(%reason, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable").into_response()
        }
    }
}
