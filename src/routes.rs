//! 路由注册
//! 创建所有路由并按顺序挂载中间件

use axum::{
    error_handling::HandleErrorLayer,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    BoxError, Router,
};
use std::{sync::Arc, time::Duration};
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;

use crate::{
    auth::{require_admin, require_auth},
    error::AppError,
    handlers::{auth, browser, goals, health, metrics, oauth, users, workouts},
    middleware::{
        cross_origin_middleware, request_tracking_middleware, secure_headers_middleware, AppState,
    },
    rate_limit::{rate_limit_middleware, RateLimitGuard},
};

/// 请求体上限
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// 创建应用路由
///
/// Outer to inner: request tracking, global rate limit, secure headers,
/// cross-origin check, request timeout, body limit, then the route group's
/// own layers.
pub fn create_router(state: Arc<AppState>) -> Router {
    let trust_proxy = state.config.security.trust_proxy;
    let auth_guard = RateLimitGuard::new(state.auth_limiter.clone(), trust_proxy);
    let global_guard = RateLimitGuard::new(state.global_limiter.clone(), trust_proxy);
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    // 公开端点
    let public_routes = Router::new()
        .route("/api/v1/healthz", get(health::healthz))
        .route("/unauthorized", get(browser::unauthorized))
        .route("/forbidden", get(browser::forbidden))
        .route("/auth/{provider}/login", get(oauth::login))
        .route("/auth/{provider}/callback", get(oauth::callback));

    // 认证路由（无需访问令牌，但凭证相关，应用更严格的速率限制）
    let auth_routes = Router::new()
        .route("/api/v1/register", post(auth::register))
        .route("/api/v1/login", post(auth::login))
        .route("/api/v1/refresh", post(auth::refresh))
        .route("/api/v1/revoke", post(auth::revoke))
        .route("/login", post(browser::login))
        .route("/register", post(browser::register))
        .route("/users/email", post(browser::check_email))
        .route("/logout", post(browser::logout))
        .route("/refresh", post(browser::refresh))
        .layer(from_fn_with_state(auth_guard, rate_limit_middleware));

    // 需要认证的路由
    let authenticated_routes = Router::new()
        .route(
            "/api/v1/users",
            put(users::update_user).delete(users::delete_user),
        )
        .route(
            "/api/v1/goals",
            get(goals::list_goals)
                .post(goals::create_goal)
                .delete(goals::delete_all_goals),
        )
        .route(
            "/api/v1/goals/{id}",
            put(goals::update_goal).delete(goals::delete_goal),
        )
        .route("/api/v1/metrics", get(metrics::list_metrics))
        .route(
            "/api/v1/metrics/{kind}",
            post(metrics::create_metric).delete(metrics::delete_all_metrics),
        )
        .route(
            "/api/v1/metrics/{kind}/{id}",
            put(metrics::update_metric).delete(metrics::delete_metric),
        )
        .route(
            "/api/v1/workouts",
            get(workouts::list_workouts)
                .post(workouts::create_workout)
                .delete(workouts::delete_all_workouts),
        )
        .route(
            "/api/v1/workouts/{id}",
            put(workouts::update_workout).delete(workouts::delete_workout),
        )
        .layer(from_fn_with_state(state.clone(), require_auth));

    // 管理员路由
    let admin_routes = Router::new()
        .route("/api/v1/admin/users/{id}", get(users::admin_get_user))
        .layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(authenticated_routes)
        .merge(admin_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(from_fn(cross_origin_middleware))
        .layer(from_fn(secure_headers_middleware))
        .layer(from_fn_with_state(global_guard, rate_limit_middleware))
        .layer(from_fn(request_tracking_middleware))
        .with_state(state)
}

async fn handle_timeout_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request timed out");
        AppError::Timeout
    } else {
        AppError::Internal(format!("unhandled middleware error: {}", err))
    }
}
