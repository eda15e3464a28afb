//! 认证相关的 HTTP 处理器（JSON API）

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::extract::JsonBody;
use crate::{
    auth::credentials::bearer_token,
    error::AppError,
    middleware::AppState,
    models::{
        auth::{AccessTokenResponse, LoginRequest, RegisterRequest, SessionResponse},
        user::User,
    },
    services::Session,
};

fn session_response(user: User, session: Session) -> SessionResponse {
    SessionResponse {
        user: user.into(),
        access_token: session.access_token,
        refresh_token: session.refresh_token,
    }
}

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, session) = state.auth_service.register(req).await?;

    Ok((StatusCode::CREATED, Json(session_response(user, session))))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, session) = state.auth_service.login(req).await?;

    Ok(Json(session_response(user, session)))
}

/// 用刷新令牌换取新的访问令牌
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let presented = presented_refresh_token(&headers)?;
    let access_token = state.sessions.refresh(&presented).await?;

    Ok(Json(AccessTokenResponse { access_token }))
}

/// 撤销刷新令牌
pub async fn revoke(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let presented = presented_refresh_token(&headers)?;
    state.sessions.revoke(&presented).await?;

    Ok(StatusCode::NO_CONTENT)
}

// 刷新令牌通过 Authorization: Bearer 传递
fn presented_refresh_token(headers: &HeaderMap) -> Result<String, AppError> {
    bearer_token(headers).ok_or_else(|| AppError::BadRequest("Missing refresh token".to_string()))
}
