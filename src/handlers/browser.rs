//! 浏览器会话端点（表单提交，cookie 承载令牌）
//! 响应带 HX-Location / HX-Redirect，由前端完成跳转

use axum::{
    extract::{Query, State},
    http::{
        header::{HeaderName, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{AppendHeaders, IntoResponse},
};
use serde::Deserialize;
use std::sync::Arc;

use super::extract::FormBody;
use crate::{
    auth::cookies::{read_cookie, ACCESS_COOKIE, REFRESH_COOKIE},
    error::AppError,
    middleware::AppState,
    models::auth::{EmailCheckRequest, LoginRequest, RegisterRequest},
    repository::postgres::DUPLICATE_EMAIL,
    services::Session,
};

const HX_LOCATION: HeaderName = HeaderName::from_static("hx-location");
const HX_REDIRECT: HeaderName = HeaderName::from_static("hx-redirect");

/// Where a freshly signed-in user lands.
pub(super) fn landing_page(is_admin: bool) -> &'static str {
    if is_admin {
        "/admin"
    } else {
        "/workouts"
    }
}

/// `Set-Cookie` headers carrying both tokens of a session.
pub(super) fn session_cookies(
    state: &AppState,
    session: &Session,
) -> Result<AppendHeaders<[(HeaderName, HeaderValue); 2]>, AppError> {
    Ok(AppendHeaders([
        (SET_COOKIE, state.cookies.access(&session.access_token)?),
        (SET_COOKIE, state.cookies.refresh(&session.refresh_token)?),
    ]))
}

/// 表单登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    FormBody(req): FormBody<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, session) = state.auth_service.login(req).await?;

    Ok((
        StatusCode::ACCEPTED,
        session_cookies(&state, &session)?,
        [(HX_LOCATION, HeaderValue::from_static(landing_page(user.is_admin)))],
    ))
}

/// 表单注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    FormBody(req): FormBody<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (_user, session) = state.auth_service.register(req).await?;

    Ok((
        StatusCode::CREATED,
        session_cookies(&state, &session)?,
        [(HX_LOCATION, HeaderValue::from_static("/workouts"))],
    ))
}

/// 注册表单的邮箱占用提示：可用时返回空片段
pub async fn check_email(
    State(state): State<Arc<AppState>>,
    FormBody(req): FormBody<EmailCheckRequest>,
) -> Result<impl IntoResponse, AppError> {
    let alert = if state.auth_service.email_available(req).await? {
        ""
    } else {
        DUPLICATE_EMAIL
    };

    Ok((StatusCode::OK, alert))
}

/// 登出：撤销 refresh cookie 对应的令牌并清除两个 cookie
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(refresh_token) = read_cookie(&headers, REFRESH_COOKIE) {
        state.sessions.revoke(&refresh_token).await?;
    }

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, state.cookies.clear(ACCESS_COOKIE)?),
            (SET_COOKIE, state.cookies.clear(REFRESH_COOKIE)?),
        ]),
        [(HX_REDIRECT, HeaderValue::from_static("/"))],
    ))
}

/// 用 refresh cookie 换取新的 access cookie
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let refresh_token = read_cookie(&headers, REFRESH_COOKIE)
        .ok_or_else(|| AppError::MissingCredential("Missing refresh token".to_string()))?;

    let access_token = state.sessions.refresh(&refresh_token).await?;

    Ok((
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, state.cookies.access(&access_token)?)],
    ))
}

#[derive(Debug, Deserialize)]
pub struct UnauthorizedQuery {
    pub reason: Option<String>,
}

/// 认证失败提示页
pub async fn unauthorized(Query(query): Query<UnauthorizedQuery>) -> impl IntoResponse {
    let message = match query.reason.as_deref() {
        Some("expired") => "Your session has expired. Please log in again.",
        _ => "You must be logged in to view this page.",
    };

    (StatusCode::UNAUTHORIZED, message)
}

/// 权限不足提示页
pub async fn forbidden() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        "You do not have permission to view this page.",
    )
}
