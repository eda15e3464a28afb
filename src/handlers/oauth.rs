//! OAuth 登录：跳转到身份提供方并处理回调

use axum::{
    extract::{Path, Query, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect},
};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;

use super::browser::{landing_page, session_cookies};
use crate::{
    auth::cookies::{read_cookie, OAUTH_STATE_COOKIE},
    error::AppError,
    middleware::AppState,
    models::auth::OAuthCallbackQuery,
    services::IdentityProvider,
};

const STATE_BYTES: usize = 32;

fn generate_state() -> Result<String, AppError> {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        tracing::error!("OS entropy source failed: {:?}", e);
        AppError::internal_error("could not generate OAuth state")
    })?;
    Ok(hex::encode(bytes))
}

fn provider(state: &AppState, name: &str) -> Result<Arc<dyn IdentityProvider>, AppError> {
    state
        .identity_provider(name)
        .ok_or_else(|| AppError::not_found("Identity provider"))
}

/// 生成 state，写入 cookie，并 307 跳转到提供方
pub async fn login(
    State(state): State<Arc<AppState>>,
    Path(provider_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let provider = provider(&state, &provider_name)?;
    let oauth_state = generate_state()?;

    Ok((
        [(SET_COOKIE, state.cookies.oauth_state(&oauth_state)?)],
        Redirect::temporary(&provider.authorize_url(&oauth_state)),
    ))
}

/// 回调：校验 state，交换授权码，关联账户并签发会话
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider_name): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let provider = provider(&state, &provider_name)?;

    // CSRF 校验：cookie 与查询参数中的 state 必须一致
    let expected = read_cookie(&headers, OAUTH_STATE_COOKIE);
    match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(received)) if expected == received => {}
        _ => {
            tracing::warn!(provider = %provider_name, "OAuth state mismatch");
            return Err(AppError::Forbidden);
        }
    }

    if let Some(error) = query.error.as_deref() {
        tracing::info!(provider = %provider_name, %error, "OAuth authorization declined");
        return Err(AppError::BadRequest(
            "OAuth authorization was declined".to_string(),
        ));
    }

    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let identity = provider.exchange_code(code).await?;
    let user = state
        .identity_links
        .find_or_create(provider.name(), identity)
        .await?;
    let session = state.sessions.issue_session(user.id, user.is_admin).await?;

    tracing::info!(user_id = %user.id, provider = %provider_name, "OAuth login succeeded");

    Ok((
        [(SET_COOKIE, state.cookies.clear(OAUTH_STATE_COOKIE)?)],
        session_cookies(&state, &session)?,
        Redirect::to(landing_page(user.is_admin)),
    ))
}
