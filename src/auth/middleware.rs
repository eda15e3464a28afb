//! 认证中间件
//! 按客户端类型（API / 浏览器）选择凭证来源与失败响应

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{
    cookies::ACCESS_COOKIE,
    credentials::ClientKind,
    identity::AuthenticatedIdentity,
    jwt::{JwtService, TokenError},
};
use crate::{error::AppError, middleware::AppState};

pub const UNAUTHORIZED_PATH: &str = "/unauthorized";
pub const FORBIDDEN_PATH: &str = "/forbidden";

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    Invalid,
    Expired,
    Forbidden,
}

impl AuthFailure {
    /// Hint passed to the browser's `/unauthorized` page.
    fn reason(&self) -> &'static str {
        match self {
            AuthFailure::Expired => "expired",
            _ => "invalid_missing",
        }
    }

    fn into_response(self, kind: ClientKind, state: &AppState) -> Response {
        match kind {
            ClientKind::Api => match self {
                AuthFailure::Missing => {
                    AppError::MissingCredential("Missing access token".to_string()).into_response()
                }
                AuthFailure::Invalid | AuthFailure::Expired => {
                    AppError::InvalidCredential("Invalid access token".to_string()).into_response()
                }
                AuthFailure::Forbidden => AppError::Forbidden.into_response(),
            },
            ClientKind::Browser => self.browser_response(state),
        }
    }

    fn browser_response(self, state: &AppState) -> Response {
        let (status, target) = match self {
            AuthFailure::Forbidden => (StatusCode::FORBIDDEN, FORBIDDEN_PATH.to_string()),
            _ => (
                StatusCode::UNAUTHORIZED,
                format!("{}?reason={}", UNAUTHORIZED_PATH, self.reason()),
            ),
        };

        let mut headers = HeaderMap::new();
        // target 由常量拼接，必为合法头部值
        if let Ok(location) = HeaderValue::from_str(&target) {
            headers.insert("hx-redirect", location.clone());
            headers.insert("location", location);
        }

        // 无效或过期的 cookie 一并清除
        if matches!(self, AuthFailure::Invalid | AuthFailure::Expired) {
            match state.cookies.clear(ACCESS_COOKIE) {
                Ok(cookie) => {
                    headers.insert(SET_COOKIE, cookie);
                }
                Err(e) => tracing::error!(error = %e, "Failed to build clearing cookie"),
            }
        }

        (status, headers).into_response()
    }
}

/// Validate the credential carried by `kind`'s transport.
pub fn authenticate(
    jwt: &JwtService,
    kind: ClientKind,
    headers: &HeaderMap,
) -> Result<AuthenticatedIdentity, AuthFailure> {
    let extractor = kind.extractor();

    let token = extractor.extract(headers).ok_or(AuthFailure::Missing)?;

    let claims = jwt.validate_access_token(&token).map_err(|e| {
        tracing::debug!(transport = extractor.transport(), reason = %e, "Access token rejected");
        match e {
            TokenError::Expired => AuthFailure::Expired,
            _ => AuthFailure::Invalid,
        }
    })?;

    Ok(AuthenticatedIdentity::from(&claims))
}

/// 认证中间件 - 必须认证
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let kind = ClientKind::negotiate(req.headers());

    match authenticate(&state.jwt, kind, req.headers()) {
        Ok(identity) => {
            // 附加到请求扩展
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(failure) => failure.into_response(kind, &state),
    }
}

/// 管理员中间件：认证后要求 is_admin
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let kind = ClientKind::negotiate(req.headers());

    let identity = match authenticate(&state.jwt, kind, req.headers()) {
        Ok(identity) => identity,
        Err(failure) => return failure.into_response(kind, &state),
    };

    if !identity.is_admin {
        tracing::warn!(
            user_id = %identity.user_id,
            path = %req.uri().path(),
            "Admin access denied"
        );
        return AuthFailure::Forbidden.into_response(kind, &state);
    }

    req.extensions_mut().insert(identity);
    next.run(req).await
}
