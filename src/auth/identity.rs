//! Request-scoped caller identity

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Extensions},
};
use uuid::Uuid;

use crate::{auth::jwt::AccessClaims, error::AppError};

/// Identity established by the authentication middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl AuthenticatedIdentity {
    /// `None` when the authentication middleware did not run for this request.
    pub fn from_extensions(extensions: &Extensions) -> Option<Self> {
        extensions.get::<Self>().copied()
    }
}

impl From<&AccessClaims> for AuthenticatedIdentity {
    fn from(claims: &AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            is_admin: claims.is_admin,
        }
    }
}

// 实现 FromRequestParts 以便在 handler 中直接提取身份
impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // 路由未挂载认证中间件属于编程错误
        Self::from_extensions(&parts.extensions)
            .ok_or_else(|| AppError::internal_error("missing user id in context"))
    }
}
