//! 当前用户账户的 HTTP 处理器

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::extract::{parse_id, JsonBody};
use crate::{
    auth::AuthenticatedIdentity,
    error::AppError,
    middleware::AppState,
    models::{
        auth::UpdateUserRequest,
        user::{AdminUserResponse, UserResponse},
    },
};

/// 更新当前用户
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth_service.update(identity.user_id, req).await?;

    Ok(Json(UserResponse::from(user)))
}

/// 删除当前用户及其全部数据
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.delete(identity.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 管理员查看任意用户
pub async fn admin_get_user(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "User")?;
    let user = state.auth_service.find_user(id).await?;

    tracing::info!(admin_id = %identity.user_id, user_id = %id, "Admin viewed user");
    Ok(Json(AdminUserResponse::from(user)))
}
