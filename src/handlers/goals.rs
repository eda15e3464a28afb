//! 健身目标的 HTTP 处理器

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
    models::goal::{CreateGoalRequest, GoalResponse, UpdateGoalRequest},
};

pub async fn create_goal(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    JsonBody(req): JsonBody<CreateGoalRequest>,
) -> Result<impl IntoResponse, AppError> {
    let goal = state
        .store
        .goals
        .create(identity.user_id, req.into_input()?)
        .await?;

    Ok((StatusCode::CREATED, Json(GoalResponse::from(goal))))
}

pub async fn list_goals(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
) -> Result<impl IntoResponse, AppError> {
    let goals = state.store.goals.list(identity.user_id).await?;

    Ok(Json(
        goals.into_iter().map(GoalResponse::from).collect::<Vec<_>>(),
    ))
}

pub async fn update_goal(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path(goal_id): Path<String>,
    JsonBody(req): JsonBody<UpdateGoalRequest>,
) -> Result<impl IntoResponse, AppError> {
    let goal_id = parse_id(&goal_id, "Goal")?;
    let goal = state
        .store
        .goals
        .update(identity.user_id, goal_id, req.into_input()?)
        .await?;

    Ok(Json(GoalResponse::from(goal)))
}

pub async fn delete_goal(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path(goal_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let goal_id = parse_id(&goal_id, "Goal")?;
    state.store.goals.delete(identity.user_id, goal_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 删除当前用户的全部目标
pub async fn delete_all_goals(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
) -> Result<impl IntoResponse, AppError> {
    let removed = state.store.goals.delete_all(identity.user_id).await?;
    tracing::debug!(user_id = %identity.user_id, removed, "Deleted all goals");

    Ok(StatusCode::NO_CONTENT)
}
