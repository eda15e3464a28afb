//! 训练记录的 HTTP 处理器

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
    models::workout::{WorkoutRequest, WorkoutResponse},
};

pub async fn create_workout(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    JsonBody(req): JsonBody<WorkoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let workout = state
        .store
        .workouts
        .create(identity.user_id, req.into_input()?)
        .await?;

    Ok((StatusCode::CREATED, Json(WorkoutResponse::from(workout))))
}

pub async fn list_workouts(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
) -> Result<impl IntoResponse, AppError> {
    let workouts = state.store.workouts.list(identity.user_id).await?;

    Ok(Json(
        workouts
            .into_iter()
            .map(WorkoutResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn update_workout(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path(workout_id): Path<String>,
    JsonBody(req): JsonBody<WorkoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let workout_id = parse_id(&workout_id, "Workout")?;
    let workout = state
        .store
        .workouts
        .update(identity.user_id, workout_id, req.into_input()?)
        .await?;

    Ok(Json(WorkoutResponse::from(workout)))
}

pub async fn delete_workout(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path(workout_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let workout_id = parse_id(&workout_id, "Workout")?;
    state
        .store
        .workouts
        .delete(identity.user_id, workout_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_all_workouts(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
) -> Result<impl IntoResponse, AppError> {
    state.store.workouts.delete_all(identity.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
