//! 身体指标（体重、肌肉量、体脂率）的 HTTP 处理器

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
    models::metric::{MetricKind, MetricRequest, MetricResponse, MetricsOverview},
};

pub async fn create_metric(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path(kind): Path<String>,
    JsonBody(req): JsonBody<MetricRequest>,
) -> Result<impl IntoResponse, AppError> {
    let kind: MetricKind = kind.parse()?;
    let measurement = req.into_measurement()?;

    let metric = state
        .store
        .metrics
        .create(identity.user_id, kind, &measurement)
        .await?;

    Ok((StatusCode::CREATED, Json(MetricResponse::new(kind, metric))))
}

/// 按类型分组返回全部指标
pub async fn list_metrics(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
) -> Result<impl IntoResponse, AppError> {
    let metrics = &state.store.metrics;
    let user_id = identity.user_id;

    let (body_weights, muscle_masses, body_fat_percents) = tokio::try_join!(
        metrics.list(user_id, MetricKind::BodyWeights),
        metrics.list(user_id, MetricKind::MuscleMasses),
        metrics.list(user_id, MetricKind::BodyFatPercents),
    )?;

    let wrap = |kind: MetricKind, rows: Vec<_>| {
        rows.into_iter()
            .map(|m| MetricResponse::new(kind, m))
            .collect::<Vec<_>>()
    };

    Ok(Json(MetricsOverview {
        body_weights: wrap(MetricKind::BodyWeights, body_weights),
        muscle_masses: wrap(MetricKind::MuscleMasses, muscle_masses),
        body_fat_percents: wrap(MetricKind::BodyFatPercents, body_fat_percents),
    }))
}

pub async fn update_metric(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path((kind, metric_id)): Path<(String, String)>,
    JsonBody(req): JsonBody<MetricRequest>,
) -> Result<impl IntoResponse, AppError> {
    let kind: MetricKind = kind.parse()?;
    let metric_id = parse_id(&metric_id, "Metric")?;
    let measurement = req.into_measurement()?;

    let metric = state
        .store
        .metrics
        .update(identity.user_id, kind, metric_id, &measurement)
        .await?;

    Ok(Json(MetricResponse::new(kind, metric)))
}

pub async fn delete_metric(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path((kind, metric_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let kind: MetricKind = kind.parse()?;
    let metric_id = parse_id(&metric_id, "Metric")?;

    state
        .store
        .metrics
        .delete(identity.user_id, kind, metric_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 删除某一类型的全部指标
pub async fn delete_all_metrics(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let kind: MetricKind = kind.parse()?;
    state.store.metrics.delete_all(identity.user_id, kind).await?;

    Ok(StatusCode::NO_CONTENT)
}
