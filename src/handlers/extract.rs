//! Request body extractors that reject with the service's JSON error shape.

use axum::{
    extract::{FromRequest, Request},
    Form, Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::AppError;

const MALFORMED: &str = "malformed request";

/// `Json<T>` whose rejection is a 400 `{"error": "malformed request"}`.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::debug!(reason = %e.body_text(), "Rejected JSON body");
            AppError::BadRequest(MALFORMED.to_string())
        })?;
        Ok(Self(value))
    }
}

/// URL-encoded browser form.
pub struct FormBody<T>(pub T);

impl<S, T> FromRequest<S> for FormBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state).await.map_err(|e| {
            tracing::debug!(reason = %e.body_text(), "Rejected form body");
            AppError::BadRequest(MALFORMED.to_string())
        })?;
        Ok(Self(value))
    }
}

/// Path ids that are not UUIDs cannot name an existing row.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(what))
}
