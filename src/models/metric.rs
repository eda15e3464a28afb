//! Body measurement models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, str::FromStr};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{non_blank, numeric};
use crate::error::AppError;

/// The three kinds of body measurement, named as in the URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    BodyWeights,
    MuscleMasses,
    BodyFatPercents,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [
        MetricKind::BodyWeights,
        MetricKind::MuscleMasses,
        MetricKind::BodyFatPercents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::BodyWeights => "body_weights",
            MetricKind::MuscleMasses => "muscle_masses",
            MetricKind::BodyFatPercents => "body_fat_percents",
        }
    }

    /// Storage table holding this kind
    pub fn table(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::not_found("Metric type"))
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Metric {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Decimal kept as text so no precision is lost in transit
    pub measurement: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MetricRequest {
    #[serde(default, deserialize_with = "measurement_from_any")]
    #[validate(custom(function = "measurement"))]
    pub measurement: String,
}

impl MetricRequest {
    pub fn into_measurement(self) -> Result<String, AppError> {
        self.validate()?;
        Ok(self.measurement.trim().to_string())
    }
}

fn measurement(value: &str) -> Result<(), ValidationError> {
    non_blank(value)
        .map_err(|e| e.with_message(Cow::Borrowed("measurement is required")))?;
    numeric(value).map_err(|e| e.with_message(Cow::Borrowed("measurement must be a number")))
}

/// Accepts the measurement as either a JSON string or a JSON number.
fn measurement_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct MetricResponse {
    pub metric_id: Uuid,
    pub metric_type: MetricKind,
    pub measurement: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MetricResponse {
    pub fn new(kind: MetricKind, metric: Metric) -> Self {
        Self {
            metric_id: metric.id,
            metric_type: kind,
            measurement: metric.measurement,
            user_id: metric.user_id,
            created_at: metric.created_at,
            updated_at: metric.updated_at,
        }
    }
}

/// All of a user's measurements grouped by kind
#[derive(Debug, Serialize)]
pub struct MetricsOverview {
    pub body_weights: Vec<MetricResponse>,
    pub muscle_masses: Vec<MetricResponse>,
    pub body_fat_percents: Vec<MetricResponse>,
}
