//! Workout models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{blank_to_none, non_blank, parse_date, parse_optional_date};
use crate::error::AppError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Workout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub planned_date: NaiveDate,
    pub date_completed: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WorkoutInput {
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub planned_date: NaiveDate,
    pub date_completed: Option<NaiveDate>,
}

/// Duration may arrive as a JSON number or as a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DurationField {
    Minutes(i64),
    Text(String),
}

impl DurationField {
    fn minutes(&self) -> Result<i32, AppError> {
        let minutes = match self {
            DurationField::Minutes(m) => *m,
            DurationField::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| AppError::validation("duration must be a number"))?,
        };

        if !(1..=24 * 60).contains(&minutes) {
            return Err(AppError::validation(
                "duration must be between 1 and 1440 minutes",
            ));
        }
        Ok(minutes as i32)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct WorkoutRequest {
    #[serde(default)]
    #[validate(
        custom(function = "non_blank", message = "title is required"),
        length(max = 100, message = "title must be at most 100 characters")
    )]
    pub title: String,

    #[validate(length(max = 500, message = "description must be at most 500 characters"))]
    pub description: Option<String>,

    pub duration: Option<DurationField>,

    #[serde(default)]
    #[validate(custom(function = "non_blank", message = "planned date is required"))]
    pub planned_date: String,

    pub date_completed: Option<String>,
}

impl WorkoutRequest {
    pub fn into_input(self) -> Result<WorkoutInput, AppError> {
        self.validate()?;

        let duration_minutes = self
            .duration
            .as_ref()
            .ok_or_else(|| AppError::validation("duration is required"))?
            .minutes()?;

        Ok(WorkoutInput {
            title: self.title.trim().to_string(),
            description: blank_to_none(self.description),
            duration_minutes,
            planned_date: parse_date(&self.planned_date, "planned date")?,
            date_completed: parse_optional_date(self.date_completed.as_deref(), "date completed")?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct WorkoutResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub duration: i32,
    pub planned_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_completed: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Workout> for WorkoutResponse {
    fn from(w: Workout) -> Self {
        Self {
            id: w.id,
            user_id: w.user_id,
            title: w.title,
            description: w.description,
            duration: w.duration_minutes,
            planned_date: w.planned_date,
            date_completed: w.date_completed,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_as_string_or_number() {
        let req: WorkoutRequest = serde_json::from_str(
            r#"{"title": "Leg day", "duration": "45", "planned_date": "2026-03-02"}"#,
        )
        .unwrap();
        assert_eq!(req.into_input().unwrap().duration_minutes, 45);

        let req: WorkoutRequest = serde_json::from_str(
            r#"{"title": "Leg day", "duration": 30, "planned_date": "2026-03-02"}"#,
        )
        .unwrap();
        assert_eq!(req.into_input().unwrap().duration_minutes, 30);
    }

    #[test]
    fn test_duration_must_be_number() {
        let req: WorkoutRequest = serde_json::from_str(
            r#"{"title": "Leg day", "duration": "long", "planned_date": "2026-03-02"}"#,
        )
        .unwrap();
        assert_eq!(
            req.into_input().unwrap_err().user_message(),
            "duration must be a number"
        );
    }

    #[test]
    fn test_title_required() {
        let req: WorkoutRequest =
            serde_json::from_str(r#"{"duration": 30, "planned_date": "2026-03-02"}"#).unwrap();
        assert_eq!(req.into_input().unwrap_err().user_message(), "title is required");
    }
}
